//! # NOAPI Core
//!
//! `noapi-core` is the client side of NOAPI, a backend that exposes generic CRUD and
//! aggregation over named resources plus an authentication endpoint, all through JSON
//! `POST` requests. This crate builds those requests, runs them through optional
//! middleware, tracks the session and adapts resources to grid style data stores.
//!
//! ## Key Components
//!
//! * **[`NapConnection`]:** The shared connection. Holds the host and endpoint paths, the
//!   permission order, middleware profiles and the observable `authenticated` flag.
//! * **[`ConnectionModel`]:** A per-call view over a connection carrying an authorization
//!   role and a middleware chain. Every resource operation goes through one.
//! * **[`AuthService`]:** Login, logout, password recovery and the current user, plus the
//!   resources the user is allowed to touch.
//! * **[`AuthGuard`]:** Keeps a private area private, redirecting through a [`Navigator`]
//!   whenever the session is missing or lost.
//! * **[`NapDataStore`] & [`DataSource`]:** The load / by-key / insert / update / remove
//!   contract grids bind to.
//!
//! ## Transport
//!
//! Everything above is generic over the [`Transport`] trait. [`HttpTransport`] is the
//! `reqwest` backed default; tests and embedders can plug in anything else that answers
//! a JSON body with a JSON body.
//!
//! ## Re-exports
//!
//! This crate re-exports `reqwest` and `serde_json` so consumers build bodies and
//! clients with compatible versions.
pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod middleware;
pub mod store;
pub mod types;

pub use auth::{
    AuthService,
    guard::{AuthGuard, Navigator},
};
pub use client::{ConnectionModel, NapConnection, RequestError};
pub use config::{ConfigError, NapConfig};
pub use http::{HttpTransport, Transport, TransportError};
pub use store::{DataSource, NapDataStore, StoreError, StoreService};

// Re-exports
pub use reqwest;
pub use serde_json;
