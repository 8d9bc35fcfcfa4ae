//! # HTTP Transport
//!
//! This module contains the low-level building block used to ship NOAPI request bodies
//! to a backend.
//!
//! Every NOAPI call is a single `POST` with a JSON body and a JSON response, so the
//! seam is intentionally narrow: a [`transport::Transport`] receives a URL, a set of
//! headers and a `serde_json::Value`, and hands back the decoded response body.
//! The default implementation, [`transport::HttpTransport`], is backed by `reqwest`.
pub mod transport;

pub use transport::{HttpTransport, Transport, TransportError};

/// Name of the header carrying the caller's permission preference list.
pub const PERMISSION_ORDER_HEADER: &str = "x-nap-permission-order";
