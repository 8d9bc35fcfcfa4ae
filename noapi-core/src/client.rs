//! # NOAPI Connection
//!
//! This module implements the connection service and the per-call connection model.
//!
//! [`NapConnection`] is the long-lived, shared object: it knows where the backend lives,
//! which middleware profiles exist, which authorization and profile are the defaults and
//! whether the session is currently authenticated. Cloning it is cheap and every clone
//! sees the same state.
//!
//! [`ConnectionModel`] is the short-lived, per call-site object: it carries the
//! authorization to use and the middleware lists to run, and performs the resource
//! operations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use noapi_core::client::NapConnection;
//! use noapi_core::middleware::middleware;
//! use noapi_core::types::{Filter, ListOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = NapConnection::new()?;
//! conn.set_host("https://api.example.com");
//! conn.create_before_profile("tenant", vec![middleware(|mut ctx| {
//!     ctx.data["options"]["payload"]["tenant"] = "acme".into();
//!     ctx.data
//! })]);
//!
//! let response = conn
//!     .with("tenant")
//!     .use_auth("admin")
//!     .list::<serde_json::Value>(
//!         "users",
//!         Some(Filter::condition("age", ">", 18)),
//!         Some(ListOptions { take: Some(10), ..Default::default() }),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
mod endpoints;
mod model;

pub use endpoints::{DEFAULT_AUTH_URN, DEFAULT_RESOURCE_URN, Endpoints};
pub use model::ConnectionModel;

use crate::{
    http::{
        HttpTransport, PERMISSION_ORDER_HEADER, Transport, TransportError,
        transport::build_headers,
    },
    middleware::{ExecLapse, Execution, Middleware, MiddlewareChain, Profiles},
    types::{
        AggregateOptions, Aggregation, DeleteOptions, Filter, InsertOptions, ListOptions,
        NapResponse, ReadOptions, UpdateOptions, is_truthy,
    },
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

/// Errors that can occur while performing a NOAPI call.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to encode request body: '{0}'")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode response envelope: '{0}'")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Default)]
struct Settings {
    default_profile: Option<String>,
    default_authorization: Option<String>,
    permission_order: Vec<String>,
    headers: Vec<(String, String)>,
}

struct Shared<T> {
    transport: T,
    endpoints: RwLock<Endpoints>,
    profiles: RwLock<Profiles>,
    settings: RwLock<Settings>,
    authenticated: watch::Sender<bool>,
}

/// The connection service. See the [module docs](self).
pub struct NapConnection<T = HttpTransport> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for NapConnection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for NapConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NapConnection")
            .field("endpoints", &*read(&self.shared.endpoints))
            .field("profiles", &*read(&self.shared.profiles))
            .field("settings", &*read(&self.shared.settings))
            .field("authenticated", &*self.shared.authenticated.borrow())
            .finish()
    }
}

impl NapConnection<HttpTransport> {
    /// A connection over the default `reqwest` transport.
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self::with_transport(HttpTransport::new()?))
    }
}

impl<T> NapConnection<T> {
    pub fn with_transport(transport: T) -> Self {
        let (authenticated, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                transport,
                endpoints: RwLock::new(Endpoints::default()),
                profiles: RwLock::new(Profiles::default()),
                settings: RwLock::new(Settings::default()),
                authenticated,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    // Endpoints

    /// Sets the host every URL is prefixed with. A trailing `/` is dropped.
    pub fn set_host(&self, host: &str) {
        write(&self.shared.endpoints).set_host(host);
    }

    /// Sets the resource path (default `/noapi/resources`).
    pub fn set_resource_urn(&self, path: &str) {
        write(&self.shared.endpoints).set_resource_urn(path);
    }

    /// Sets the auth path (default `/noapi/auth`).
    pub fn set_auth_urn(&self, path: &str) {
        write(&self.shared.endpoints).set_auth_urn(path);
    }

    pub fn endpoints(&self) -> Endpoints {
        read(&self.shared.endpoints).clone()
    }

    pub fn resource_url(&self) -> String {
        read(&self.shared.endpoints).resource_url()
    }

    pub fn auth_url(&self) -> String {
        read(&self.shared.endpoints).auth_url()
    }

    // Settings

    /// Permission names the server should prefer, most preferred first.
    pub fn set_permission_order(&self, order: Vec<String>) {
        write(&self.shared.settings).permission_order = order;
    }

    pub fn permission_order(&self) -> Vec<String> {
        read(&self.shared.settings).permission_order.clone()
    }

    pub fn set_default_authorization(&self, authorization: Option<String>) {
        write(&self.shared.settings).default_authorization = authorization;
    }

    pub fn default_authorization(&self) -> Option<String> {
        read(&self.shared.settings).default_authorization.clone()
    }

    pub fn set_default_profile(&self, profile: Option<String>) {
        write(&self.shared.settings).default_profile = profile;
    }

    pub fn default_profile(&self) -> Option<String> {
        read(&self.shared.settings).default_profile.clone()
    }

    /// Adds a static header sent with every request.
    pub fn add_header(&self, key: impl Into<String>, value: impl Into<String>) {
        write(&self.shared.settings)
            .headers
            .push((key.into(), value.into()));
    }

    // Profiles

    /// Registers the middlewares run before the request for `profile`.
    pub fn create_before_profile(&self, profile: impl Into<String>, middlewares: Vec<Middleware>) {
        write(&self.shared.profiles).create_before(profile, middlewares);
    }

    /// Registers the middlewares run after the response for `profile`.
    pub fn create_after_profile(&self, profile: impl Into<String>, middlewares: Vec<Middleware>) {
        write(&self.shared.profiles).create_after(profile, middlewares);
    }

    /// Unregisters `profile` from both lapses.
    pub fn drop_profile(&self, profile: &str) {
        write(&self.shared.profiles).drop_profile(profile);
    }

    pub(crate) fn profiles(&self) -> RwLockReadGuard<'_, Profiles> {
        read(&self.shared.profiles)
    }

    // Authentication state

    pub fn authenticated(&self) -> bool {
        *self.shared.authenticated.borrow()
    }

    /// Updates the flag. Subscribers are only notified when the value actually changes.
    pub fn set_authenticated(&self, authenticated: bool) {
        let changed = self.shared.authenticated.send_if_modified(|current| {
            if *current == authenticated {
                return false;
            }
            *current = authenticated;
            true
        });
        if changed {
            tracing::info!(authenticated, "authentication state changed");
        }
    }

    pub fn subscribe_authenticated(&self) -> watch::Receiver<bool> {
        self.shared.authenticated.subscribe()
    }

    /// A fresh model with the default authorization and the default profile's middlewares.
    pub fn default_connection(&self) -> ConnectionModel<T> {
        let (authorization, profile) = {
            let settings = read(&self.shared.settings);
            (
                settings.default_authorization.clone(),
                settings.default_profile.clone(),
            )
        };
        let chain = match profile {
            Some(profile) => self.profiles().chain(&profile),
            None => MiddlewareChain::default(),
        };
        ConnectionModel::new(self.clone(), authorization, chain)
    }

    /// Shortcut for `default_connection().with(execution)`.
    pub fn with(&self, execution: impl Into<Execution>) -> ConnectionModel<T> {
        self.default_connection().with(execution)
    }

    /// Shortcut for `default_connection().with_lapse(execution, lapse)`.
    pub fn with_lapse(&self, execution: impl Into<Execution>, lapse: ExecLapse) -> ConnectionModel<T> {
        self.default_connection().with_lapse(execution, lapse)
    }

    fn request_headers(&self) -> Result<http::HeaderMap, TransportError> {
        let settings = read(&self.shared.settings);
        let mut headers = settings.headers.clone();
        headers.push((
            PERMISSION_ORDER_HEADER.to_string(),
            settings.permission_order.join(","),
        ));
        build_headers(headers)
    }
}

impl<T: Transport> NapConnection<T> {
    /// POSTs `body` to `url` and returns the raw response.
    ///
    /// The `auth` field of the response is normalized to a boolean and the connection's
    /// authentication flag follows it.
    pub async fn make_request(&self, url: &str, body: Value) -> Result<Value, RequestError> {
        let headers = self.request_headers()?;
        let resource = body.get("resource").and_then(Value::as_str);
        let operation = body.get("operation").and_then(Value::as_str);
        tracing::debug!(url, resource, operation, "sending request");

        let mut response = self.shared.transport.post(url, headers, body).await?;

        let auth = response.get("auth").is_some_and(is_truthy);
        if let Some(object) = response.as_object_mut() {
            object.insert("auth".to_string(), Value::Bool(auth));
        }
        self.set_authenticated(auth);

        Ok(response)
    }

    pub async fn make_resource_request(&self, body: Value) -> Result<Value, RequestError> {
        let url = self.resource_url();
        self.make_request(&url, body).await
    }

    pub async fn make_auth_request(&self, body: Value) -> Result<Value, RequestError> {
        let url = self.auth_url();
        self.make_request(&url, body).await
    }

    // Resource shortcuts over `default_connection()`

    pub async fn list<R: DeserializeOwned>(
        &self,
        resource: &str,
        filter: Option<Filter>,
        options: Option<ListOptions>,
    ) -> Result<NapResponse<Vec<R>>, RequestError> {
        self.default_connection()
            .list(resource, filter, options)
            .await
    }

    #[deprecated(since = "2.0.0", note = "use `list` instead")]
    #[allow(deprecated)]
    pub async fn read<R: DeserializeOwned>(
        &self,
        resource: &str,
        filter: Option<Filter>,
        options: Option<ReadOptions>,
    ) -> Result<NapResponse<Vec<R>>, RequestError> {
        self.default_connection()
            .read(resource, filter, options)
            .await
    }

    pub async fn insert<D: Serialize, R: DeserializeOwned>(
        &self,
        resource: &str,
        data: &D,
        options: Option<InsertOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        self.default_connection()
            .insert(resource, data, options)
            .await
    }

    pub async fn update<D: Serialize, R: DeserializeOwned>(
        &self,
        resource: &str,
        data: &D,
        filter: Filter,
        options: Option<UpdateOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        self.default_connection()
            .update(resource, data, filter, options)
            .await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        resource: &str,
        filter: Filter,
        options: Option<DeleteOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        self.default_connection()
            .delete(resource, filter, options)
            .await
    }

    pub async fn aggregate<R: DeserializeOwned>(
        &self,
        resource: &str,
        aggregation: Aggregation,
        filter: Option<Filter>,
        options: Option<AggregateOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        self.default_connection()
            .aggregate(resource, aggregation, filter, options)
            .await
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
