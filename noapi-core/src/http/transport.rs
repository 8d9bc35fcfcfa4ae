//! # Transport
//!
//! [`Transport`] is the only place where the SDK touches the network. The connection
//! service is generic over it, which lets tests (and embedders) swap the real HTTP
//! client for an in-process backend.
//!
//! ## Error Handling
//!
//! A [`TransportError`] means the exchange itself failed: the request could not be sent,
//! the server answered with a non-2xx status, or the body was not JSON. A response with
//! `"status": "error"` is *not* a transport error, it is a successful exchange carrying a
//! failure envelope, and is surfaced through [`crate::types::NapResponse`].
use async_trait::async_trait;
use http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{InvalidHeaderName, InvalidHeaderValue},
};
use reqwest::cookie::{CookieStore, Jar};
use std::{str::FromStr, sync::Arc, time::Duration};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Failed to build the HTTP client: '{0}'")]
    Build(#[source] reqwest::Error),
    #[error("Request to '{url}' failed: '{source}'")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Server answered '{url}' with HTTP {status}: '{body}'")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Response from '{url}' is not valid JSON: '{source}'")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid header key '{key}': '{source}'")]
    InvalidHeaderName {
        key: String,
        source: InvalidHeaderName,
    },
    #[error("Invalid header value for key '{key}': '{source}'")]
    InvalidHeaderValue {
        key: String,
        source: InvalidHeaderValue,
    },
    #[error("Transport failure: {0}")]
    Other(String),
}

/// Sends one JSON `POST` and returns the JSON response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
///
/// The client keeps a cookie store so that session cookies issued by the auth endpoint
/// are replayed on subsequent resource calls, the same way a browser would. The store
/// can be read and seeded with [`HttpTransport::cookies`] and
/// [`HttpTransport::add_cookies`] to carry a session across processes.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    jar: Option<Arc<Jar>>,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let mut builder = reqwest::Client::builder().cookie_provider(Arc::clone(&jar));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Build)?;
        Ok(Self {
            client,
            jar: Some(jar),
        })
    }

    /// Wraps an already configured client (proxies, TLS roots, ...).
    ///
    /// Cookies are then whatever that client does with them; [`Self::cookies`] sees none.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client, jar: None }
    }

    /// The `Cookie` header this transport would send to `url`.
    pub fn cookies(&self, url: &str) -> Option<String> {
        let url = reqwest::Url::parse(url).ok()?;
        let header = self.jar.as_ref()?.cookies(&url)?;
        header.to_str().ok().map(str::to_string)
    }

    /// Seeds the cookie store with a `Cookie` header (`a=1; b=2`) previously read from `url`.
    pub fn add_cookies(&self, url: &str, cookies: &str) -> Result<(), TransportError> {
        let Some(jar) = &self.jar else {
            return Ok(());
        };
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| TransportError::Other(format!("invalid URL '{url}': {e}")))?;
        for cookie in cookies.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            jar.add_cookie_str(&format!("{cookie}; Path=/"), &parsed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|source| TransportError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

pub(crate) fn build_headers<I>(headers: I) -> Result<HeaderMap, TransportError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut map = HeaderMap::new();
    for (k, v) in headers {
        let key = HeaderName::from_str(&k).map_err(|source| TransportError::InvalidHeaderName {
            key: k.clone(),
            source,
        })?;
        let val = HeaderValue::from_str(&v)
            .map_err(|source| TransportError::InvalidHeaderValue { key: k, source })?;
        map.insert(key, val);
    }
    Ok(map)
}
