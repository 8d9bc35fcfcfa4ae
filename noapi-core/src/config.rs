//! # Configuration
//!
//! [`NapConfig`] gathers everything needed to point the SDK at a backend. It is loaded
//! from an optional file (JSON, TOML or YAML, picked by extension) overlaid with
//! `NOAPI_*` environment variables, e.g. `NOAPI_HOST=http://localhost:3001` or
//! `NOAPI_PERMISSION_ORDER=admin,user`.
use crate::{
    auth::AuthService,
    client::{DEFAULT_AUTH_URN, DEFAULT_RESOURCE_URN, NapConnection},
    http::{HttpTransport, TransportError},
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

pub const ENV_PREFIX: &str = "NOAPI";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: '{0}'")]
    Load(#[from] config::ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NapConfig {
    /// Prefix of every URL; empty means root-relative URLs.
    #[serde(default)]
    pub host: String,

    #[serde(default = "defaults::resource_urn")]
    pub resource_urn: String,

    #[serde(default = "defaults::auth_urn")]
    pub auth_urn: String,

    /// Sent as `x-nap-permission-order`, most preferred first.
    #[serde(default)]
    pub permission_order: Vec<String>,

    #[serde(default)]
    pub default_authorization: Option<String>,

    #[serde(default)]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub session_engine: Option<String>,

    /// Origin of the application, used to build password recovery links.
    #[serde(default)]
    pub origin_url: Option<String>,

    #[serde(default = "defaults::login_path")]
    pub login_path: String,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Static headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Where the command line client keeps session cookies between runs.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

impl Default for NapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            resource_urn: defaults::resource_urn(),
            auth_urn: defaults::auth_urn(),
            permission_order: Vec::new(),
            default_authorization: None,
            default_profile: None,
            session_engine: None,
            origin_url: None,
            login_path: defaults::login_path(),
            timeout_secs: None,
            headers: BTreeMap::new(),
            session_file: None,
        }
    }
}

mod defaults {
    pub fn resource_urn() -> String {
        super::DEFAULT_RESOURCE_URN.to_string()
    }

    pub fn auth_urn() -> String {
        super::DEFAULT_AUTH_URN.to_string()
    }

    pub fn login_path() -> String {
        crate::auth::guard::DEFAULT_LOGIN_PATH.to_string()
    }
}

impl NapConfig {
    /// Loads `file` (when given, it must exist) and the `NOAPI_*` environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("permission_order"),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl NapConnection<HttpTransport> {
    /// A connection over the `reqwest` transport, configured from `config`.
    pub fn from_config(config: &NapConfig) -> Result<Self, ConfigError> {
        let conn = Self::with_transport(HttpTransport::with_timeout(config.timeout())?);
        conn.configure(config);
        Ok(conn)
    }
}

impl<T> NapConnection<T> {
    /// Applies the connection related parts of `config`.
    pub fn configure(&self, config: &NapConfig) {
        self.set_host(&config.host);
        self.set_resource_urn(&config.resource_urn);
        self.set_auth_urn(&config.auth_urn);
        self.set_permission_order(config.permission_order.clone());
        self.set_default_authorization(config.default_authorization.clone());
        self.set_default_profile(config.default_profile.clone());
        for (key, value) in &config.headers {
            self.add_header(key.clone(), value.clone());
        }
    }
}

impl<T> AuthService<T> {
    /// Applies the auth related parts of `config`.
    pub fn configure(&self, config: &NapConfig) {
        self.set_session_engine(config.session_engine.clone());
        self.set_origin_url(config.origin_url.clone());
    }
}
