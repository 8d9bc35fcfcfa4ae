pub const DEFAULT_RESOURCE_URN: &str = "/noapi/resources";
pub const DEFAULT_AUTH_URN: &str = "/noapi/auth";

/// Host and paths of the two endpoint groups.
///
/// URLs are `host + urn`. With an empty host the URLs are root-relative, which only makes
/// sense behind a transport that resolves them (a proxy, a test backend...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    host: String,
    resource_urn: String,
    auth_urn: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            host: String::new(),
            resource_urn: DEFAULT_RESOURCE_URN.to_string(),
            auth_urn: DEFAULT_AUTH_URN.to_string(),
        }
    }
}

impl Endpoints {
    /// Drops a single trailing `/`.
    pub fn set_host(&mut self, host: &str) {
        self.host = host.strip_suffix('/').unwrap_or(host).to_string();
    }

    /// Prefixes `/` when missing.
    pub fn set_resource_urn(&mut self, path: &str) {
        self.resource_urn = rooted(path);
    }

    /// Prefixes `/` when missing.
    pub fn set_auth_urn(&mut self, path: &str) {
        self.auth_urn = rooted(path);
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn resource_urn(&self) -> &str {
        &self.resource_urn
    }

    pub fn auth_urn(&self) -> &str {
        &self.auth_urn
    }

    pub fn resource_url(&self) -> String {
        format!("{}{}", self.host, self.resource_urn)
    }

    pub fn auth_url(&self) -> String {
        format!("{}{}", self.host, self.auth_urn)
    }
}

fn rooted(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
