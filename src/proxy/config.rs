use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_CHECK_HEADER: &str = "api-key";
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 8080;
pub const DEFAULT_UPSTREAM_PORT: u16 = 80;
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Characters that would turn the admin prefix into a route pattern
const FORBIDDEN_ADMIN_CHARS: &[char] = &['/', ':', '*', '{', '}', '?', '#', '%', ' '];

/// Reverse proxy configuration, built once at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen address
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Listen port
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// Admin key: path prefix of the admin routes and unlimited proxy credential
    pub admin_api_key: String,

    /// Header carrying the caller's API key
    #[serde(default = "default_check_header")]
    pub check_header: String,

    /// Query parameter consulted when the header is absent
    #[serde(default)]
    pub check_query: Option<String>,

    /// Surface internal error details instead of masking them
    #[serde(default)]
    pub debug: bool,

    /// Upstream request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Where authorized requests are forwarded to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub host: String,
    #[serde(default = "default_upstream_port")]
    pub port: u16,
    #[serde(default)]
    pub empty_param_style: EmptyParamStyle,
    /// Outbound proxy for upstream calls (http://, https://, socks5://)
    #[serde(default)]
    pub proxy_url: Option<String>,
}

/// How a query parameter with an empty value is written to the upstream URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyParamStyle {
    /// Literal token `key`, byte-compatible with the legacy proxy
    #[default]
    Legacy,
    /// `name=`
    Named,
}

/// Quota store backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    Redis { host: String, port: u16 },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Redis {
            host: "localhost".to_string(),
            port: DEFAULT_REDIS_PORT,
        }
    }
}

fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_check_header() -> String {
    DEFAULT_CHECK_HEADER.to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_upstream_port() -> u16 {
    DEFAULT_UPSTREAM_PORT
}

impl UpstreamConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: default_scheme(),
            host: host.into(),
            port,
            empty_param_style: EmptyParamStyle::default(),
            proxy_url: None,
        }
    }

    /// `scheme://host:port`, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl ProxyConfig {
    pub fn new(admin_api_key: impl Into<String>, upstream: UpstreamConfig) -> Self {
        Self {
            listen_host: default_listen_host(),
            port: DEFAULT_LISTEN_PORT,
            admin_api_key: admin_api_key.into(),
            check_header: default_check_header(),
            check_query: None,
            debug: false,
            request_timeout: default_request_timeout(),
            upstream,
            store: StoreConfig::default(),
        }
    }

    /// Get the actual listen address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    /// Reject configurations the router cannot be built from
    pub fn validate(&self) -> AppResult<()> {
        if self.admin_api_key.is_empty() {
            return Err(AppError::Config("ADMIN_API_KEY must not be empty".to_string()));
        }
        if self.admin_api_key.contains(FORBIDDEN_ADMIN_CHARS) {
            return Err(AppError::Config(format!(
                "ADMIN_API_KEY must not contain any of {:?}",
                FORBIDDEN_ADMIN_CHARS
            )));
        }
        if self.upstream.host.is_empty() {
            return Err(AppError::Config("FORWARD_HOST must not be empty".to_string()));
        }
        if self.check_header.is_empty() {
            return Err(AppError::Config("CHECK_HEADER must not be empty".to_string()));
        }
        let base = self.upstream.base_url();
        url::Url::parse(&base)
            .map_err(|e| AppError::Config(format!("Invalid upstream address {}: {}", base, e)))?;
        Ok(())
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("listen_host", &self.listen_host)
            .field("port", &self.port)
            .field("admin_api_key", &"<redacted>")
            .field("check_header", &self.check_header)
            .field("check_query", &self.check_query)
            .field("debug", &self.debug)
            .field("request_timeout", &self.request_timeout)
            .field("upstream", &self.upstream)
            .field("store", &self.store)
            .finish()
    }
}
