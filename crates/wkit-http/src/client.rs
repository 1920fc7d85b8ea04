//! HTTP client configuration.

use crate::error::HttpError;
use crate::request::Request;
use crate::retry::Transport;
use reqwest::{Client, ClientBuilder, Method};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Default request timeout. `None` leaves requests unbounded unless
    /// a request sets its own deadline.
    pub request_timeout: Option<Duration>,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// How long an idle connection stays in the pool.
    pub pool_idle_timeout: Duration,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            user_agent: format!("wkit/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 2,
            pool_idle_timeout: Duration::from_secs(90),
            gzip: true,
        }
    }
}

impl HttpConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("WKIT_HTTP_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = env_u64("WKIT_HTTP_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(user_agent) = std::env::var("WKIT_HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(n) = env_u64("WKIT_HTTP_POOL_MAX_IDLE_PER_HOST") {
            config.pool_max_idle_per_host = n as usize;
        }

        if let Some(secs) = env_u64("WKIT_HTTP_POOL_IDLE_TIMEOUT_SECS") {
            config.pool_idle_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn env_u64(var: &str) -> Option<u64> {
    let value = std::env::var(var).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(var, value = %value, "ignoring non-numeric environment value");
            None
        }
    }
}

/// Build a configured reqwest client.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(config.pool_idle_timeout);

    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }

    if config.gzip {
        builder = builder.gzip(true);
    }

    builder.build().map_err(HttpError::ClientBuild)
}

/// Shared HTTP client.
///
/// Cloning is cheap; every clone uses the same connection pool.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    /// Create a new HTTP client with default config.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new HTTP client with custom config.
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        let inner = build_client(&config)?;
        Ok(Self::with_transport(Arc::new(inner)))
    }

    /// Create a client that sends through a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Start a request with an arbitrary method.
    pub fn request<T: DeserializeOwned>(&self, method: Method) -> Request<T> {
        Request::new(self.clone(), method)
    }

    /// Start a GET request.
    pub fn get<T: DeserializeOwned>(&self) -> Request<T> {
        self.request(Method::GET)
    }

    /// Start a POST request.
    pub fn post<T: DeserializeOwned>(&self) -> Request<T> {
        self.request(Method::POST)
    }

    /// Start a PUT request.
    pub fn put<T: DeserializeOwned>(&self) -> Request<T> {
        self.request(Method::PUT)
    }

    /// Start a PATCH request.
    pub fn patch<T: DeserializeOwned>(&self) -> Request<T> {
        self.request(Method::PATCH)
    }

    /// Start a DELETE request.
    pub fn delete<T: DeserializeOwned>(&self) -> Request<T> {
        self.request(Method::DELETE)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, None);
        assert!(config.user_agent.starts_with("wkit/"));
        assert_eq!(config.pool_max_idle_per_host, 2);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert!(config.gzip);
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_custom_config() {
        let config = HttpConfig {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(15)),
            user_agent: "test-agent".to_string(),
            pool_max_idle_per_host: 5,
            pool_idle_timeout: Duration::from_secs(30),
            gzip: false,
        };

        let client = HttpClient::with_config(config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("WKIT_HTTP_CONNECT_TIMEOUT_SECS", "3");
        std::env::set_var("WKIT_HTTP_REQUEST_TIMEOUT_SECS", "0");
        std::env::set_var("WKIT_HTTP_POOL_MAX_IDLE_PER_HOST", "not-a-number");
        std::env::set_var("WKIT_HTTP_USER_AGENT", "env-agent");

        let config = HttpConfig::from_env();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.pool_max_idle_per_host, 2);
        assert_eq!(config.user_agent, "env-agent");

        std::env::remove_var("WKIT_HTTP_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("WKIT_HTTP_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("WKIT_HTTP_POOL_MAX_IDLE_PER_HOST");
        std::env::remove_var("WKIT_HTTP_USER_AGENT");
    }
}
