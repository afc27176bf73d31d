//! Client configuration.

use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://api.postlog.app/v1";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of requests allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 3;

/// Postlog client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) api_host: String,
    pub(crate) timeout: Duration,
    pub(crate) max_concurrent_requests: usize,
    pub(crate) debug_logging: bool,
}

impl Config {
    /// Get the API host.
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the maximum number of in-flight requests.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Whether debug logging starts enabled.
    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }
}

/// Builder for Postlog client.
#[derive(Default)]
pub struct PostlogBuilder {
    api_host: Option<String>,
    timeout: Option<Duration>,
    max_concurrent_requests: Option<usize>,
    debug_logging: bool,
    pub(crate) token: Option<String>,
    pub(crate) transport: Option<Arc<dyn Transport>>,
}

impl PostlogBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API host.
    pub fn api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how many requests may be in flight at once.
    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = Some(max);
        self
    }

    /// Enable or disable debug logging.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Initialize the client with a token right away.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a custom transport instead of the built-in HTTP client.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the configuration.
    pub(crate) fn build_config(&self) -> Result<Config, crate::Error> {
        let api_host = self
            .api_host
            .as_deref()
            .unwrap_or(DEFAULT_API_HOST)
            .trim_end_matches('/')
            .to_string();
        if api_host.is_empty() {
            return Err(crate::Error::Config("api_host cannot be empty".into()));
        }

        let max_concurrent_requests = self
            .max_concurrent_requests
            .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS);
        if max_concurrent_requests == 0 {
            return Err(crate::Error::Config(
                "max_concurrent_requests must be at least 1".into(),
            ));
        }

        Ok(Config {
            api_host,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_concurrent_requests,
            debug_logging: self.debug_logging,
        })
    }
}

impl fmt::Debug for PostlogBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostlogBuilder")
            .field("api_host", &self.api_host)
            .field("timeout", &self.timeout)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("debug_logging", &self.debug_logging)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}
