//! Error types for the Postlog SDK.

use std::time::Duration;

/// Errors that can occur when using the Postlog SDK.
///
/// Every error is terminal for the call that produced it. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No token has been set with `initialize`.
    #[error("Client is not initialized: call initialize(token) first")]
    NotInitialized,

    /// A property or tag value is not a string, integer, double or boolean.
    #[error("Invalid value for property `{key}`: expected string, integer, double or boolean")]
    InvalidProperties { key: String },

    /// The request URL could not be formed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The payload could not be encoded as JSON.
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// The transport returned something that is not a usable HTTP response.
    #[error("Invalid response from server")]
    InvalidResponse,

    /// The server answered with a status outside 200..=299.
    #[error("Request failed with status {0}")]
    RequestFailed(u16),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An injected transport failed.
    #[error("Transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// No result arrived within the request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Client has been shutdown.
    #[error("Client has been shutdown")]
    Shutdown,
}

impl Error {
    /// The HTTP status code carried by [`Error::RequestFailed`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RequestFailed(status) => Some(*status),
            _ => None,
        }
    }

    /// Whether the call was rejected before any network I/O.
    pub fn is_gated(&self) -> bool {
        matches!(self, Error::NotInitialized | Error::InvalidProperties { .. })
    }
}
