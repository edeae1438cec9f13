//! Error types for the HTTP adapters

use thiserror::Error;
use verba_core::AdapterError;

/// Result type for HTTP adapter operations
pub type Result<T> = std::result::Result<T, HttpAdapterError>;

/// Errors raised while talking to the translation service
#[derive(Debug, Error)]
pub enum HttpAdapterError {
    /// Request could not be sent or the response could not be read
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body did not match the endpoint's contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client settings were rejected
    #[error("Configuration error: {0}")]
    Config(#[from] tooling::ToolingError),
}

impl HttpAdapterError {
    /// Connect failures, timeouts and overload statuses
    ///
    /// Application-level failures (4xx, 500, malformed bodies) are final.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpAdapterError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            HttpAdapterError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            HttpAdapterError::InvalidResponse(_) | HttpAdapterError::Config(_) => false,
        }
    }
}

impl From<HttpAdapterError> for AdapterError {
    fn from(err: HttpAdapterError) -> Self {
        match err {
            HttpAdapterError::Transport(e) if e.is_decode() => {
                AdapterError::InvalidResponse(e.to_string())
            }
            HttpAdapterError::Transport(e) => AdapterError::Transport(e.to_string()),
            HttpAdapterError::Status { status, body } => AdapterError::Status { status, body },
            HttpAdapterError::InvalidResponse(msg) => AdapterError::InvalidResponse(msg),
            HttpAdapterError::Config(e) => AdapterError::Transport(e.to_string()),
        }
    }
}
