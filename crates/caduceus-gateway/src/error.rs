//! Error types for the model gateway.

use thiserror::Error;

/// Errors that can occur during routing and backend calls.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend communication error
    #[error("backend error ({backend}): {message}")]
    Backend {
        /// Backend identifier
        backend: String,
        /// Error message
        message: String,
    },

    /// API error with status code
    #[error("API error ({backend}): status {status}, {message}")]
    Api {
        /// Backend identifier
        backend: String,
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Response parsing error
    #[error("failed to parse response from {backend}: {message}")]
    Parse {
        /// Backend identifier
        backend: String,
        /// Error message
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend call exceeded the configured timeout
    #[error("backend call timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// All retry attempts exhausted
    #[error("backend call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Display form of the final error
        last_error: String,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transient transport failures, timeouts, and server-side errors are
    /// retryable; malformed responses and client errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } | Self::Backend { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
