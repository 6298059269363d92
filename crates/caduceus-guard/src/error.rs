//! Error types for threat assessment.

use thiserror::Error;

/// Errors that can occur during content-safety evaluation.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Detector failed to evaluate the text
    #[error("detector error ({detector}): {message}")]
    Detector {
        /// Detector name
        detector: String,
        /// Error message
        message: String,
    },

    /// Detector did not answer within the configured timeout
    #[error("detector {detector} timed out after {millis}ms")]
    DetectorTimeout {
        /// Detector name
        detector: String,
        /// Timeout in milliseconds
        millis: u64,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
