//! Error types for the redaction subsystem.

use thiserror::Error;

/// Errors that can occur during entity detection and redaction.
#[derive(Error, Debug)]
pub enum RedactionError {
    /// An entity detector failed to evaluate the text
    #[error("detector error ({detector}): {message}")]
    Detector {
        /// Detector identifier
        detector: String,
        /// Error message
        message: String,
    },

    /// No mapping set exists for the owner key
    #[error("no mapping set for owner {owner}")]
    OwnerNotFound {
        /// Owner key in display form
        owner: String,
    },

    /// Placeholder not present in the owner's mapping set
    #[error("placeholder {placeholder} not found for owner {owner}")]
    PlaceholderNotFound {
        /// Owner key in display form
        owner: String,
        /// Placeholder id that failed to resolve
        placeholder: String,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for redaction operations.
pub type Result<T> = std::result::Result<T, RedactionError>;
