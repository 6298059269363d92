//! Error types for the pipeline orchestrator.

use thiserror::Error;

/// Errors surfaced by the pipeline to its caller.
///
/// Refusals (threat blocks, rate limits) are not errors; they are
/// successful outcomes carrying an explanatory response. This enum covers
/// genuine failures, and its display strings are deliberately generic:
/// raw collaborator errors are captured only in the audit record.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A collaborator failed in a way retries could not recover
    #[error("processing failed, please try again later")]
    Processing,

    /// Invalid caller input (bad identifiers)
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
