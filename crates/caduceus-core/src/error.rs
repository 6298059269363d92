//! Core error types for the Caduceus pipeline.
//!
//! This module defines the central error type used across all subsystems.
//! Each subsystem error is represented as a variant for clear error propagation.

use thiserror::Error;

/// Central error type for all Caduceus operations.
///
/// Each variant represents an error from a specific subsystem, allowing
/// for clear error propagation and handling across module boundaries.
#[derive(Error, Debug)]
pub enum CaduceusError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Redaction errors (mapping store, placeholder substitution)
    #[error("redaction error: {0}")]
    Redaction(String),

    /// Threat assessment errors (detector failures, rule evaluation)
    #[error("threat assessment error: {0}")]
    Threat(String),

    /// Rate limiting errors (window bookkeeping)
    #[error("rate limit error: {0}")]
    RateLimit(String),

    /// Model gateway errors (backend calls, routing, caching)
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Storage errors (connection, queries, migrations)
    #[error("storage error: {0}")]
    Storage(String),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found (may be first run)
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `CaduceusError`.
pub type Result<T> = std::result::Result<T, CaduceusError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
