//! Caduceus Core - Foundation crate for the Caduceus chat-security pipeline.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Caduceus crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`UserId`, `SessionId`, `OwnerKey`, `UserRole`, `EntityKind`)
//!
//! # Example
//!
//! ```rust
//! use caduceus_core::{OwnerKey, PipelineConfig, UserRole};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! assert!(config.threat.block_threshold > config.threat.warning_threshold);
//!
//! let owner = OwnerKey::new("user-42", "session-1")?;
//! assert_eq!(owner.to_string(), "user-42:session-1");
//!
//! let limit = config.limits.for_role(UserRole::Patient);
//! assert_eq!(limit.max_requests, 10);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    CacheConfig, LimitsConfig, ModelPricing, PipelineConfig, PricingConfig, RedactionConfig,
    RoleLimit, RoutingConfig, ThreatConfig, UpstreamConfig,
};
pub use error::{CaduceusError, ConfigError, ConfigResult, Result};
pub use types::{EntityKind, OwnerKey, RequestId, SessionId, Timestamp, UserId, UserRole};
