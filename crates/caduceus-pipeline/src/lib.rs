//! Caduceus Pipeline - the request lifecycle orchestrator.
//!
//! This crate sequences the security and cost-optimization stages into one
//! request lifecycle:
//!
//! ```text
//! Received → Redacted → Assessed → {Blocked | RateLimited | Routed}
//!                                          → Completed | Failed
//! ```
//!
//! Every path, including refusals and failures, emits an audit event
//! through a pluggable [`AuditSink`]. Background maintenance sweeps purge
//! expired mapping sets, cache entries, and stale rate windows without
//! blocking request handling.
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus_core::{OwnerKey, PipelineConfig, UserRole};
//! use caduceus_gateway::OpenAiBackend;
//! use caduceus_guard::{PatternThreatDetector, ThreatAssessor};
//! use caduceus_pipeline::{ChatPipeline, TracingAuditSink};
//! use caduceus_redaction::RegexEntityDetector;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let assessor = ThreatAssessor::new(config.threat.clone())
//!     .with_detector(Arc::new(PatternThreatDetector::new()));
//! let backend = OpenAiBackend::new("api-key", &config.upstream)?;
//!
//! let pipeline = ChatPipeline::new(
//!     config,
//!     Arc::new(RegexEntityDetector::new()),
//!     assessor,
//!     Arc::new(backend),
//!     Arc::new(TracingAuditSink::new()),
//! );
//!
//! let owner = OwnerKey::new("alice", "s1")?;
//! let outcome = pipeline
//!     .process_chat_request(&owner, UserRole::Patient, "I have a headache")
//!     .await?;
//! println!("{}", outcome.response_text);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod audit;
pub mod error;
pub mod latency;
pub mod orchestrator;
pub mod sweep;

// Re-export commonly used types
pub use audit::{AuditEvent, AuditEventType, AuditSink, SqliteAuditSink, TracingAuditSink};
pub use error::{PipelineError, Result};
pub use latency::{StageTimer, StageTimings};
pub use orchestrator::{ChatOutcome, ChatPipeline, ChatStatus, EntityCount, ResponseMetadata};
pub use sweep::{spawn_maintenance, MaintenanceTask};
