//! Caduceus Database Layer
//!
//! Provides `SQLite` persistence for pipeline audit events and cost
//! records. Uses `SQLx` with embedded, versioned migrations.
//!
//! # Example
//!
//! ```ignore
//! use caduceus_store::Database;
//!
//! let db = Database::connect(":memory:").await?;
//! db.run_migrations().await?;
//! ```
//!
//! # Design Principles
//!
//! - Original entity values never reach this layer; audit rows carry
//!   placeholder kinds and counts only
//! - Migrations run explicitly at startup, tracked by `SQLx`
//! - Writes are fire-and-forget from the pipeline's perspective; a
//!   failed insert is logged, never propagated into a request

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod audit_events;
pub mod connection;
pub mod cost_records;
pub mod error;
pub mod migrations;

pub use audit_events::AuditEventRow;
pub use connection::Database;
pub use cost_records::{CostRecordRow, CostSummary, ModelUsageRow};
pub use error::{DatabaseError, Result};
