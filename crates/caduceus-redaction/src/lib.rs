//! Caduceus Redaction - reversible masking of sensitive entities.
//!
//! This crate turns detected entities into typed placeholders before text
//! leaves the trust boundary, and restores the original values on the way
//! back. Detection itself is pluggable behind the [`EntityDetector`] trait;
//! a regex-based reference detector is included.
//!
//! # Example
//!
//! ```rust
//! use caduceus_core::OwnerKey;
//! use caduceus_redaction::{
//!     EntityDetector, MappingStore, RedactionEngine, RegexEntityDetector,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MappingStore::with_retention_hours(24));
//! let engine = RedactionEngine::new(store);
//! let detector = RegexEntityDetector::new();
//!
//! let owner = OwnerKey::new("alice", "s1")?;
//! let text = "Call me at 555-123-4567";
//! let entities = detector.detect(text).await?;
//!
//! let result = engine.redact(&owner, text, entities).await?;
//! assert_eq!(result.redacted_text, "Call me at [PHONE_NUMBER_1]");
//!
//! let restored = engine.deanonymize(&owner, &result.redacted_text).await;
//! assert_eq!(restored.text, text);
//! # Ok(())
//! # }
//! ```
//!
//! # Redaction Model
//!
//! ```text
//! Raw Text → EntityDetector → RedactionEngine::redact → [KIND_n] placeholders
//!                                                              ↓
//! Restored Text ← RedactionEngine::deanonymize ← Response with placeholders
//! ```
//!
//! Placeholder mappings are scoped to an owner key (user + session) and
//! expire after a retention window enforced by a background sweep.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod detector;
pub mod engine;
pub mod error;
pub mod mapping;

// Re-export commonly used types
pub use detector::{DetectedEntity, EntityDetector, RegexEntityDetector};
pub use engine::{Deanonymized, RedactionEngine, RedactionResult};
pub use error::{RedactionError, Result};
pub use mapping::{MappingRecord, MappingStore};
