//! Caduceus Gateway - cost-aware model routing with response caching.
//!
//! This crate scores query complexity, picks the cheapest adequate model
//! for the caller's role, short-circuits repeat queries through a TTL+LRU
//! cache, and tracks every dollar spent against an injected pricing table.
//! The LLM itself sits behind the [`ModelBackend`] trait; an
//! OpenAI-compatible HTTP backend is included.
//!
//! # Example
//!
//! ```rust,no_run
//! use caduceus_core::{PipelineConfig, RequestId, UserRole};
//! use caduceus_gateway::{CostRouter, OpenAiBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let backend = OpenAiBackend::new("api-key", &config.upstream)?;
//! let router = CostRouter::new(Arc::new(backend), &config);
//!
//! let routed = router
//!     .execute(&RequestId::generate(), "What helps with a mild headache?", UserRole::Patient)
//!     .await?;
//! println!("{} (model {}, ${:.4})", routed.text, routed.model, routed.cost_usd);
//! # Ok(())
//! # }
//! ```
//!
//! # Routing Model
//!
//! ```text
//! message → complexity score → role-restricted model choice → cache lookup
//!                                   hit ↓                        ↓ miss
//!                     cached payload, zero cost      backend call (retries, timeout)
//!                                                    → price → cache store → ledger
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod cache;
pub mod complexity;
pub mod cost;
pub mod error;
pub mod providers;
pub mod router;

// Re-export commonly used types
pub use backend::{CompletionRequest, ModelBackend, ModelCompletion};
pub use cache::{cache_key, CachedResponse, ResponseCache};
pub use complexity::ComplexityScorer;
pub use cost::{compute_cost, CostLedger, CostRecord};
pub use error::{GatewayError, Result};
pub use providers::OpenAiBackend;
pub use router::{CostRouter, RoutedResponse};
