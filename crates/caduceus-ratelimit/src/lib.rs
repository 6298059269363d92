//! Caduceus Ratelimit - role-based hourly request and spend quotas.
//!
//! Each (user, role) pair owns one active hourly window. Admission checks
//! the request count and the cumulative cost against the role's ceilings
//! and consumes both atomically inside a per-key critical section.
//!
//! # Example
//!
//! ```rust
//! use caduceus_core::{config::LimitsConfig, UserId, UserRole};
//! use caduceus_ratelimit::RateLimiter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(LimitsConfig::default());
//! let user = UserId::new("alice")?;
//!
//! let decision = limiter
//!     .check_and_consume(&user, UserRole::Patient, 0.01)
//!     .await;
//! assert!(decision.allowed);
//! assert_eq!(decision.remaining_requests, 9);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod limiter;

// Re-export commonly used types
pub use limiter::{LimitKind, RateDecision, RateLimiter, RateUsage};
