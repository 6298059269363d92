//! Per-stage latency measurement.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Millisecond latency breakdown for one request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Entity detection plus placeholder substitution
    pub redaction_ms: u64,
    /// Threat assessment (detector fan-out and rules)
    pub assessment_ms: u64,
    /// Rate limit admission check
    pub rate_check_ms: u64,
    /// Routing, cache lookup, and backend call
    pub routing_ms: u64,
    /// Whole request, received to response
    pub total_ms: u64,
}

/// Stopwatch for one stage.
#[derive(Debug)]
pub struct StageTimer {
    started: Instant,
}

impl StageTimer {
    /// Start timing now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Elapsed milliseconds since start.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_measures_elapsed_time() {
        let timer = StageTimer::start();
        tokio::time::sleep(std::time::Duration::from_millis(15)).await;
        assert!(timer.elapsed_ms() >= 10);
    }

    #[test]
    fn test_timings_serialize() {
        let timings = StageTimings {
            redaction_ms: 2,
            assessment_ms: 5,
            rate_check_ms: 0,
            routing_ms: 120,
            total_ms: 127,
        };
        let json = serde_json::to_value(timings).expect("serialize timings");
        assert_eq!(json["routing_ms"], 120);
    }
}
