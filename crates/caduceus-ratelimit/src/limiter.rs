//! Hourly window bookkeeping and admission decisions.

use caduceus_core::config::LimitsConfig;
use caduceus_core::{Timestamp, UserId, UserRole};
use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which ceiling rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Requests-per-hour ceiling
    Requests,
    /// Spend-per-hour ceiling
    Budget,
}

/// Outcome of an admission check.
#[derive(Debug, Clone)]
pub struct RateDecision {
    /// Whether the request was admitted (and its cost consumed)
    pub allowed: bool,

    /// Requests left in the current window after this decision
    pub remaining_requests: u32,

    /// Spend left in the current window after this decision, in USD
    pub remaining_cost_usd: f64,

    /// Start of the next window; callers report this as retry-after
    pub reset_at: Timestamp,

    /// Which ceiling rejected the request, when `allowed` is false
    pub rejected_by: Option<LimitKind>,
}

/// Current window counters, without consuming anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateUsage {
    /// Requests consumed in the current window
    pub requests: u32,
    /// Spend consumed in the current window, in USD
    pub cost_usd: f64,
    /// Start of the next window
    pub reset_at: Timestamp,
}

#[derive(Debug)]
struct RateWindow {
    window_start: Timestamp,
    count: u32,
    cost_usd: f64,
}

impl RateWindow {
    fn fresh(window_start: Timestamp) -> Self {
        Self {
            window_start,
            count: 0,
            cost_usd: 0.0,
        }
    }
}

/// Role-aware rate limiter over fixed hourly windows.
///
/// Windows are keyed by (user, role). A window belonging to a previous
/// hour is reset to zero before the check, so counters never leak across
/// the hour boundary. Checks and increments for one key are serialized
/// through a per-key mutex; different keys never contend.
#[derive(Debug)]
pub struct RateLimiter {
    limits: LimitsConfig,
    windows: Mutex<HashMap<(UserId, UserRole), Arc<Mutex<RateWindow>>>>,
}

impl RateLimiter {
    /// Create a limiter with the given role ceilings.
    #[must_use]
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check quotas for the user and role; on admission, consume one
    /// request and `candidate_cost` atomically with the check.
    pub async fn check_and_consume(
        &self,
        user: &UserId,
        role: UserRole,
        candidate_cost: f64,
    ) -> RateDecision {
        self.check_and_consume_at(user, role, candidate_cost, Utc::now())
            .await
    }

    /// Clock-injected variant of [`check_and_consume`](Self::check_and_consume).
    pub async fn check_and_consume_at(
        &self,
        user: &UserId,
        role: UserRole,
        candidate_cost: f64,
        now: Timestamp,
    ) -> RateDecision {
        let limit = self.limits.for_role(role);
        let window_start = floor_to_hour(now);
        let handle = self.window_for(user, role, window_start).await;
        let mut window = handle.lock().await;

        // A stale window belongs to a previous hour; reset before checking.
        if window.window_start < window_start {
            *window = RateWindow::fresh(window_start);
        }

        let reset_at = window.window_start + Duration::hours(1);

        let over_requests = window.count + 1 > limit.max_requests;
        let over_budget = window.cost_usd + candidate_cost > limit.max_cost_usd;

        if over_requests || over_budget {
            let rejected_by = if over_requests {
                LimitKind::Requests
            } else {
                LimitKind::Budget
            };
            tracing::info!(
                user = %user,
                role = %role,
                ?rejected_by,
                "rate limit rejection"
            );
            return RateDecision {
                allowed: false,
                remaining_requests: limit.max_requests.saturating_sub(window.count),
                remaining_cost_usd: (limit.max_cost_usd - window.cost_usd).max(0.0),
                reset_at,
                rejected_by: Some(rejected_by),
            };
        }

        window.count += 1;
        window.cost_usd += candidate_cost;

        RateDecision {
            allowed: true,
            remaining_requests: limit.max_requests - window.count,
            remaining_cost_usd: (limit.max_cost_usd - window.cost_usd).max(0.0),
            reset_at,
            rejected_by: None,
        }
    }

    /// Report the current window's counters without consuming.
    pub async fn usage(&self, user: &UserId, role: UserRole) -> RateUsage {
        self.usage_at(user, role, Utc::now()).await
    }

    /// Clock-injected variant of [`usage`](Self::usage).
    pub async fn usage_at(&self, user: &UserId, role: UserRole, now: Timestamp) -> RateUsage {
        let window_start = floor_to_hour(now);
        let handle = {
            let windows = self.windows.lock().await;
            windows.get(&(user.clone(), role)).cloned()
        };

        match handle {
            Some(handle) => {
                let window = handle.lock().await;
                if window.window_start < window_start {
                    RateUsage {
                        requests: 0,
                        cost_usd: 0.0,
                        reset_at: window_start + Duration::hours(1),
                    }
                } else {
                    RateUsage {
                        requests: window.count,
                        cost_usd: window.cost_usd,
                        reset_at: window.window_start + Duration::hours(1),
                    }
                }
            }
            None => RateUsage {
                requests: 0,
                cost_usd: 0.0,
                reset_at: window_start + Duration::hours(1),
            },
        }
    }

    /// Drop windows that ended before `now` (maintenance sweep).
    ///
    /// Stale windows also reset lazily on first touch, so this only
    /// bounds memory for keys that never return.
    pub async fn purge_stale_at(&self, now: Timestamp) -> usize {
        let window_start = floor_to_hour(now);
        let handles: Vec<((UserId, UserRole), Arc<Mutex<RateWindow>>)> = {
            let windows = self.windows.lock().await;
            windows.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut stale = Vec::new();
        for (key, handle) in handles {
            let window = handle.lock().await;
            if window.window_start < window_start {
                stale.push(key);
            }
        }

        let mut windows = self.windows.lock().await;
        let mut removed = 0;
        for key in stale {
            if windows.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// The configured ceilings (for metadata reporting).
    #[must_use]
    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    async fn window_for(
        &self,
        user: &UserId,
        role: UserRole,
        window_start: Timestamp,
    ) -> Arc<Mutex<RateWindow>> {
        let mut windows = self.windows.lock().await;
        windows
            .entry((user.clone(), role))
            .or_insert_with(|| Arc::new(Mutex::new(RateWindow::fresh(window_start))))
            .clone()
    }
}

/// Floor a timestamp to the start of its hour.
fn floor_to_hour(now: Timestamp) -> Timestamp {
    let secs = now.timestamp() - now.timestamp().rem_euclid(3600);
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(now)
}
