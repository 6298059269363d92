//! Cost computation and the append-only spend ledger.

use caduceus_core::config::PricingConfig;
use caduceus_core::{RequestId, Timestamp, UserRole};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// One priced backend call (or cache hit). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    /// Request this spend belongs to
    pub request_id: RequestId,

    /// Model invoked (or whose cached response was served)
    pub model: String,

    /// Input tokens consumed (zero on cache hit)
    pub input_tokens: u32,

    /// Output tokens generated (zero on cache hit)
    pub output_tokens: u32,

    /// Computed cost in USD (zero on cache hit)
    pub cost_usd: f64,

    /// Whether the response came from the cache
    pub cache_hit: bool,

    /// Role of the requesting user
    pub role: UserRole,

    /// When the record was appended
    pub timestamp: Timestamp,
}

/// Compute the USD cost of a call from the injected pricing table.
///
/// An unpriced model costs zero and logs a warning rather than failing
/// the request.
#[must_use]
pub fn compute_cost(
    pricing: &PricingConfig,
    model: &str,
    input_tokens: u32,
    output_tokens: u32,
) -> f64 {
    match pricing.for_model(model) {
        Some(entry) => {
            let input_cost = f64::from(input_tokens) / 1000.0 * entry.input_per_1k;
            let output_cost = f64::from(output_tokens) / 1000.0 * entry.output_per_1k;
            input_cost + output_cost
        }
        None => {
            tracing::warn!(model, "no pricing entry for model, recording zero cost");
            0.0
        }
    }
}

/// In-memory append-only ledger of cost records.
#[derive(Debug, Default)]
pub struct CostLedger {
    records: Mutex<Vec<CostRecord>>,
}

impl CostLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub async fn record(&self, record: CostRecord) {
        tracing::debug!(
            request_id = %record.request_id,
            model = %record.model,
            cost_usd = record.cost_usd,
            cache_hit = record.cache_hit,
            "cost recorded"
        );
        self.records.lock().await.push(record);
    }

    /// Total spend across all records, in USD.
    pub async fn total_cost_usd(&self) -> f64 {
        self.records.lock().await.iter().map(|r| r.cost_usd).sum()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the ledger is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Number of records that were cache hits.
    pub async fn cache_hits(&self) -> usize {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.cache_hit)
            .count()
    }

    /// Clone out all records (for audit persistence and reporting).
    pub async fn records(&self) -> Vec<CostRecord> {
        self.records.lock().await.clone()
    }
}
