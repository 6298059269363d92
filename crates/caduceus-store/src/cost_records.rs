//! Cost record persistence and rollups.

use crate::error::Result;
use sqlx::SqlitePool;

/// One persisted cost record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CostRecordRow {
    /// Record id (UUID)
    pub id: String,
    /// Request the spend belongs to
    pub request_id: String,
    /// Model invoked
    pub model: String,
    /// Input tokens consumed
    pub input_tokens: i64,
    /// Output tokens generated
    pub output_tokens: i64,
    /// Cost in USD
    pub cost_usd: f64,
    /// Whether the response came from the cache
    pub cache_hit: bool,
    /// Role of the requesting user
    pub role: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// Aggregate spend statistics.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CostSummary {
    /// Number of records in the period
    pub total_requests: i64,
    /// Total spend in USD
    pub total_cost_usd: f64,
    /// Number of cache hits
    pub cache_hits: i64,
}

/// Per-model usage rollup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModelUsageRow {
    /// Model name
    pub model: String,
    /// Requests served by the model
    pub requests: i64,
    /// Spend attributed to the model in USD
    pub cost_usd: f64,
}

/// Insert a cost record.
pub async fn insert_record(pool: &SqlitePool, record: &CostRecordRow) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO cost_records
            (id, request_id, model, input_tokens, output_tokens, cost_usd, cache_hit, role, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&record.id)
    .bind(&record.request_id)
    .bind(&record.model)
    .bind(record.input_tokens)
    .bind(record.output_tokens)
    .bind(record.cost_usd)
    .bind(record.cache_hit)
    .bind(&record.role)
    .bind(&record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Aggregate spend since the given RFC 3339 timestamp.
pub async fn summary_since(pool: &SqlitePool, since: &str) -> Result<CostSummary> {
    let summary = sqlx::query_as::<_, CostSummary>(
        r"
        SELECT
            COUNT(*) AS total_requests,
            COALESCE(SUM(cost_usd), 0.0) AS total_cost_usd,
            COALESCE(SUM(CASE WHEN cache_hit THEN 1 ELSE 0 END), 0) AS cache_hits
        FROM cost_records
        WHERE created_at >= ?
        ",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

/// Per-model usage since the given RFC 3339 timestamp, costliest first.
pub async fn usage_by_model(pool: &SqlitePool, since: &str) -> Result<Vec<ModelUsageRow>> {
    let rows = sqlx::query_as::<_, ModelUsageRow>(
        r"
        SELECT
            model,
            COUNT(*) AS requests,
            COALESCE(SUM(cost_usd), 0.0) AS cost_usd
        FROM cost_records
        WHERE created_at >= ?
        GROUP BY model
        ORDER BY cost_usd DESC
        ",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
