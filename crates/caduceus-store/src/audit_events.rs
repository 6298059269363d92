//! Audit event persistence.

use crate::error::Result;
use sqlx::SqlitePool;

/// One audit event row.
///
/// `detail` holds a JSON object; original entity values never appear in
/// it, only placeholder kinds and counts.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEventRow {
    /// Event id (UUID)
    pub id: String,
    /// Request the event belongs to
    pub request_id: String,
    /// Event type label, e.g. `completion` or `threat_blocked`
    pub event_type: String,
    /// User the request came from
    pub user_id: String,
    /// Role of the user
    pub role: String,
    /// Outcome label, e.g. `ok`, `blocked`, `failed`
    pub outcome: String,
    /// JSON detail payload
    pub detail: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// Insert an audit event.
pub async fn insert_event(pool: &SqlitePool, event: &AuditEventRow) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO audit_events
            (id, request_id, event_type, user_id, role, outcome, detail, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&event.id)
    .bind(&event.request_id)
    .bind(&event.event_type)
    .bind(&event.user_id)
    .bind(&event.role)
    .bind(&event.outcome)
    .bind(&event.detail)
    .bind(&event.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the most recent events, newest first.
pub async fn recent_events(pool: &SqlitePool, limit: i64) -> Result<Vec<AuditEventRow>> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        r"
        SELECT id, request_id, event_type, user_id, role, outcome, detail, created_at
        FROM audit_events
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch all events for one request, oldest first.
pub async fn events_for_request(
    pool: &SqlitePool,
    request_id: &str,
) -> Result<Vec<AuditEventRow>> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        r"
        SELECT id, request_id, event_type, user_id, role, outcome, detail, created_at
        FROM audit_events
        WHERE request_id = ?
        ORDER BY created_at ASC, id ASC
        ",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
