//! Audit event model and sinks.
//!
//! Every request outcome, including refusals and failures, produces an
//! audit event. Sinks are fire-and-forget: a sink that cannot record an
//! event logs the problem and swallows it, never failing the request.

use async_trait::async_trait;
use caduceus_core::{RequestId, Timestamp, UserId, UserRole};
use caduceus_gateway::CostRecord;
use caduceus_store::{audit_events, cost_records, AuditEventRow, CostRecordRow, Database};
use chrono::Utc;
use serde_json::Value;

/// Category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventType {
    /// Entities were masked on the inbound message
    Redaction,
    /// Threat assessment ran (any action)
    ThreatEvaluation,
    /// Request refused by threat assessment
    ThreatBlocked,
    /// Request rejected by quota enforcement
    RateLimited,
    /// Request completed with a response
    Completion,
    /// Request failed on a collaborator error
    Failure,
    /// Background maintenance ran
    Maintenance,
}

impl AuditEventType {
    /// Stable string label used in persisted rows.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redaction => "redaction",
            Self::ThreatEvaluation => "threat_evaluation",
            Self::ThreatBlocked => "threat_blocked",
            Self::RateLimited => "rate_limited",
            Self::Completion => "completion",
            Self::Failure => "failure",
            Self::Maintenance => "maintenance",
        }
    }
}

/// One audit event.
///
/// `detail` carries structured context (placeholder kinds and counts,
/// assessment summaries, raw collaborator errors). Original entity values
/// must never be placed in it.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event id
    pub id: String,

    /// Request the event belongs to
    pub request_id: RequestId,

    /// When the event occurred
    pub timestamp: Timestamp,

    /// Event category
    pub event_type: AuditEventType,

    /// User the request came from
    pub user: UserId,

    /// Role of the user
    pub role: UserRole,

    /// Outcome label, e.g. `ok`, `blocked`, `failed`
    pub outcome: String,

    /// Structured detail payload
    pub detail: Value,

    /// Cost record to persist alongside the event, when the stage spent
    /// (or explicitly saved) money
    pub cost: Option<CostRecord>,
}

impl AuditEvent {
    /// Create an event with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        event_type: AuditEventType,
        user: UserId,
        role: UserRole,
        outcome: impl Into<String>,
        detail: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id,
            timestamp: Utc::now(),
            event_type,
            user,
            role,
            outcome: outcome.into(),
            detail,
            cost: None,
        }
    }

    /// Attach a cost record.
    #[must_use]
    pub fn with_cost(mut self, cost: CostRecord) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Capability for audit persistence.
///
/// Implementations must swallow their own failures: recording is
/// fire-and-forget and must never fail the request being audited.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an event.
    async fn record(&self, event: AuditEvent);
}

/// Sink that emits audit events to the tracing subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink {
    _private: (),
}

impl TracingAuditSink {
    /// Create the sink.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "caduceus::audit",
            event_id = %event.id,
            request_id = %event.request_id,
            event_type = event.event_type.as_str(),
            user = %event.user,
            role = %event.role,
            outcome = %event.outcome,
            detail = %event.detail,
            "audit event"
        );
    }
}

/// Sink that persists events (and attached cost records) to SQLite.
#[derive(Debug, Clone)]
pub struct SqliteAuditSink {
    db: Database,
}

impl SqliteAuditSink {
    /// Create a sink over an already-migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(&self, event: AuditEvent) {
        let row = AuditEventRow {
            id: event.id.clone(),
            request_id: event.request_id.to_string(),
            event_type: event.event_type.as_str().to_string(),
            user_id: event.user.to_string(),
            role: event.role.as_str().to_string(),
            outcome: event.outcome.clone(),
            detail: event.detail.to_string(),
            created_at: event.timestamp.to_rfc3339(),
        };

        if let Err(err) = audit_events::insert_event(self.db.pool(), &row).await {
            tracing::error!(error = %err, event_id = %event.id, "failed to persist audit event");
        }

        if let Some(cost) = &event.cost {
            let cost_row = CostRecordRow {
                id: uuid::Uuid::new_v4().to_string(),
                request_id: cost.request_id.to_string(),
                model: cost.model.clone(),
                input_tokens: i64::from(cost.input_tokens),
                output_tokens: i64::from(cost.output_tokens),
                cost_usd: cost.cost_usd,
                cache_hit: cost.cache_hit,
                role: cost.role.as_str().to_string(),
                created_at: cost.timestamp.to_rfc3339(),
            };
            if let Err(err) = cost_records::insert_record(self.db.pool(), &cost_row).await {
                tracing::error!(error = %err, event_id = %event.id, "failed to persist cost record");
            }
        }
    }
}
