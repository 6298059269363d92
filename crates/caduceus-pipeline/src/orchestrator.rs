//! The chat pipeline state machine.
//!
//! `Received → Redacted → Assessed → {Blocked | RateLimited | Routed} →
//! Completed | Failed`. Redaction never blocks; the assessor runs on the
//! redacted text; refusals are successful outcomes with explanatory
//! responses; collaborator failures surface as a generic error while the
//! raw detail goes to the audit record.

use crate::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::error::{PipelineError, Result};
use crate::latency::{StageTimer, StageTimings};
use caduceus_core::{
    EntityKind, OwnerKey, PipelineConfig, RequestId, Timestamp, UserRole,
};
use caduceus_gateway::{CostRecord, CostRouter, ModelBackend};
use caduceus_guard::{rules, ThreatAction, ThreatAssessment, ThreatAssessor};
use caduceus_ratelimit::{LimitKind, RateLimiter};
use caduceus_redaction::{
    EntityDetector, MappingRecord, MappingStore, RedactionEngine, RedactionResult,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Fixed refusal notice returned on a threat block.
const BLOCKED_MESSAGE: &str = "This request can't be completed because it conflicts with our \
     safety guidelines. If you have questions about your health, please contact your \
     healthcare provider.";

/// Terminal state of a processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// A response was produced (cached or live)
    Completed,
    /// Refused by threat assessment
    Blocked,
    /// Rejected by quota enforcement
    RateLimited,
}

/// Placeholder count for one entity kind. Original values never appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCount {
    /// Entity kind
    pub kind: EntityKind,
    /// Number of placeholders of that kind
    pub count: usize,
}

/// Metadata returned alongside every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Request id for correlation with audit records
    pub request_id: RequestId,

    /// Entities redacted, as kind + count
    pub entities_redacted: Vec<EntityCount>,

    /// One-line risk assessment summary
    pub risk_summary: String,

    /// Combined risk score in [0, 1]
    pub risk_score: f64,

    /// Requests remaining in the current rate window
    pub rate_remaining_requests: u32,

    /// When the current rate window resets
    pub rate_reset_at: Timestamp,

    /// Model that served the request (absent on refusals)
    pub model: Option<String>,

    /// Whether the response came from the cache
    pub cache_hit: bool,

    /// Cost of this request in USD
    pub cost_usd: f64,

    /// Per-stage latency breakdown
    pub latency: StageTimings,

    /// Detectors that failed or timed out during assessment
    pub degraded_detectors: Vec<String>,
}

/// Final outcome of one request.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Terminal state
    pub status: ChatStatus,

    /// Response text (an answer, a refusal, or a quota notice)
    pub response_text: String,

    /// Request metadata
    pub metadata: ResponseMetadata,
}

/// Sequences redaction, assessment, quota enforcement, routing, and
/// de-anonymization into one request lifecycle, emitting audit events at
/// every terminal edge.
pub struct ChatPipeline {
    entity_detector: Arc<dyn EntityDetector>,
    engine: RedactionEngine,
    mapping_store: Arc<MappingStore>,
    assessor: ThreatAssessor,
    limiter: Arc<RateLimiter>,
    router: Arc<CostRouter>,
    audit: Arc<dyn AuditSink>,
    detection_timeout: Duration,
}

impl ChatPipeline {
    /// Assemble a pipeline from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        entity_detector: Arc<dyn EntityDetector>,
        assessor: ThreatAssessor,
        backend: Arc<dyn ModelBackend>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let mapping_store = Arc::new(MappingStore::with_retention_hours(
            config.redaction.retention_hours,
        ));

        Self {
            entity_detector,
            engine: RedactionEngine::new(mapping_store.clone()),
            mapping_store,
            assessor,
            limiter: Arc::new(RateLimiter::new(config.limits.clone())),
            router: Arc::new(CostRouter::new(backend, &config)),
            audit,
            detection_timeout: Duration::from_millis(config.threat.detector_timeout_ms),
        }
    }

    /// Process one inbound chat message through the full pipeline.
    ///
    /// Refusals (block, rate limit) return `Ok` with the matching
    /// [`ChatStatus`]; only unrecoverable collaborator failures return an
    /// error, and that error is generic by design.
    pub async fn process_chat_request(
        &self,
        owner: &OwnerKey,
        role: UserRole,
        raw_message: &str,
    ) -> Result<ChatOutcome> {
        let request_id = RequestId::generate();
        let total = StageTimer::start();
        let mut timings = StageTimings::default();

        tracing::info!(request_id = %request_id, owner = %owner, role = %role, "request received");

        // Received → Redacted. Detection degrades to an empty entity list;
        // redaction itself never blocks the request.
        let stage = StageTimer::start();
        let (entities, detection_degraded) = self.detect_entities(raw_message).await;
        let redaction = match self.engine.redact(owner, raw_message, entities).await {
            Ok(redaction) => redaction,
            Err(err) => {
                self.audit_failure(&request_id, owner, role, &err.to_string(), &timings)
                    .await;
                return Err(PipelineError::Processing);
            }
        };
        timings.redaction_ms = stage.elapsed_ms();

        self.audit
            .record(AuditEvent::new(
                request_id.clone(),
                AuditEventType::Redaction,
                owner.user.clone(),
                role,
                "ok",
                json!({
                    "entities": entity_counts(&redaction),
                    "dropped_overlaps": redaction.dropped_overlaps,
                    "detection_degraded": detection_degraded,
                }),
            ))
            .await;

        // Redacted → Assessed. The assessor sees only placeholders.
        let stage = StageTimer::start();
        let assessment = self.assessor.assess(&redaction.redacted_text).await;
        timings.assessment_ms = stage.elapsed_ms();

        if assessment.action == ThreatAction::Block {
            timings.total_ms = total.elapsed_ms();
            return Ok(self
                .finish_blocked(&request_id, owner, role, &redaction, &assessment, timings)
                .await);
        }

        // Assessed → RateLimited | Routed.
        let stage = StageTimer::start();
        let estimate = self
            .router
            .estimate_cost(&redaction.redacted_text, role);
        let decision = self
            .limiter
            .check_and_consume(&owner.user, role, estimate)
            .await;
        timings.rate_check_ms = stage.elapsed_ms();

        if !decision.allowed {
            timings.total_ms = total.elapsed_ms();
            let kind = decision.rejected_by.unwrap_or(LimitKind::Requests);
            self.audit
                .record(AuditEvent::new(
                    request_id.clone(),
                    AuditEventType::RateLimited,
                    owner.user.clone(),
                    role,
                    "rejected",
                    json!({
                        "limit": match kind {
                            LimitKind::Requests => "requests",
                            LimitKind::Budget => "budget",
                        },
                        "reset_at": decision.reset_at.to_rfc3339(),
                        "estimated_cost_usd": estimate,
                    }),
                ))
                .await;

            let metadata = ResponseMetadata {
                request_id,
                entities_redacted: entity_counts(&redaction),
                risk_summary: assessment.summary(),
                risk_score: assessment.combined_score,
                rate_remaining_requests: decision.remaining_requests,
                rate_reset_at: decision.reset_at,
                model: None,
                cache_hit: false,
                cost_usd: 0.0,
                latency: timings,
                degraded_detectors: assessment.degraded,
            };

            return Ok(ChatOutcome {
                status: ChatStatus::RateLimited,
                response_text: rate_limited_message(kind, decision.reset_at),
                metadata,
            });
        }

        // Routed → Completed | Failed.
        let stage = StageTimer::start();
        let routed = match self
            .router
            .execute(&request_id, &redaction.redacted_text, role)
            .await
        {
            Ok(routed) => routed,
            Err(err) => {
                timings.routing_ms = stage.elapsed_ms();
                timings.total_ms = total.elapsed_ms();
                self.audit_failure(&request_id, owner, role, &err.to_string(), &timings)
                    .await;
                return Err(PipelineError::Processing);
            }
        };
        timings.routing_ms = stage.elapsed_ms();

        // De-anonymize and apply output-side safety additions.
        let restored = self.engine.deanonymize(owner, &routed.text).await;
        if !restored.unresolved.is_empty() {
            tracing::warn!(
                request_id = %request_id,
                unresolved = restored.unresolved.len(),
                "response contained unresolvable placeholders"
            );
        }
        let response_text = finalize_response(restored.text, &assessment);

        timings.total_ms = total.elapsed_ms();

        let cost_record = CostRecord {
            request_id: request_id.clone(),
            model: routed.model.clone(),
            input_tokens: routed.input_tokens,
            output_tokens: routed.output_tokens,
            cost_usd: routed.cost_usd,
            cache_hit: routed.cache_hit,
            role,
            timestamp: Utc::now(),
        };

        self.audit
            .record(
                AuditEvent::new(
                    request_id.clone(),
                    AuditEventType::Completion,
                    owner.user.clone(),
                    role,
                    "ok",
                    json!({
                        "entities": entity_counts(&redaction),
                        "assessment": assessment.summary(),
                        "model": routed.model,
                        "cache_hit": routed.cache_hit,
                        "cost_usd": routed.cost_usd,
                        "complexity": routed.complexity,
                        "unresolved_placeholders": restored.unresolved.len(),
                        "latency": timings,
                    }),
                )
                .with_cost(cost_record),
            )
            .await;

        let metadata = ResponseMetadata {
            request_id,
            entities_redacted: entity_counts(&redaction),
            risk_summary: assessment.summary(),
            risk_score: assessment.combined_score,
            rate_remaining_requests: decision.remaining_requests,
            rate_reset_at: decision.reset_at,
            model: Some(routed.model),
            cache_hit: routed.cache_hit,
            cost_usd: routed.cost_usd,
            latency: timings,
            degraded_detectors: assessment.degraded,
        };

        Ok(ChatOutcome {
            status: ChatStatus::Completed,
            response_text,
            metadata,
        })
    }

    /// Drop the owner's mapping set on explicit session termination.
    pub async fn end_session(&self, owner: &OwnerKey) -> bool {
        self.mapping_store.end_session(owner).await
    }

    /// Export the owner's placeholder mappings in persisted form.
    pub async fn mapping_snapshot(&self, owner: &OwnerKey) -> Vec<MappingRecord> {
        self.mapping_store.snapshot(owner).await
    }

    /// The shared mapping store (for maintenance sweeps).
    #[must_use]
    pub fn mapping_store(&self) -> &Arc<MappingStore> {
        &self.mapping_store
    }

    /// The shared rate limiter (for maintenance sweeps and reporting).
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The cost router (for maintenance sweeps and spend reporting).
    #[must_use]
    pub fn router(&self) -> &Arc<CostRouter> {
        &self.router
    }

    /// Run entity detection under a bounded timeout, degrading to an
    /// empty list on failure.
    async fn detect_entities(
        &self,
        text: &str,
    ) -> (Vec<caduceus_redaction::DetectedEntity>, bool) {
        match tokio::time::timeout(self.detection_timeout, self.entity_detector.detect(text))
            .await
        {
            Ok(Ok(entities)) => (entities, false),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "entity detection failed, continuing unredacted");
                (Vec::new(), true)
            }
            Err(_) => {
                tracing::warn!("entity detection timed out, continuing unredacted");
                (Vec::new(), true)
            }
        }
    }

    async fn finish_blocked(
        &self,
        request_id: &RequestId,
        owner: &OwnerKey,
        role: UserRole,
        redaction: &RedactionResult,
        assessment: &ThreatAssessment,
        timings: StageTimings,
    ) -> ChatOutcome {
        self.audit
            .record(AuditEvent::new(
                request_id.clone(),
                AuditEventType::ThreatBlocked,
                owner.user.clone(),
                role,
                "blocked",
                json!({
                    "reason": assessment.block_reason,
                    "risk_score": assessment.combined_score,
                    "verdicts": assessment.verdicts.len(),
                    "degraded": assessment.degraded,
                }),
            ))
            .await;

        let usage = self.limiter.usage(&owner.user, role).await;
        let metadata = ResponseMetadata {
            request_id: request_id.clone(),
            entities_redacted: entity_counts(redaction),
            risk_summary: assessment.summary(),
            risk_score: assessment.combined_score,
            rate_remaining_requests: self
                .limiter
                .limits()
                .for_role(role)
                .max_requests
                .saturating_sub(usage.requests),
            rate_reset_at: usage.reset_at,
            model: None,
            cache_hit: false,
            cost_usd: 0.0,
            latency: timings,
            degraded_detectors: assessment.degraded.clone(),
        };

        ChatOutcome {
            status: ChatStatus::Blocked,
            response_text: BLOCKED_MESSAGE.to_string(),
            metadata,
        }
    }

    async fn audit_failure(
        &self,
        request_id: &RequestId,
        owner: &OwnerKey,
        role: UserRole,
        error: &str,
        timings: &StageTimings,
    ) {
        self.audit
            .record(AuditEvent::new(
                request_id.clone(),
                AuditEventType::Failure,
                owner.user.clone(),
                role,
                "failed",
                json!({
                    "error": error,
                    "latency": timings,
                }),
            ))
            .await;
    }
}

fn entity_counts(redaction: &RedactionResult) -> Vec<EntityCount> {
    redaction
        .kind_counts()
        .into_iter()
        .map(|(kind, count)| EntityCount { kind, count })
        .collect()
}

/// Append notices the assessment or output rules require.
fn finalize_response(text: String, assessment: &ThreatAssessment) -> String {
    let mut response = match rules::validate_output(&text) {
        Some(modified) => modified,
        None => text,
    };

    match (&assessment.emergency_notice, assessment.action) {
        (Some(notice), _) => {
            if !response.contains(notice.as_str()) {
                response = format!("{response}\n\n{notice}");
            }
        }
        (None, ThreatAction::AllowWithWarning) => {
            if !response.contains(rules::DISCLAIMER_TEXT) {
                response = format!("{response}\n\n{}", rules::DISCLAIMER_TEXT);
            }
        }
        (None, _) => {}
    }

    response
}

fn rate_limited_message(kind: LimitKind, reset_at: Timestamp) -> String {
    let reset = reset_at.format("%H:%M UTC");
    match kind {
        LimitKind::Requests => format!(
            "You've reached your hourly request limit. Please try again after {reset}."
        ),
        LimitKind::Budget => format!(
            "You've reached your hourly usage budget. Please try again after {reset}."
        ),
    }
}
