//! Redaction engine: span substitution and placeholder resolution.

use crate::detector::DetectedEntity;
use crate::error::Result;
use crate::mapping::MappingStore;
use caduceus_core::{EntityKind, OwnerKey};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Result of redacting one message. Immutable once produced.
#[derive(Debug, Clone)]
pub struct RedactionResult {
    /// The text with every surviving entity replaced by `[KIND_n]`
    pub redacted_text: String,

    /// Placeholders in document order, with their entity kinds
    pub placeholders: Vec<(String, EntityKind)>,

    /// Entities dropped because a higher-confidence span overlapped them
    pub dropped_overlaps: usize,
}

impl RedactionResult {
    /// Whether any entity was masked.
    #[must_use]
    pub fn has_redactions(&self) -> bool {
        !self.placeholders.is_empty()
    }

    /// Count of placeholders per entity kind, for metadata reporting.
    #[must_use]
    pub fn kind_counts(&self) -> Vec<(EntityKind, usize)> {
        let mut counts: Vec<(EntityKind, usize)> = Vec::new();
        for (_, kind) in &self.placeholders {
            match counts.iter_mut().find(|(k, _)| k == kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((*kind, 1)),
            }
        }
        counts
    }
}

/// Result of de-anonymizing a response.
#[derive(Debug, Clone)]
pub struct Deanonymized {
    /// Text with every resolvable placeholder replaced by its original value
    pub text: String,

    /// Placeholder tokens that could not be resolved (expired or unknown);
    /// these are left verbatim in `text`
    pub unresolved: Vec<String>,
}

/// Engine that masks detected entities and reverses the transform.
#[derive(Debug, Clone)]
pub struct RedactionEngine {
    store: Arc<MappingStore>,
}

impl RedactionEngine {
    /// Create an engine over the given mapping store.
    #[must_use]
    pub fn new(store: Arc<MappingStore>) -> Self {
        Self { store }
    }

    /// Access the underlying mapping store.
    #[must_use]
    pub fn store(&self) -> &Arc<MappingStore> {
        &self.store
    }

    /// Replace every detected entity in `text` with a typed placeholder.
    ///
    /// Overlapping entities are resolved by confidence: the highest wins,
    /// the loser is dropped and logged. An empty entity list is a valid
    /// no-op. Substitution runs rightmost-first so earlier replacements
    /// never invalidate later spans' offsets.
    ///
    /// # Errors
    /// Returns error only if the mapping store fails to reserve.
    pub async fn redact(
        &self,
        owner: &OwnerKey,
        text: &str,
        entities: Vec<DetectedEntity>,
    ) -> Result<RedactionResult> {
        let (kept, dropped) = select_spans(text, entities);

        if dropped > 0 {
            tracing::warn!(
                owner = %owner,
                dropped,
                "dropped overlapping entities in favor of higher confidence spans"
            );
        }

        // Reserve in document order so indices read left to right.
        let mut planned: Vec<(DetectedEntity, String)> = Vec::with_capacity(kept.len());
        for entity in kept {
            let placeholder = self
                .store
                .reserve(owner, entity.kind, entity.text.clone())
                .await?;
            planned.push((entity, placeholder));
        }

        // Substitute rightmost-first to keep remaining offsets valid.
        let mut redacted = text.to_string();
        for (entity, placeholder) in planned.iter().rev() {
            redacted.replace_range(entity.start..entity.end, &format!("[{placeholder}]"));
        }

        let placeholders = planned
            .into_iter()
            .map(|(entity, placeholder)| (placeholder, entity.kind))
            .collect();

        Ok(RedactionResult {
            redacted_text: redacted,
            placeholders,
            dropped_overlaps: dropped,
        })
    }

    /// Restore original values for every placeholder-shaped token in `text`.
    ///
    /// Unresolvable placeholders are left verbatim and reported in
    /// [`Deanonymized::unresolved`]; they never cause a failure.
    pub async fn deanonymize(&self, owner: &OwnerKey, text: &str) -> Deanonymized {
        let mut result = String::with_capacity(text.len());
        let mut unresolved = Vec::new();
        let mut last_end = 0;

        for matched in PLACEHOLDER_REGEX.find_iter(text) {
            result.push_str(&text[last_end..matched.start()]);

            let token = matched.as_str();
            let placeholder = &token[1..token.len() - 1];
            match self.store.resolve(owner, placeholder).await {
                Some(value) => result.push_str(&value),
                None => {
                    tracing::debug!(owner = %owner, placeholder, "unresolved placeholder");
                    unresolved.push(placeholder.to_string());
                    result.push_str(token);
                }
            }

            last_end = matched.end();
        }
        result.push_str(&text[last_end..]);

        Deanonymized {
            text: result,
            unresolved,
        }
    }
}

/// Drop malformed spans, then resolve overlaps by confidence
/// (ties favor the earlier span). Returns surviving entities in
/// document order plus the dropped count.
fn select_spans(text: &str, entities: Vec<DetectedEntity>) -> (Vec<DetectedEntity>, usize) {
    let total = entities.len();

    let mut candidates: Vec<DetectedEntity> = entities
        .into_iter()
        .filter(|e| {
            let valid = e.start < e.end
                && e.end <= text.len()
                && text.is_char_boundary(e.start)
                && text.is_char_boundary(e.end);
            if !valid {
                tracing::warn!(start = e.start, end = e.end, "dropping malformed entity span");
            }
            valid
        })
        .collect();

    // Highest confidence first; earlier span wins a tie.
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut kept: Vec<DetectedEntity> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| !k.overlaps(&candidate)) {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|e| e.start);
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Placeholder-shaped tokens: `[PERSON_1]`, `[PHONE_NUMBER_2]`, ...
static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Z][A-Z_]*_[0-9]+)\]").expect("valid placeholder regex"));

#[cfg(test)]
mod tests {
    use super::*;
    use caduceus_core::EntityKind;

    fn engine() -> RedactionEngine {
        RedactionEngine::new(Arc::new(MappingStore::default()))
    }

    fn owner() -> OwnerKey {
        OwnerKey::new("alice", "s1").expect("valid owner key")
    }

    fn entity(kind: EntityKind, start: usize, end: usize, confidence: f64, text: &str) -> DetectedEntity {
        DetectedEntity {
            kind,
            start,
            end,
            confidence,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_redact_replaces_spans_in_document_order() {
        let engine = engine();
        let owner = owner();
        let text = "My name is John Smith, phone 555-123-4567";

        let entities = vec![
            entity(EntityKind::Person, 11, 21, 0.9, "John Smith"),
            entity(EntityKind::PhoneNumber, 29, 41, 0.85, "555-123-4567"),
        ];

        let result = engine.redact(&owner, text, entities).await.expect("redact");

        assert_eq!(
            result.redacted_text,
            "My name is [PERSON_1], phone [PHONE_NUMBER_1]"
        );
        assert_eq!(result.placeholders.len(), 2);
        assert_eq!(result.placeholders[0].0, "PERSON_1");
        assert_eq!(result.placeholders[1].0, "PHONE_NUMBER_1");
        assert_eq!(result.dropped_overlaps, 0);
    }

    #[tokio::test]
    async fn test_redact_empty_entity_list_is_noop() {
        let engine = engine();
        let result = engine
            .redact(&owner(), "I have a headache", Vec::new())
            .await
            .expect("redact");

        assert_eq!(result.redacted_text, "I have a headache");
        assert!(!result.has_redactions());
    }

    #[tokio::test]
    async fn test_overlap_keeps_highest_confidence() {
        let engine = engine();
        let text = "id 123-45-6789 on file";

        // SSN and a lower-confidence phone claim over the same span
        let entities = vec![
            entity(EntityKind::PhoneNumber, 3, 14, 0.60, "123-45-6789"),
            entity(EntityKind::UsSsn, 3, 14, 0.92, "123-45-6789"),
        ];

        let result = engine.redact(&owner(), text, entities).await.expect("redact");

        assert_eq!(result.redacted_text, "id [US_SSN_1] on file");
        assert_eq!(result.dropped_overlaps, 1);
    }

    #[tokio::test]
    async fn test_duplicate_values_redact_to_distinct_placeholders() {
        let engine = engine();
        let text = "John Smith spoke to John Smith";

        let entities = vec![
            entity(EntityKind::Person, 0, 10, 0.9, "John Smith"),
            entity(EntityKind::Person, 20, 30, 0.9, "John Smith"),
        ];

        let result = engine.redact(&owner(), text, entities).await.expect("redact");
        assert_eq!(result.redacted_text, "[PERSON_1] spoke to [PERSON_2]");
    }

    #[tokio::test]
    async fn test_round_trip_restores_original() {
        let engine = engine();
        let owner = owner();
        let text = "My name is John Smith, phone 555-123-4567, I have a headache";

        let entities = vec![
            entity(EntityKind::Person, 11, 21, 0.9, "John Smith"),
            entity(EntityKind::PhoneNumber, 29, 41, 0.85, "555-123-4567"),
        ];

        let redacted = engine.redact(&owner, text, entities).await.expect("redact");
        let restored = engine.deanonymize(&owner, &redacted.redacted_text).await;

        assert_eq!(restored.text, text);
        assert!(restored.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_deanonymize_leaves_unknown_placeholders_verbatim() {
        let engine = engine();
        let owner = owner();

        let restored = engine
            .deanonymize(&owner, "Hello [PERSON_7], your result is ready")
            .await;

        assert_eq!(restored.text, "Hello [PERSON_7], your result is ready");
        assert_eq!(restored.unresolved, vec!["PERSON_7".to_string()]);
    }

    #[tokio::test]
    async fn test_deanonymize_ignores_non_placeholder_brackets() {
        let engine = engine();
        let restored = engine
            .deanonymize(&owner(), "see [note] and [A1] for details")
            .await;

        assert_eq!(restored.text, "see [note] and [A1] for details");
        assert!(restored.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_spans_are_dropped_not_fatal() {
        let engine = engine();
        let text = "short";

        let entities = vec![
            entity(EntityKind::Person, 2, 50, 0.9, "out of range"),
            entity(EntityKind::Person, 3, 3, 0.9, "empty"),
        ];

        let result = engine.redact(&owner(), text, entities).await.expect("redact");
        assert_eq!(result.redacted_text, "short");
        assert_eq!(result.dropped_overlaps, 2);
    }

    #[test]
    fn test_select_spans_tie_prefers_earlier() {
        let text = "abcdefghij";
        let entities = vec![
            entity(EntityKind::Person, 4, 8, 0.9, "efgh"),
            entity(EntityKind::Person, 0, 6, 0.9, "abcdef"),
        ];

        let (kept, dropped) = select_spans(text, entities);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].start, 0);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_kind_counts() {
        let result = RedactionResult {
            redacted_text: String::new(),
            placeholders: vec![
                ("PERSON_1".to_string(), EntityKind::Person),
                ("PERSON_2".to_string(), EntityKind::Person),
                ("PHONE_NUMBER_1".to_string(), EntityKind::PhoneNumber),
            ],
            dropped_overlaps: 0,
        };

        let counts = result.kind_counts();
        assert_eq!(counts.len(), 2);
        assert!(counts.contains(&(EntityKind::Person, 2)));
        assert!(counts.contains(&(EntityKind::PhoneNumber, 1)));
    }
}
