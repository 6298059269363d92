//! Entity detection capability and the regex reference detector.

use crate::error::Result;
use async_trait::async_trait;
use caduceus_core::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A sensitive entity found in a piece of text.
///
/// Produced by an [`EntityDetector`]; consumed by the redaction engine,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedEntity {
    /// Category of the entity
    pub kind: EntityKind,

    /// Byte offset where the entity starts in the original text
    pub start: usize,

    /// Byte offset one past the end of the entity
    pub end: usize,

    /// Detector confidence in [0, 1]
    pub confidence: f64,

    /// The matched source text
    pub text: String,
}

impl DetectedEntity {
    /// Whether this entity's span overlaps another's.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Trait for entity recognition backends.
///
/// Implementations may wrap anything from a regex pass to an external NER
/// service. They must be thread-safe (Send + Sync) for use in async contexts.
#[async_trait]
pub trait EntityDetector: Send + Sync {
    /// Detect sensitive entities in the given text.
    ///
    /// # Errors
    /// Returns error if the underlying detection engine fails.
    async fn detect(&self, text: &str) -> Result<Vec<DetectedEntity>>;

    /// Get the unique identifier for this detector.
    fn detector_id(&self) -> &str;
}

/// Regex-based reference detector.
///
/// Covers the structured entity kinds that pattern matching can find
/// reliably (phone numbers, emails, SSNs, credit cards, IP addresses).
/// Free-text kinds such as names and locations need an external
/// recognition service.
#[derive(Debug, Clone, Default)]
pub struct RegexEntityDetector {
    _private: (),
}

impl RegexEntityDetector {
    /// Create a new regex detector with the default pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[async_trait]
impl EntityDetector for RegexEntityDetector {
    async fn detect(&self, text: &str) -> Result<Vec<DetectedEntity>> {
        let mut entities = Vec::new();

        for pattern in patterns() {
            for matched in pattern.regex.find_iter(text) {
                entities.push(DetectedEntity {
                    kind: pattern.kind,
                    start: matched.start(),
                    end: matched.end(),
                    confidence: pattern.confidence,
                    text: matched.as_str().to_string(),
                });
            }
        }

        entities.sort_by_key(|e| (e.start, e.end));
        Ok(entities)
    }

    fn detector_id(&self) -> &str {
        "regex"
    }
}

/// A detection pattern with its kind and fixed confidence.
struct EntityPattern {
    kind: EntityKind,
    confidence: f64,
    regex: &'static Regex,
}

fn patterns() -> Vec<EntityPattern> {
    vec![
        EntityPattern {
            kind: EntityKind::EmailAddress,
            confidence: 0.95,
            regex: &*EMAIL_REGEX,
        },
        EntityPattern {
            kind: EntityKind::UsSsn,
            confidence: 0.92,
            regex: &*SSN_REGEX,
        },
        EntityPattern {
            kind: EntityKind::PhoneNumber,
            confidence: 0.85,
            regex: &*PHONE_REGEX,
        },
        EntityPattern {
            kind: EntityKind::CreditCard,
            confidence: 0.80,
            regex: &*CREDIT_CARD_REGEX,
        },
        EntityPattern {
            kind: EntityKind::IpAddress,
            confidence: 0.80,
            regex: &*IPV4_REGEX,
        },
    ]
}

// Compiled regex patterns
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").expect("valid email regex")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-.\s]?)?\(?([0-9]{3})\)?[-.\s]?([0-9]{3})[-.\s]?([0-9]{4})\b")
        .expect("valid phone regex")
});

static SSN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid SSN regex"));

static CREDIT_CARD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("valid credit card regex"));

static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid IPv4 regex")
});
