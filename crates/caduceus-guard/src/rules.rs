//! Locally evaluated hard rules for medical safety.
//!
//! These rules run without any external detector and take precedence over
//! model-derived scores: a dosage request is always blocked, an emergency
//! symptom is always allowed through with an attached notice.

use once_cell::sync::Lazy;
use regex::Regex;

/// Informational disclaimer appended to responses containing medical advice.
pub const DISCLAIMER_TEXT: &str =
    "This is for informational purposes only. Consult your healthcare provider for medical advice.";

/// Guidance attached when emergency symptoms are described.
pub const EMERGENCY_TEXT: &str = "These symptoms may require immediate medical attention. \
     Please consider calling 911 or going to the nearest emergency room.";

/// Outcome of the hard-rule pass over an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardRuleOutcome {
    /// Request must be refused regardless of detector scores
    Block {
        /// Name of the rule that fired
        rule: String,
    },

    /// Request proceeds with a warning and the given notice attached;
    /// it must not be blocked
    Warn {
        /// Name of the rule that fired
        rule: String,
        /// Notice to attach to the eventual response
        notice: String,
    },
}

/// Evaluate the hard rules against an inbound message.
///
/// Emergency symptoms are checked first: a message describing chest pain
/// must reach a response (with guidance attached) even if it also trips
/// the dosage rule or an injection detector.
#[must_use]
pub fn evaluate_hard_rules(text: &str) -> Option<HardRuleOutcome> {
    let lower = text.to_lowercase();

    for pattern in EMERGENCY_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            tracing::info!("emergency symptom rule fired");
            return Some(HardRuleOutcome::Warn {
                rule: "emergency_symptoms".to_string(),
                notice: EMERGENCY_TEXT.to_string(),
            });
        }
    }

    for pattern in DOSAGE_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            tracing::info!("medication dosage rule fired");
            return Some(HardRuleOutcome::Block {
                rule: "medication_dosage_request".to_string(),
            });
        }
    }

    None
}

/// Validate an outbound response, returning a modified version when a
/// disclaimer or emergency guidance must be appended.
///
/// Returns `None` when the response is fine as-is.
#[must_use]
pub fn validate_output(response: &str) -> Option<String> {
    let lower = response.to_lowercase();

    let contains_medical_advice = MEDICAL_ADVICE_KEYWORDS.iter().any(|k| lower.contains(k));
    let has_disclaimer = lower.contains(&DISCLAIMER_TEXT.to_lowercase());

    let mut modified = response.to_string();
    let mut changed = false;

    if contains_medical_advice && !has_disclaimer {
        modified = format!("{modified}\n\n{DISCLAIMER_TEXT}");
        changed = true;
    }

    let mentions_emergency = EMERGENCY_PATTERNS.iter().any(|p| p.is_match(&lower));
    if mentions_emergency && !response.contains(EMERGENCY_TEXT) {
        modified = format!("{modified}\n\n{EMERGENCY_TEXT}");
        changed = true;
    }

    changed.then_some(modified)
}

static DOSAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"dosage\s+of\s+\w+",
        r"(exact|specific)\s+dosages?",
        r"how\s+much\s+\w+\s+(should|to)\s+take",
        r"\bmg\s+of\s+\w+",
        r"pills?\s+of\s+\w+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid dosage pattern"))
    .collect()
});

static EMERGENCY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"chest\s+pain",
        r"difficulty\s+breathing",
        r"severe\s+bleeding",
        r"heart\s+attack",
        r"stroke\s+symptoms?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid emergency pattern"))
    .collect()
});

const MEDICAL_ADVICE_KEYWORDS: &[&str] =
    &["should take", "medication", "treatment", "symptoms suggest"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dosage_request_blocks() {
        let outcome = evaluate_hard_rules("What is the dosage of metformin for me?");
        assert_eq!(
            outcome,
            Some(HardRuleOutcome::Block {
                rule: "medication_dosage_request".to_string()
            })
        );
    }

    #[test]
    fn test_exact_dosages_phrase_blocks() {
        let outcome = evaluate_hard_rules("give me exact dosages");
        assert!(matches!(outcome, Some(HardRuleOutcome::Block { .. })));
    }

    #[test]
    fn test_emergency_symptom_warns() {
        let outcome = evaluate_hard_rules("I am having chest pain right now");
        match outcome {
            Some(HardRuleOutcome::Warn { rule, notice }) => {
                assert_eq!(rule, "emergency_symptoms");
                assert!(notice.contains("911"));
            }
            other => panic!("expected warn outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_emergency_takes_precedence_over_dosage() {
        let outcome =
            evaluate_hard_rules("chest pain after taking 3 pills of aspirin, help");
        assert!(matches!(outcome, Some(HardRuleOutcome::Warn { .. })));
    }

    #[test]
    fn test_benign_message_fires_nothing() {
        assert!(evaluate_hard_rules("I have a mild headache").is_none());
    }

    #[test]
    fn test_output_gets_disclaimer_for_medical_advice() {
        let modified = validate_output("Your symptoms suggest a common cold.")
            .expect("disclaimer appended");
        assert!(modified.contains(DISCLAIMER_TEXT));
    }

    #[test]
    fn test_output_with_disclaimer_unchanged() {
        let response = format!("Rest and fluids help.\n\n{DISCLAIMER_TEXT}");
        // No advice keywords beyond the disclaimer itself, nothing to add
        assert!(validate_output(&response).is_none());
    }

    #[test]
    fn test_output_emergency_guidance_appended() {
        let modified = validate_output("Sudden chest pain can be serious.")
            .expect("guidance appended");
        assert!(modified.contains(EMERGENCY_TEXT));
    }

    #[test]
    fn test_plain_output_unchanged() {
        assert!(validate_output("Drinking water is good for you.").is_none());
    }
}
