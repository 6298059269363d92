//! Query complexity scoring for model routing.

use caduceus_core::config::RoutingConfig;

/// Scores message complexity on a normalized [0, 1] scale.
///
/// Four indicators contribute equal fixed weight: message length, number
/// of question marks, presence of complexity keywords, and word count.
/// Domain terms add a capped bonus so clinical vocabulary nudges a query
/// toward the capable model without dominating the score.
#[derive(Debug, Clone)]
pub struct ComplexityScorer {
    config: RoutingConfig,
}

impl ComplexityScorer {
    /// Create a scorer from routing configuration.
    #[must_use]
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Score a message's complexity in [0, 1].
    #[must_use]
    pub fn score(&self, message: &str) -> f64 {
        let lower = message.to_lowercase();
        let word_count = message.split_whitespace().count();
        let question_marks = message.matches('?').count();

        let indicators = [
            message.len() > self.config.long_message_chars,
            question_marks > self.config.many_questions,
            self.config
                .complexity_keywords
                .iter()
                .any(|k| lower.contains(k.as_str())),
            word_count > self.config.long_message_words,
        ];

        #[allow(clippy::cast_precision_loss)]
        let base = indicators.iter().filter(|&&hit| hit).count() as f64 / indicators.len() as f64;

        #[allow(clippy::cast_precision_loss)]
        let domain_hits = self
            .config
            .domain_terms
            .iter()
            .filter(|t| lower.contains(t.as_str()))
            .count() as f64;
        let bonus = (domain_hits * 0.1).min(0.3);

        (base + bonus).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ComplexityScorer {
        ComplexityScorer::new(RoutingConfig::default())
    }

    #[test]
    fn test_short_simple_message_scores_low() {
        let score = scorer().score("I have a headache");
        assert!(score < 0.5, "got {score}");
    }

    #[test]
    fn test_keyword_and_questions_raise_score() {
        let score = scorer()
            .score("What is the differential diagnosis? Is it viral? Should I get tests???");
        assert!(score >= 0.5, "got {score}");
    }

    #[test]
    fn test_long_clinical_message_scores_high() {
        let body = "The patient presents with persistent symptom clusters after medication \
                    changes, and the treatment history is complicated. "
            .repeat(6);
        let score = scorer().score(&body);
        assert!(score >= 0.5, "got {score}");
    }

    #[test]
    fn test_domain_bonus_is_capped() {
        let message = "symptom patient clinical medical therapy medication prescription";
        let score = scorer().score(&message.to_string());
        // One indicator at most (keywords absent), bonus capped at 0.3
        assert!(score <= 0.55, "got {score}");
    }

    #[test]
    fn test_score_is_bounded() {
        let message = format!(
            "diagnosis treatment differential research symptom patient clinical {} ????",
            "word ".repeat(200)
        );
        let score = scorer().score(&message);
        assert!(score <= 1.0);
    }
}
