//! Refusal policy.
//!
//! A refusal is a deliberate decision to decline answering, returned as
//! a normally-shaped answer object — never a transport-level error — so
//! the client UI stays uniform. Each refusal kind carries a tailored
//! message plus refusal-appropriate takeaways and follow-up suggestions.

use crate::types::AnswerResult;

/// Why the pipeline declined to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalKind {
    /// Input failed length validation or safety screening
    Sanitization,

    /// Question looks unrelated to the news corpus
    OffTopic,

    /// No candidate documents in the requested scope
    NoArticles,

    /// Candidates exist but none have usable embeddings
    NoEmbeddedArticles,

    /// Context built but judged insufficient for grounding
    InsufficientContext,
}

impl RefusalKind {
    /// Short machine-readable reason for telemetry.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Sanitization => "sanitization",
            Self::OffTopic => "off_topic",
            Self::NoArticles => "no_articles",
            Self::NoEmbeddedArticles => "no_embedded_articles",
            Self::InsufficientContext => "insufficient_context",
        }
    }

    /// Build the canned, topic-appropriate answer for this refusal.
    pub fn to_answer(self, detail: Option<&str>) -> AnswerResult {
        match self {
            Self::Sanitization => AnswerResult {
                answer_markdown:
                    "I can't process that question. Please rephrase it as a question about \
                     insurance industry news."
                        .to_string(),
                takeaways: vec![detail
                    .map(|d| format!("The question could not be processed: {}.", d))
                    .unwrap_or_else(|| "The question could not be processed.".to_string())],
                citations: vec![],
                follow_ups: vec![
                    "What's the latest insurance industry news?".to_string(),
                    "What happened in the market this week?".to_string(),
                    "Any major catastrophe updates?".to_string(),
                ],
            },
            Self::OffTopic => AnswerResult {
                answer_markdown:
                    "I focus on insurance industry news, so I can't help with that one. Ask me \
                     about carriers, claims, rates, regulation, or market developments."
                        .to_string(),
                takeaways: vec!["The question appears unrelated to insurance news.".to_string()],
                citations: vec![],
                follow_ups: vec![
                    "What's the latest insurance industry news?".to_string(),
                    "How are property rates trending?".to_string(),
                    "Any notable regulatory activity recently?".to_string(),
                ],
            },
            Self::NoArticles => AnswerResult {
                answer_markdown:
                    "I couldn't find any articles matching your filters for that period. Try a \
                     wider time window or fewer source filters."
                        .to_string(),
                takeaways: vec!["No articles found for the selected scope.".to_string()],
                citations: vec![],
                follow_ups: vec![
                    "What happened over the last 30 days?".to_string(),
                    "What are this week's top stories across all sources?".to_string(),
                    "Any catastrophe news this month?".to_string(),
                ],
            },
            Self::NoEmbeddedArticles => AnswerResult {
                answer_markdown:
                    "I found some articles but couldn't rank them for your question just now. \
                     Please try again shortly."
                        .to_string(),
                takeaways: vec!["Articles were found but could not be ranked.".to_string()],
                citations: vec![],
                follow_ups: vec![
                    "What's the latest insurance industry news?".to_string(),
                    "What happened this week?".to_string(),
                    "What are the top stories today?".to_string(),
                ],
            },
            Self::InsufficientContext => AnswerResult {
                answer_markdown:
                    "I don't have enough coverage on that topic to give you a grounded answer. \
                     Try rephrasing, or ask about recent industry developments."
                        .to_string(),
                takeaways: vec!["Insufficient relevant coverage for a grounded answer.".to_string()],
                citations: vec![],
                follow_ups: vec![
                    "What's the latest insurance industry news?".to_string(),
                    "What are the biggest stories this week?".to_string(),
                    "How are rates trending across lines?".to_string(),
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusals_are_normally_shaped() {
        for kind in [
            RefusalKind::Sanitization,
            RefusalKind::OffTopic,
            RefusalKind::NoArticles,
            RefusalKind::NoEmbeddedArticles,
            RefusalKind::InsufficientContext,
        ] {
            let answer = kind.to_answer(None);
            assert!(!answer.answer_markdown.is_empty());
            assert!(!answer.takeaways.is_empty());
            assert!(answer.citations.is_empty());
            assert_eq!(answer.follow_ups.len(), 3);
        }
    }

    #[test]
    fn test_sanitization_detail_in_takeaway() {
        let answer = RefusalKind::Sanitization.to_answer(Some("question too short"));
        assert!(answer.takeaways[0].contains("question too short"));
    }

    #[test]
    fn test_reasons_are_stable() {
        assert_eq!(RefusalKind::NoArticles.reason(), "no_articles");
        assert_eq!(RefusalKind::Sanitization.reason(), "sanitization");
    }
}
