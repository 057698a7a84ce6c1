//! Cheap heuristic pre-filter for topical fit.
//!
//! Deliberately permissive: a false positive costs one model call that
//! answers "insufficient information", while a false negative blocks a
//! legitimate short follow-up. The short-question heuristic exists for
//! exactly that case. The same predicate runs twice in the pipeline —
//! once before retrieval and once after context is built.

use regex::Regex;

/// Questions shorter than this pass unconditionally; they are likely
/// conversational follow-ups ("and this week?").
const SHORT_QUESTION_LEN: usize = 50;

/// Domain keywords for the insurance-news corpus (matched as
/// case-insensitive substrings, so "regulat" covers regulator/regulation).
const DOMAIN_KEYWORDS: &[&str] = &[
    "insurance",
    "insurer",
    "insurtech",
    "premium",
    "claim",
    "underwrit",
    "reinsurance",
    "catastrophe",
    "policy",
    "policyholder",
    "carrier",
    "broker",
    "regulat",
    "rate",
    "coverage",
    "liability",
    "actuar",
    "loss ratio",
    "casualty",
    "property",
    "cyber",
    "flood",
    "hurricane",
    "wildfire",
    "earthquake",
    "market",
    "earnings",
    "acquisition",
    "merger",
    "news",
];

/// Heuristic pre-filter for topical fit.
pub struct RelevanceGate {
    news_seeking: Regex,
}

impl RelevanceGate {
    pub fn new() -> Self {
        let news_seeking = Regex::new(
            r"(?i)(what'?s\s+(happening|going\s+on|new)|what\s+happened|latest\s+news|latest\s+on|this\s+week|today|yesterday|recently|any\s+news|any\s+updates?|catch\s+me\s+up|top\s+stories|recap|headlines)",
        )
        .expect("invalid built-in news-seeking pattern");

        Self { news_seeking }
    }

    /// Whether the sanitized question looks like something this corpus
    /// can answer.
    pub fn is_relevant(&self, question: &str) -> bool {
        let lower = question.to_lowercase();

        if DOMAIN_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return true;
        }

        if self.news_seeking.is_match(question) {
            return true;
        }

        // Short questions are likely follow-ups to an on-topic thread
        question.chars().count() < SHORT_QUESTION_LEN
    }
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self::new()
    }
}
