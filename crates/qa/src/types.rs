//! Pipeline type definitions.
//!
//! Loosely-typed records from the document store are mapped into these
//! structs at the store boundary; everything downstream of [`store`] works
//! with typed values only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time window for candidate retrieval.
///
/// "today" is deliberately wider than 24 hours so that early-morning
/// questions still see the previous evening's stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeWindow {
    #[serde(rename = "today")]
    #[default]
    Today,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeWindow {
    /// Canonical wire name, also used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    /// Lower bound on published-at for this window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => now - Duration::hours(36),
            Self::Week => now - Duration::days(7),
            Self::Month => now - Duration::days(30),
        }
    }
}

/// Retrieval scope: time window, category filter, source-id filter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default)]
    pub time_window: TimeWindow,

    /// Category tag, or "all" / empty for unfiltered
    #[serde(default)]
    pub category: String,

    /// Source-id filter; `None` means unfiltered
    #[serde(default)]
    pub source_ids: Option<Vec<String>>,
}

impl Scope {
    /// Whether a category filter is active.
    pub fn has_category_filter(&self) -> bool {
        !self.category.is_empty() && self.category != "all"
    }

    /// Canonical `{timeWindow}_{category}` segment for cache keys.
    pub fn cache_segment(&self) -> String {
        let category = if self.category.is_empty() {
            "all"
        } else {
            self.category.as_str()
        };
        format!("{}_{}", self.time_window.as_str(), category)
    }
}

/// A news document as read from the document store.
///
/// Read-only to this pipeline except for lazy embedding backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,

    /// Short article snippet
    pub snippet: String,

    /// Optional AI-generated short summary
    pub tldr: Option<String>,

    pub source_id: String,
    pub source_name: String,
    pub url: String,
    pub published_at: DateTime<Utc>,

    /// Stored embedding vector, if one has been computed
    pub embedding: Option<Vec<f32>>,

    /// Dimension of the stored embedding
    pub embedding_dim: Option<usize>,

    /// Classifier relevance flag set by the ingestion collaborator
    pub is_relevant: bool,
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior conversation turn supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// An inbound question request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// Known user id; anonymous requests bypass caching
    #[serde(default)]
    pub user_id: Option<String>,

    pub question: String,

    #[serde(default)]
    pub scope: Scope,

    /// Prior turns, most recent last. Only the last 8 are used, each
    /// truncated to 4000 characters.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Per-document view used only for prompting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextItem {
    pub id: String,
    pub title: String,
    pub source_name: String,
    pub url: String,

    /// ISO date at day precision (YYYY-MM-DD)
    pub published_date: String,

    /// Snippet truncated to 500 characters
    pub snippet: String,

    pub tldr: Option<String>,
}

/// A citation in the final answer.
///
/// Display fields are always re-resolved from the canonical context
/// item, never trusted verbatim from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub article_id: String,
    pub title: String,
    pub source_name: String,
    pub url: String,
    pub published_at: String,
}

impl Citation {
    /// Build a citation from the canonical context item.
    pub fn from_context(item: &ContextItem) -> Self {
        Self {
            article_id: item.id.clone(),
            title: item.title.clone(),
            source_name: item.source_name.clone(),
            url: item.url.clone(),
            published_at: item.published_date.clone(),
        }
    }
}

/// The final answer payload returned to the caller (and cached).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    /// Markdown text with bracketed numeric citations `[n]`
    pub answer_markdown: String,

    pub takeaways: Vec<String>,

    /// Deduplicated by article id, at most 20
    pub citations: Vec<Citation>,

    /// Exactly 3 follow-up questions
    pub follow_ups: Vec<String>,
}

/// Response envelope for a single ask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub request_id: String,
    pub answer: AnswerResult,

    /// Whether the answer was served from cache
    pub cached: bool,

    /// Whether the answer is a policy refusal
    pub refused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_cutoffs() {
        let now = Utc::now();
        assert_eq!(now - TimeWindow::Today.cutoff(now), Duration::hours(36));
        assert_eq!(now - TimeWindow::Week.cutoff(now), Duration::days(7));
        assert_eq!(now - TimeWindow::Month.cutoff(now), Duration::days(30));
    }

    #[test]
    fn test_time_window_wire_names() {
        assert_eq!(TimeWindow::Today.as_str(), "today");
        assert_eq!(TimeWindow::Week.as_str(), "7d");
        assert_eq!(TimeWindow::Month.as_str(), "30d");

        let parsed: TimeWindow = serde_json::from_str("\"7d\"").unwrap();
        assert_eq!(parsed, TimeWindow::Week);
    }

    #[test]
    fn test_scope_cache_segment() {
        let scope = Scope {
            time_window: TimeWindow::Week,
            category: "catastrophe".to_string(),
            source_ids: None,
        };
        assert_eq!(scope.cache_segment(), "7d_catastrophe");

        let default_scope = Scope::default();
        assert_eq!(default_scope.cache_segment(), "today_all");
        assert!(!default_scope.has_category_filter());
    }

    #[test]
    fn test_answer_result_serializes_camel_case() {
        let result = AnswerResult {
            answer_markdown: "Rates rose [1].".to_string(),
            takeaways: vec!["Rates rose".to_string()],
            citations: vec![],
            follow_ups: vec!["What next?".to_string()],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("answerMarkdown"));
        assert!(json.contains("followUps"));
    }

    #[test]
    fn test_citation_from_context() {
        let item = ContextItem {
            id: "a1".to_string(),
            title: "Hurricane losses mount".to_string(),
            source_name: "Coverage Daily".to_string(),
            url: "https://example.com/a1".to_string(),
            published_date: "2026-08-28".to_string(),
            snippet: "snippet".to_string(),
            tldr: None,
        };

        let citation = Citation::from_context(&item);
        assert_eq!(citation.article_id, "a1");
        assert_eq!(citation.title, "Hurricane losses mount");
        assert_eq!(citation.published_at, "2026-08-28");
    }
}
