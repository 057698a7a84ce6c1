//! Context pack construction and the post-retrieval refusal check.
//!
//! Selected documents become compact, numbered context items for the
//! generation prompt; the AI summary is preferred over the raw snippet,
//! with the snippet kept as truncated supplementary detail.

use crate::relevance::RelevanceGate;
use crate::types::{ContextItem, Document};

/// Snippet truncation bound inside a context item.
pub const MAX_SNIPPET_LEN: usize = 500;

/// Build one context item per selected document, in selection order.
pub fn build_context(selected: &[Document]) -> Vec<ContextItem> {
    selected.iter().map(context_item).collect()
}

fn context_item(document: &Document) -> ContextItem {
    ContextItem {
        id: document.id.clone(),
        title: document.title.clone(),
        source_name: document.source_name.clone(),
        url: document.url.clone(),
        published_date: document.published_at.format("%Y-%m-%d").to_string(),
        snippet: truncate(&document.snippet, MAX_SNIPPET_LEN),
        tldr: document.tldr.clone(),
    }
}

/// Format the numbered context block for the generation prompt.
///
/// Each item reads:
/// `[n] Title (Source, YYYY-MM-DD)` followed by the summary and the
/// supplementary snippet.
pub fn format_context_block(items: &[ContextItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut block = format!(
                "[{}] {} ({}, {})",
                i + 1,
                item.title,
                item.source_name,
                item.published_date
            );

            if let Some(tldr) = &item.tldr {
                block.push_str(&format!("\nSummary: {}", tldr));
                if !item.snippet.is_empty() {
                    block.push_str(&format!("\nExcerpt: {}", item.snippet));
                }
            } else if !item.snippet.is_empty() {
                block.push_str(&format!("\nExcerpt: {}", item.snippet));
            }

            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Post-context quality check.
///
/// Refuses when the context is empty or the relevance predicate fails
/// for the (already validated) question. Having only 1-2 articles is
/// intentionally non-fatal — the model hedges on thin evidence instead.
pub fn context_is_sufficient(gate: &RelevanceGate, question: &str, items: &[ContextItem]) -> bool {
    if items.is_empty() {
        return false;
    }

    gate.is_relevant(question)
}

/// Truncate a string to a character bound on a word boundary.
fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_len).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn doc(id: &str, tldr: Option<&str>, snippet: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title {}", id),
            snippet: snippet.to_string(),
            tldr: tldr.map(|t| t.to_string()),
            source_id: "s1".to_string(),
            source_name: "Coverage Daily".to_string(),
            url: format!("https://example.com/{}", id),
            published_at: Utc.with_ymd_and_hms(2026, 8, 28, 14, 30, 0).unwrap(),
            embedding: None,
            embedding_dim: None,
            is_relevant: true,
        }
    }

    #[test]
    fn test_context_item_fields() {
        let items = build_context(&[doc("a", Some("Short summary"), "Long snippet")]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[0].published_date, "2026-08-28");
        assert_eq!(items[0].tldr.as_deref(), Some("Short summary"));
    }

    #[test]
    fn test_snippet_truncated() {
        let long_snippet = "word ".repeat(200);
        let items = build_context(&[doc("a", None, &long_snippet)]);

        assert!(items[0].snippet.chars().count() <= MAX_SNIPPET_LEN + 3);
        assert!(items[0].snippet.ends_with("..."));
    }

    #[test]
    fn test_format_numbers_items() {
        let items = build_context(&[
            doc("a", Some("Summary A"), "Snippet A"),
            doc("b", None, "Snippet B"),
        ]);

        let block = format_context_block(&items);
        assert!(block.contains("[1] Title a (Coverage Daily, 2026-08-28)"));
        assert!(block.contains("[2] Title b"));
        assert!(block.contains("Summary: Summary A"));
        assert!(block.contains("Excerpt: Snippet B"));
    }

    #[test]
    fn test_sufficiency_requires_nonempty_context() {
        let gate = RelevanceGate::new();
        assert!(!context_is_sufficient(&gate, "insurance news?", &[]));
    }

    #[test]
    fn test_sufficiency_accepts_single_item() {
        let gate = RelevanceGate::new();
        let items = build_context(&[doc("a", None, "Snippet")]);
        assert!(context_is_sufficient(&gate, "latest premium news?", &items));
    }
}
