//! BM25-style lexical ranking over the candidate batch.
//!
//! Scores use term frequency and document-length normalization only —
//! no inverse-document-frequency weighting, which would require
//! corpus-wide statistics this pipeline does not maintain. The average
//! document length is computed over the current candidate batch.

use crate::types::Document;
use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Maximum query tokens retained.
pub const MAX_QUERY_TOKENS: usize = 10;

/// Candidates below this score are dropped from the lexical top-K.
pub const MIN_LEXICAL_SCORE: f32 = 0.1;

/// Lexical top-K cap.
pub const TOP_K_LEXICAL: usize = 50;

/// If fewer than this many candidates survive the score filter, fall
/// back to unfiltered top-K by recency — recall beats precision on
/// sparse or short queries.
const MIN_FILTERED_RESULTS: usize = 5;

const STOPWORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "when", "where", "who", "how", "why", "about",
    "any", "did", "does", "will", "can", "there",
];

/// Tokenize a sanitized question into the query-token set: lowercase
/// alphanumeric runs, each at least 2 characters, not pure digits, not a
/// stopword, deduplicated, capped at [`MAX_QUERY_TOKENS`].
pub fn tokenize_query(question: &str) -> Vec<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();

    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for token in question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !stopwords.contains(t))
    {
        if seen.insert(token.to_string()) {
            tokens.push(token.to_string());
            if tokens.len() >= MAX_QUERY_TOKENS {
                break;
            }
        }
    }

    tokens
}

/// Tokenize document text the same way, but keep stopwords and
/// duplicates — term frequencies and document length need them.
fn tokenize_document(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// BM25-style score of one document against the query tokens.
///
/// For each query token present: `tf*(k1+1) / (tf + k1*(1-b+b*(len/avgdl)))`,
/// summed and divided by the query-token count.
pub fn score_document(query_tokens: &[String], document: &Document, avg_doc_len: f32) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }

    let doc_tokens = tokenize_document(&format!("{} {}", document.title, document.snippet));
    if doc_tokens.is_empty() {
        return 0.0;
    }

    let mut term_freq: HashMap<&str, f32> = HashMap::new();
    for token in &doc_tokens {
        *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
    }

    let doc_len = doc_tokens.len() as f32;
    let length_norm = K1 * (1.0 - B + B * (doc_len / avg_doc_len));

    let mut score = 0.0;
    for token in query_tokens {
        if let Some(&tf) = term_freq.get(token.as_str()) {
            score += tf * (K1 + 1.0) / (tf + length_norm);
        }
    }

    score / query_tokens.len() as f32
}

/// Rank candidates lexically and retain the top-K.
///
/// With zero usable query tokens the candidates pass through unfiltered
/// (already newest-first from the fetch), capped at [`TOP_K_LEXICAL`].
/// If the score filter leaves fewer than 5 survivors, the unfiltered
/// top-K by recency is used instead.
pub fn rank(query_tokens: &[String], candidates: Vec<Document>) -> Vec<Document> {
    if query_tokens.is_empty() {
        let mut unfiltered = candidates;
        unfiltered.truncate(TOP_K_LEXICAL);
        return unfiltered;
    }

    let total_len: usize = candidates
        .iter()
        .map(|d| tokenize_document(&format!("{} {}", d.title, d.snippet)).len())
        .sum();
    let avg_doc_len = if candidates.is_empty() {
        1.0
    } else {
        (total_len as f32 / candidates.len() as f32).max(1.0)
    };

    let mut scored: Vec<(f32, Document)> = candidates
        .iter()
        .map(|d| (score_document(query_tokens, d, avg_doc_len), d.clone()))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let filtered: Vec<Document> = scored
        .iter()
        .filter(|(score, _)| *score >= MIN_LEXICAL_SCORE)
        .take(TOP_K_LEXICAL)
        .map(|(_, d)| d.clone())
        .collect();

    if filtered.len() < MIN_FILTERED_RESULTS {
        tracing::debug!(
            survivors = filtered.len(),
            "lexical filter too sparse, falling back to recency"
        );
        let mut fallback = candidates;
        fallback.truncate(TOP_K_LEXICAL);
        return fallback;
    }

    tracing::debug!(retained = filtered.len(), "lexical ranking complete");
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, title: &str, snippet: &str) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            snippet: snippet.to_string(),
            tldr: None,
            source_id: "s1".to_string(),
            source_name: "Source".to_string(),
            url: format!("https://example.com/{}", id),
            published_at: Utc::now(),
            embedding: None,
            embedding_dim: None,
            is_relevant: true,
        }
    }

    #[test]
    fn test_tokenize_query_rules() {
        let tokens = tokenize_query("What happened with the hurricane claims in 2026?");
        // Stopwords, short tokens, and pure digits removed
        assert_eq!(tokens, vec!["happened", "hurricane", "claims"]);
    }

    #[test]
    fn test_tokenize_query_caps_and_dedupes() {
        let tokens = tokenize_query(
            "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu alpha",
        );
        assert_eq!(tokens.len(), MAX_QUERY_TOKENS);
        assert_eq!(tokens[0], "alpha");
        // Dedup: "alpha" appears once
        assert_eq!(tokens.iter().filter(|t| *t == "alpha").count(), 1);
    }

    #[test]
    fn test_matching_document_outscores_non_matching() {
        let query = tokenize_query("hurricane claims losses");

        let matching = doc(
            "a",
            "Hurricane claims mount",
            "Hurricane losses and claims keep climbing as adjusters process claims",
        );
        let unrelated = doc("b", "Auto telematics pricing", "Usage-based discounts expand");

        let s_match = score_document(&query, &matching, 10.0);
        let s_other = score_document(&query, &unrelated, 10.0);

        assert!(s_match > s_other);
        assert_eq!(s_other, 0.0);
    }

    #[test]
    fn test_rank_filters_and_orders() {
        let mut candidates = vec![
            doc("top", "Hurricane claims surge", "hurricane claims hurricane claims"),
            doc("mid", "Claims update", "one claims mention here"),
        ];
        for i in 0..5 {
            candidates.push(doc(
                &format!("noise{}", i),
                "Pet insurance growth",
                "distribution partnerships expand",
            ));
        }
        // Enough hurricane/claims docs that the filter keeps >= 5
        for i in 0..4 {
            candidates.push(doc(
                &format!("hit{}", i),
                "Hurricane claims note",
                "claims hurricane commentary",
            ));
        }

        let query = tokenize_query("hurricane claims");
        let ranked = rank(&query, candidates);

        assert_eq!(ranked[0].id, "top");
        assert!(ranked.iter().all(|d| !d.id.starts_with("noise")));
    }

    #[test]
    fn test_rank_sparse_fallback() {
        // Only one candidate matches; fallback returns all by recency
        let candidates = vec![
            doc("a", "Hurricane claims", "hurricane claims"),
            doc("b", "Rates", "rates"),
            doc("c", "Brokers", "brokers"),
        ];

        let query = tokenize_query("hurricane");
        let ranked = rank(&query, candidates.clone());

        assert_eq!(ranked.len(), candidates.len());
    }

    #[test]
    fn test_rank_zero_tokens_passthrough() {
        let candidates = vec![doc("a", "T", "s"), doc("b", "T", "s")];
        let ranked = rank(&[], candidates);
        assert_eq!(ranked.len(), 2);
    }
}
