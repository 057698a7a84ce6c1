//! Candidate document retrieval.
//!
//! Computes the time-window cutoff, queries the document store, and
//! compensates for the store's cap on "IN"-style filter cardinality by
//! partitioning large source-id sets into chunks queried concurrently.
//! Category filtering happens in-memory after fetch, since combining it
//! with the other filters would require a composite index the store may
//! not have.

use crate::store::{DocumentQuery, DocumentStore, MAX_SOURCE_IDS_PER_QUERY};
use crate::types::{Document, Scope};
use chrono::Utc;
use newsbrief_core::AppResult;
use std::collections::HashSet;
use std::sync::Arc;

/// Candidate set cap.
pub const MAX_CANDIDATES: usize = 200;

/// Fetches time/category/source-filtered candidates from the store.
pub struct CandidateFetcher {
    store: Arc<dyn DocumentStore>,
}

impl CandidateFetcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch candidates for the given scope.
    ///
    /// Query tokens deliberately play no part here — lexical and semantic
    /// ranking handle relevance, not the store query. A failed chunk
    /// fails the whole fetch.
    pub async fn fetch(&self, scope: &Scope) -> AppResult<Vec<Document>> {
        let cutoff = scope.time_window.cutoff(Utc::now());

        let mut candidates = match &scope.source_ids {
            Some(ids) if ids.len() > MAX_SOURCE_IDS_PER_QUERY => {
                self.fetch_chunked(cutoff, ids).await?
            }
            Some(ids) if !ids.is_empty() => {
                self.store
                    .query(&DocumentQuery {
                        published_after: cutoff,
                        source_ids: Some(ids.clone()),
                        limit: MAX_CANDIDATES,
                    })
                    .await?
            }
            _ => {
                self.store
                    .query(&DocumentQuery {
                        published_after: cutoff,
                        source_ids: None,
                        limit: MAX_CANDIDATES,
                    })
                    .await?
            }
        };

        if scope.has_category_filter() {
            let category = scope.category.to_lowercase();
            candidates.retain(|d| document_matches_category(d, &category));
        }

        candidates.truncate(MAX_CANDIDATES);

        tracing::debug!(
            candidates = candidates.len(),
            window = scope.time_window.as_str(),
            "fetched candidate documents"
        );

        Ok(candidates)
    }

    /// Partition an oversized source-id set into chunks of at most
    /// [`MAX_SOURCE_IDS_PER_QUERY`] ids, query them concurrently, then
    /// merge, dedupe by id, re-sort by published-at descending, and cap.
    async fn fetch_chunked(
        &self,
        cutoff: chrono::DateTime<Utc>,
        source_ids: &[String],
    ) -> AppResult<Vec<Document>> {
        let chunk_queries = source_ids
            .chunks(MAX_SOURCE_IDS_PER_QUERY)
            .map(|chunk| {
                let store = Arc::clone(&self.store);
                let query = DocumentQuery {
                    published_after: cutoff,
                    source_ids: Some(chunk.to_vec()),
                    limit: MAX_CANDIDATES,
                };
                async move { store.query(&query).await }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            chunks = chunk_queries.len(),
            sources = source_ids.len(),
            "fanning out chunked source queries"
        );

        let chunk_results = futures::future::try_join_all(chunk_queries).await?;

        let mut seen = HashSet::new();
        let mut merged: Vec<Document> = Vec::new();
        for document in chunk_results.into_iter().flatten() {
            if seen.insert(document.id.clone()) {
                merged.push(document);
            }
        }

        merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        merged.truncate(MAX_CANDIDATES);

        Ok(merged)
    }
}

/// In-memory category check over title, snippet, and tldr.
fn document_matches_category(document: &Document, category: &str) -> bool {
    let haystack = format!(
        "{} {} {}",
        document.title.to_lowercase(),
        document.snippet.to_lowercase(),
        document
            .tldr
            .as_deref()
            .map(|t| t.to_lowercase())
            .unwrap_or_default()
    );
    haystack.contains(category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use crate::types::TimeWindow;
    use chrono::Duration;

    fn doc(id: &str, source_id: &str, hours_ago: i64, title: &str) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            snippet: "snippet".to_string(),
            tldr: None,
            source_id: source_id.to_string(),
            source_name: format!("Source {}", source_id),
            url: format!("https://example.com/{}", id),
            published_at: Utc::now() - Duration::hours(hours_ago),
            embedding: None,
            embedding_dim: None,
            is_relevant: true,
        }
    }

    #[tokio::test]
    async fn test_fetch_unfiltered() {
        let store = Arc::new(MemoryDocumentStore::with_documents(vec![
            doc("a", "s1", 1, "Storm claims rise"),
            doc("b", "s2", 50, "Outside window"),
        ]));

        let fetcher = CandidateFetcher::new(store);
        let scope = Scope {
            time_window: TimeWindow::Today,
            category: "all".to_string(),
            source_ids: None,
        };

        let candidates = fetcher.fetch(&scope).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a");
    }

    #[tokio::test]
    async fn test_fetch_category_filter_in_memory() {
        let store = Arc::new(MemoryDocumentStore::with_documents(vec![
            doc("a", "s1", 1, "Cyber premiums harden"),
            doc("b", "s2", 2, "Auto rates steady"),
        ]));

        let fetcher = CandidateFetcher::new(store);
        let scope = Scope {
            time_window: TimeWindow::Week,
            category: "cyber".to_string(),
            source_ids: None,
        };

        let candidates = fetcher.fetch(&scope).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a");
    }

    #[tokio::test]
    async fn test_fetch_chunked_merges_and_dedupes() {
        // 25 sources forces 3 chunks
        let mut documents = Vec::new();
        for i in 0..25 {
            documents.push(doc(
                &format!("d{}", i),
                &format!("s{}", i),
                i as i64 + 1,
                "Premium news",
            ));
        }
        let store = Arc::new(MemoryDocumentStore::with_documents(documents));

        let fetcher = CandidateFetcher::new(store);
        let scope = Scope {
            time_window: TimeWindow::Week,
            category: "all".to_string(),
            source_ids: Some((0..25).map(|i| format!("s{}", i)).collect()),
        };

        let candidates = fetcher.fetch(&scope).await.unwrap();
        assert_eq!(candidates.len(), 25);

        // Newest first after merge
        for pair in candidates.windows(2) {
            assert!(pair[0].published_at >= pair[1].published_at);
        }
    }

    #[tokio::test]
    async fn test_fetch_caps_at_max_candidates() {
        let mut documents = Vec::new();
        for i in 0..250 {
            documents.push(doc(&format!("d{}", i), "s1", i as i64 % 100 + 1, "News"));
        }
        let store = Arc::new(MemoryDocumentStore::with_documents(documents));

        let fetcher = CandidateFetcher::new(store);
        let candidates = fetcher
            .fetch(&Scope {
                time_window: TimeWindow::Month,
                category: String::new(),
                source_ids: None,
            })
            .await
            .unwrap();

        assert_eq!(candidates.len(), MAX_CANDIDATES);
    }
}
