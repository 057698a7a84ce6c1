//! Lazy embedding backfill and diversity-constrained semantic selection.
//!
//! Candidates missing a stored vector are embedded on the fly, capped
//! per request to bound added latency; per-document failures are logged
//! and skipped. Selection is greedy over candidates sorted by cosine
//! similarity, with a per-source cap enforcing answer diversity across
//! publishers without a separate weighting term.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::store::DocumentStore;
use crate::types::Document;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Lazy embedding computations per request.
pub const MAX_LAZY_EMBEDDINGS: usize = 5;

/// Semantic selection cap.
pub const MAX_SELECTED: usize = 10;

/// At most this many selected documents may share a source id.
pub const MAX_PER_SOURCE: usize = 3;

/// Default TTL for the process-local ensure cache.
const ENSURE_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Process-local, TTL-bounded cache of freshly computed vectors.
///
/// Injected rather than a module-level singleton so tests can reset it
/// and multi-process deployments can size it independently. Non-durable
/// by design.
pub struct EnsureCache {
    entries: Mutex<HashMap<String, (Instant, Vec<f32>)>>,
    ttl: Duration,
}

impl EnsureCache {
    pub fn new() -> Self {
        Self::with_ttl(ENSURE_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Fetch a cached vector if fresh.
    pub fn get(&self, document_id: &str) -> Option<Vec<f32>> {
        let entries = self.entries.lock().ok()?;
        let (created, vector) = entries.get(document_id)?;
        if created.elapsed() >= self.ttl {
            return None;
        }
        Some(vector.clone())
    }

    pub fn put(&self, document_id: &str, vector: Vec<f32>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(document_id.to_string(), (Instant::now(), vector));
        }
    }

    /// Drop all entries (test hook).
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for EnsureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily computes and persists missing document embeddings.
pub struct EmbeddingEnsurer {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EnsureCache>,
}

impl EmbeddingEnsurer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EnsureCache>,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
        }
    }

    /// Backfill embeddings for up to [`MAX_LAZY_EMBEDDINGS`] candidates
    /// that lack one. A failed backfill leaves the document without an
    /// embedding; it simply drops out of semantic selection.
    pub async fn ensure(&self, candidates: Vec<Document>) -> Vec<Document> {
        let mut ensured = Vec::with_capacity(candidates.len());
        let mut backfilled = 0usize;

        for mut document in candidates {
            if document.embedding.is_none() {
                if let Some(vector) = self.cache.get(&document.id) {
                    // A cached vector is free; only provider calls count
                    // against the backfill cap.
                    document.embedding_dim = Some(vector.len());
                    document.embedding = Some(vector);
                } else if backfilled < MAX_LAZY_EMBEDDINGS {
                    backfilled += 1;
                    match self.ensure_one(&mut document).await {
                        Ok(()) => {}
                        Err(e) => {
                            tracing::warn!(
                                document_id = %document.id,
                                "embedding backfill failed, skipping: {}", e
                            );
                        }
                    }
                }
            }
            ensured.push(document);
        }

        if backfilled > 0 {
            tracing::debug!(backfilled, "lazy embedding backfill complete");
        }

        ensured
    }

    /// Compute, persist, and re-read one document's embedding.
    async fn ensure_one(&self, document: &mut Document) -> newsbrief_core::AppResult<()> {
        let text = embedding_text(document);
        let vector = self.provider.embed(&text).await?;

        self.store.put_embedding(&document.id, &vector).await?;
        self.cache.put(&document.id, vector.clone());

        // Re-fetch to pick up the freshly persisted vector
        if let Some(fresh) = self.store.get(&document.id).await? {
            *document = fresh;
        } else {
            document.embedding_dim = Some(vector.len());
            document.embedding = Some(vector);
        }

        Ok(())
    }
}

/// Text embedded for a document: title plus the best available summary.
fn embedding_text(document: &Document) -> String {
    match &document.tldr {
        Some(tldr) => format!("{}\n{}", document.title, tldr),
        None => format!("{}\n{}", document.title, document.snippet),
    }
}

/// Rank embedded candidates by cosine similarity against the question
/// embedding, then select greedily under the per-source diversity cap.
pub fn select_diverse(query_embedding: &[f32], candidates: &[Document]) -> Vec<Document> {
    let mut scored: Vec<(f32, &Document)> = candidates
        .iter()
        .filter_map(|d| {
            d.embedding
                .as_ref()
                .map(|e| (cosine_similarity(query_embedding, e), d))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut per_source: HashMap<&str, usize> = HashMap::new();
    let mut selected = Vec::new();

    for (score, document) in scored {
        let count = per_source.entry(document.source_id.as_str()).or_insert(0);
        if *count >= MAX_PER_SOURCE {
            continue;
        }

        *count += 1;
        tracing::trace!(document_id = %document.id, score, "selected document");
        selected.push(document.clone());

        if selected.len() >= MAX_SELECTED {
            break;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedProvider;
    use crate::store::MemoryDocumentStore;
    use chrono::Utc;

    fn doc(id: &str, source_id: &str, embedding: Option<Vec<f32>>) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title {}", id),
            snippet: "hurricane claims snippet".to_string(),
            tldr: None,
            source_id: source_id.to_string(),
            source_name: format!("Source {}", source_id),
            url: format!("https://example.com/{}", id),
            published_at: Utc::now(),
            embedding_dim: embedding.as_ref().map(|e| e.len()),
            embedding,
            is_relevant: true,
        }
    }

    #[test]
    fn test_select_respects_source_cap() {
        // 5 high-similarity docs from one source, 2 from another
        let query = vec![1.0, 0.0];
        let mut candidates = Vec::new();
        for i in 0..5 {
            candidates.push(doc(&format!("a{}", i), "s1", Some(vec![1.0, 0.0])));
        }
        candidates.push(doc("b0", "s2", Some(vec![0.9, 0.1])));
        candidates.push(doc("b1", "s2", Some(vec![0.9, 0.1])));

        let selected = select_diverse(&query, &candidates);

        let s1_count = selected.iter().filter(|d| d.source_id == "s1").count();
        assert_eq!(s1_count, MAX_PER_SOURCE);
        assert_eq!(selected.len(), 5);
    }

    #[test]
    fn test_select_caps_total() {
        let query = vec![1.0, 0.0];
        let mut candidates = Vec::new();
        for i in 0..20 {
            // Spread across sources so the per-source cap never binds
            candidates.push(doc(
                &format!("d{}", i),
                &format!("s{}", i),
                Some(vec![1.0, 0.0]),
            ));
        }

        let selected = select_diverse(&query, &candidates);
        assert_eq!(selected.len(), MAX_SELECTED);
    }

    #[test]
    fn test_select_orders_by_similarity() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            doc("far", "s1", Some(vec![0.0, 1.0])),
            doc("near", "s2", Some(vec![1.0, 0.1])),
        ];

        let selected = select_diverse(&query, &candidates);
        assert_eq!(selected[0].id, "near");
    }

    #[test]
    fn test_select_skips_unembedded() {
        let query = vec![1.0, 0.0];
        let candidates = vec![doc("no-vec", "s1", None)];

        let selected = select_diverse(&query, &candidates);
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_backfills_and_persists() {
        let store = Arc::new(MemoryDocumentStore::with_documents(vec![
            doc("a", "s1", None),
            doc("b", "s1", None),
        ]));
        let provider = Arc::new(HashedProvider::new(64));
        let cache = Arc::new(EnsureCache::new());
        let ensurer = EmbeddingEnsurer::new(store.clone(), provider, cache);

        let candidates = store
            .query(&crate::store::DocumentQuery {
                published_after: Utc::now() - chrono::Duration::days(1),
                source_ids: None,
                limit: 200,
            })
            .await
            .unwrap();

        let ensured = ensurer.ensure(candidates).await;
        assert!(ensured.iter().all(|d| d.embedding.is_some()));

        // Persisted to the store too
        let fetched = store.get("a").await.unwrap().unwrap();
        assert!(fetched.embedding.is_some());
    }

    #[tokio::test]
    async fn test_ensure_caps_backfills() {
        let mut documents = Vec::new();
        for i in 0..8 {
            documents.push(doc(&format!("d{}", i), "s1", None));
        }
        let store = Arc::new(MemoryDocumentStore::with_documents(documents.clone()));
        let provider = Arc::new(HashedProvider::new(64));
        let cache = Arc::new(EnsureCache::new());
        let ensurer = EmbeddingEnsurer::new(store, provider, cache);

        let ensured = ensurer.ensure(documents).await;
        let embedded = ensured.iter().filter(|d| d.embedding.is_some()).count();
        assert_eq!(embedded, MAX_LAZY_EMBEDDINGS);
    }

    #[tokio::test]
    async fn test_ensure_cache_hits_do_not_consume_backfill_slots() {
        let cache = Arc::new(EnsureCache::new());
        cache.put("cached", vec![0.5, 0.5]);

        // One cache hit plus exactly MAX_LAZY_EMBEDDINGS uncached docs:
        // all of them must come back embedded.
        let mut documents = vec![doc("cached", "s1", None)];
        for i in 0..MAX_LAZY_EMBEDDINGS {
            documents.push(doc(&format!("d{}", i), "s1", None));
        }
        let store = Arc::new(MemoryDocumentStore::with_documents(documents.clone()));
        let provider = Arc::new(HashedProvider::new(2));
        let ensurer = EmbeddingEnsurer::new(store, provider, cache);

        let ensured = ensurer.ensure(documents).await;
        assert!(ensured.iter().all(|d| d.embedding.is_some()));
    }

    #[tokio::test]
    async fn test_ensure_cache_hit_skips_store_write() {
        let cache = Arc::new(EnsureCache::new());
        cache.put("a", vec![0.5, 0.5]);

        // Store has the doc but the cached vector wins without a write
        let store = Arc::new(MemoryDocumentStore::with_documents(vec![doc("a", "s1", None)]));
        let provider = Arc::new(HashedProvider::new(2));
        let ensurer = EmbeddingEnsurer::new(store.clone(), provider, cache);

        let ensured = ensurer.ensure(vec![doc("a", "s1", None)]).await;
        assert_eq!(ensured[0].embedding, Some(vec![0.5, 0.5]));

        let in_store = store.get("a").await.unwrap().unwrap();
        assert!(in_store.embedding.is_none());
    }

    #[test]
    fn test_ensure_cache_ttl() {
        let cache = EnsureCache::with_ttl(Duration::from_millis(0));
        cache.put("a", vec![1.0]);
        assert!(cache.get("a").is_none());
    }
}
