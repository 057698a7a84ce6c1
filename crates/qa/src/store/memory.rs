//! In-memory document store for tests.

use super::{DocumentQuery, DocumentStore};
use crate::types::Document;
use newsbrief_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Simple in-memory store applying the same query contract as the
/// SQLite implementation.
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the store with a batch of documents.
    pub fn with_documents(documents: Vec<Document>) -> Self {
        let store = Self::new();
        {
            let mut map = store.documents.lock().expect("store mutex poisoned");
            for doc in documents {
                map.insert(doc.id.clone(), doc);
            }
        }
        store
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> AppResult<Vec<Document>> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| AppError::Store("store mutex poisoned".to_string()))?;

        let mut matched: Vec<Document> = documents
            .values()
            .filter(|d| d.is_relevant && d.published_at >= query.published_after)
            .filter(|d| match &query.source_ids {
                Some(ids) => ids.contains(&d.source_id),
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        matched.truncate(query.limit);

        Ok(matched)
    }

    async fn get(&self, id: &str) -> AppResult<Option<Document>> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| AppError::Store("store mutex poisoned".to_string()))?;
        Ok(documents.get(id).cloned())
    }

    async fn put_embedding(&self, id: &str, vector: &[f32]) -> AppResult<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| AppError::Store("store mutex poisoned".to_string()))?;

        let doc = documents
            .get_mut(id)
            .ok_or_else(|| AppError::Store(format!("document not found: {}", id)))?;

        doc.embedding = Some(vector.to_vec());
        doc.embedding_dim = Some(vector.len());
        Ok(())
    }

    async fn insert(&self, document: &Document) -> AppResult<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| AppError::Store("store mutex poisoned".to_string()))?;
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn doc(id: &str, source_id: &str, hours_ago: i64, relevant: bool) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title {}", id),
            snippet: "snippet".to_string(),
            tldr: None,
            source_id: source_id.to_string(),
            source_name: format!("Source {}", source_id),
            url: format!("https://example.com/{}", id),
            published_at: Utc::now() - Duration::hours(hours_ago),
            embedding: None,
            embedding_dim: None,
            is_relevant: relevant,
        }
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let store = MemoryDocumentStore::with_documents(vec![
            doc("a", "s1", 1, true),
            doc("b", "s1", 48, true),  // outside 36h cutoff
            doc("c", "s2", 2, true),
            doc("d", "s1", 3, false), // not relevant
        ]);

        let query = DocumentQuery {
            published_after: Utc::now() - Duration::hours(36),
            source_ids: None,
            limit: 200,
        };

        let results = store.query(&query).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_query_source_filter_and_limit() {
        let store = MemoryDocumentStore::with_documents(vec![
            doc("a", "s1", 1, true),
            doc("b", "s1", 2, true),
            doc("c", "s2", 3, true),
        ]);

        let query = DocumentQuery {
            published_after: Utc::now() - Duration::days(7),
            source_ids: Some(vec!["s1".to_string()]),
            limit: 1,
        };

        let results = store.query(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn test_put_embedding() {
        let store = MemoryDocumentStore::with_documents(vec![doc("a", "s1", 1, true)]);

        store.put_embedding("a", &[0.1, 0.2]).await.unwrap();

        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.embedding, Some(vec![0.1, 0.2]));
        assert_eq!(fetched.embedding_dim, Some(2));
    }
}
