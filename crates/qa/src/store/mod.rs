//! Document store boundary.
//!
//! The store is an external collaborator; this module defines the narrow
//! query contract the pipeline consumes and two implementations: a
//! SQLite-backed store for local deployments and an in-memory store for
//! tests.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use crate::types::Document;
use chrono::{DateTime, Utc};
use newsbrief_core::AppResult;

/// Stores commonly cap "IN"-style filter cardinality; the fetcher chunks
/// larger source-id sets into queries of at most this many ids.
pub const MAX_SOURCE_IDS_PER_QUERY: usize = 10;

/// A single store query: relevant documents, published on or after the
/// cutoff, optionally restricted to a set of source ids, newest first,
/// capped at `limit`.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    pub published_after: DateTime<Utc>,

    /// At most [`MAX_SOURCE_IDS_PER_QUERY`] ids per query
    pub source_ids: Option<Vec<String>>,

    pub limit: usize,
}

/// Read access to the document corpus, plus embedding persistence for
/// the lazy backfill step.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run one filtered query. Results are ordered by published-at
    /// descending and capped at `query.limit`.
    async fn query(&self, query: &DocumentQuery) -> AppResult<Vec<Document>>;

    /// Fetch one document by id.
    async fn get(&self, id: &str) -> AppResult<Option<Document>>;

    /// Persist a freshly computed embedding for one document.
    async fn put_embedding(&self, id: &str, vector: &[f32]) -> AppResult<()>;

    /// Insert or replace a document (used by ingestion tooling and tests).
    async fn insert(&self, document: &Document) -> AppResult<()>;
}
