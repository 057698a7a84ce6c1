//! SQLite-backed document store.
//!
//! Documents live in a single table with the relevance flag, published
//! timestamp, and an optional embedding stored as a little-endian f32
//! blob. The query path mirrors the external-store contract: relevance
//! flag + published-date lower bound + optional source-id membership,
//! newest first, capped.

use super::{DocumentQuery, DocumentStore, MAX_SOURCE_IDS_PER_QUERY};
use crate::types::Document;
use chrono::{DateTime, Utc};
use newsbrief_core::{AppError, AppResult};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite document store. The connection is guarded by a mutex; queries
/// at this scale are short-lived.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (and initialize) the store at the given path.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("Failed to create store directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Store(format!("Failed to open SQLite store: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                snippet TEXT NOT NULL,
                tldr TEXT,
                source_id TEXT NOT NULL,
                source_name TEXT NOT NULL,
                url TEXT NOT NULL,
                published_at TEXT NOT NULL,
                embedding BLOB,
                is_relevant INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_documents_published
                ON documents(published_at DESC);
            CREATE INDEX IF NOT EXISTS idx_documents_source
                ON documents(source_id);
            "#,
        )
        .map_err(|e| AppError::Store(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Initialized SQLite document store at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Store("store mutex poisoned".to_string()))
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let published_raw: String = row.get(7)?;
    let published_at = DateTime::parse_from_rfc3339(&published_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let embedding_bytes: Option<Vec<u8>> = row.get(8)?;
    let embedding = embedding_bytes.map(|bytes| bytes_to_embedding(&bytes));
    let embedding_dim = embedding.as_ref().map(|v| v.len());

    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        snippet: row.get(2)?,
        tldr: row.get(3)?,
        source_id: row.get(4)?,
        source_name: row.get(5)?,
        url: row.get(6)?,
        published_at,
        embedding,
        embedding_dim,
        is_relevant: row.get::<_, i64>(9)? != 0,
    })
}

const DOCUMENT_COLUMNS: &str =
    "id, title, snippet, tldr, source_id, source_name, url, published_at, embedding, is_relevant";

#[async_trait::async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> AppResult<Vec<Document>> {
        let conn = self.lock()?;

        let mut sql = format!(
            "SELECT {} FROM documents WHERE is_relevant = 1 AND published_at >= ?1",
            DOCUMENT_COLUMNS
        );

        let mut bindings: Vec<String> = vec![query.published_after.to_rfc3339()];

        if let Some(ids) = &query.source_ids {
            if ids.len() > MAX_SOURCE_IDS_PER_QUERY {
                return Err(AppError::Store(format!(
                    "source-id filter too large for one query: {} > {}",
                    ids.len(),
                    MAX_SOURCE_IDS_PER_QUERY
                )));
            }

            let placeholders: Vec<String> = (0..ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            sql.push_str(&format!(" AND source_id IN ({})", placeholders.join(", ")));
            bindings.extend(ids.iter().cloned());
        }

        sql.push_str(&format!(
            " ORDER BY published_at DESC LIMIT {}",
            query.limit
        ));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params_from_iter(bindings.iter()), row_to_document)
            .map_err(|e| AppError::Store(format!("Failed to query documents: {}", e)))?;

        let mut documents = Vec::new();
        for row in rows {
            documents
                .push(row.map_err(|e| AppError::Store(format!("Failed to read row: {}", e)))?);
        }

        Ok(documents)
    }

    async fn get(&self, id: &str) -> AppResult<Option<Document>> {
        let conn = self.lock()?;

        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query_map(params![id], row_to_document)
            .map_err(|e| AppError::Store(format!("Failed to query document: {}", e)))?;

        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| AppError::Store(format!("Failed to read row: {}", e)))?,
            )),
            None => Ok(None),
        }
    }

    async fn put_embedding(&self, id: &str, vector: &[f32]) -> AppResult<()> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE documents SET embedding = ?1 WHERE id = ?2",
                params![embedding_to_bytes(vector), id],
            )
            .map_err(|e| AppError::Store(format!("Failed to persist embedding: {}", e)))?;

        if updated == 0 {
            return Err(AppError::Store(format!("document not found: {}", id)));
        }

        Ok(())
    }

    async fn insert(&self, document: &Document) -> AppResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO documents
             (id, title, snippet, tldr, source_id, source_name, url, published_at, embedding, is_relevant)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                document.id,
                document.title,
                document.snippet,
                document.tldr,
                document.source_id,
                document.source_name,
                document.url,
                document.published_at.to_rfc3339(),
                document.embedding.as_ref().map(|v| embedding_to_bytes(v)),
                document.is_relevant as i64,
            ],
        )
        .map_err(|e| AppError::Store(format!("Failed to insert document: {}", e)))?;

        Ok(())
    }
}

/// Serialize an embedding as little-endian f32 bytes.
fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize little-endian f32 bytes into an embedding.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
