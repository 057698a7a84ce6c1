//! Best-effort answer caching.
//!
//! Cache keys are pure functions of the user, question shape, and scope,
//! scoped to one UTC day. Expiry is evaluated at read time against a
//! fixed TTL; there is no active eviction. Every store failure is
//! swallowed and logged — a cache problem must never fail a user-facing
//! request.

use crate::types::{AnswerResult, Scope};
use chrono::{DateTime, Utc};
use newsbrief_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// Entries older than this are treated as absent at read time.
pub const CACHE_TTL_SECS: i64 = 6 * 60 * 60;

/// Composite cache key: one slot per user per distinct question shape
/// per UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a (user, question, scope) triple.
    ///
    /// Pure and deterministic: identical inputs on the same UTC date
    /// always produce the identical key.
    pub fn build(user_id: &str, sanitized_question: &str, scope: &Scope) -> Self {
        let question_digest = sha256_hex(&sanitized_question.trim().to_lowercase());

        let source_digest = match &scope.source_ids {
            Some(ids) if !ids.is_empty() => {
                let mut sorted = ids.clone();
                sorted.sort();
                sha256_hex(&sorted.join(","))
            }
            _ => sha256_hex("all"),
        };

        let date = Utc::now().format("%Y-%m-%d");

        Self(format!(
            "{}:{}:{}:{}:{}",
            user_id,
            &question_digest[..16],
            scope.cache_segment(),
            &source_digest[..8],
            date
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A stored answer payload plus its creation timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub answer: AnswerResult,
    pub created_at: DateTime<Utc>,
}

/// Keyed get/set of opaque answer payloads.
///
/// Implementations need no native TTL — expiry is the caller's job.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CacheEntry>>;
    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> AppResult<()>;
}

/// In-memory cache store for tests and single-process deployments.
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CacheEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Cache("cache mutex poisoned".to_string()))?;
        Ok(entries.get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Cache("cache mutex poisoned".to_string()))?;
        entries.insert(key.as_str().to_string(), entry);
        Ok(())
    }
}

/// SQLite-backed cache store, sharing a database file with the document
/// store. Answers are stored as JSON; stale rows are left for the
/// read-time TTL to ignore.
pub struct SqliteCacheStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteCacheStore {
    /// Open (and initialize) the cache at the given path.
    pub fn open(db_path: &std::path::Path) -> AppResult<Self> {
        let conn = rusqlite::Connection::open(db_path)
            .map_err(|e| AppError::Cache(format!("Failed to open SQLite cache: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS answer_cache (
                key TEXT PRIMARY KEY,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Cache(format!("Failed to create cache table: {}", e)))?;

        tracing::debug!("Initialized SQLite answer cache at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Cache("cache mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CacheEntry>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT answer, created_at FROM answer_cache WHERE key = ?1")
            .map_err(|e| AppError::Cache(format!("Failed to prepare cache query: {}", e)))?;

        let mut rows = stmt
            .query_map(rusqlite::params![key.as_str()], |row| {
                let answer: String = row.get(0)?;
                let created_at: String = row.get(1)?;
                Ok((answer, created_at))
            })
            .map_err(|e| AppError::Cache(format!("Failed to query cache: {}", e)))?;

        match rows.next() {
            Some(row) => {
                let (answer_json, created_at) =
                    row.map_err(|e| AppError::Cache(format!("Failed to read cache row: {}", e)))?;

                let answer: AnswerResult = serde_json::from_str(&answer_json)
                    .map_err(|e| AppError::Cache(format!("Corrupt cached answer: {}", e)))?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| AppError::Cache(format!("Corrupt cache timestamp: {}", e)))?
                    .with_timezone(&Utc);

                Ok(Some(CacheEntry { answer, created_at }))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> AppResult<()> {
        let conn = self.lock()?;

        let answer_json = serde_json::to_string(&entry.answer)
            .map_err(|e| AppError::Cache(format!("Failed to serialize answer: {}", e)))?;

        conn.execute(
            "INSERT OR REPLACE INTO answer_cache (key, answer, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                key.as_str(),
                answer_json,
                entry.created_at.to_rfc3339()
            ],
        )
        .map_err(|e| AppError::Cache(format!("Failed to write cache entry: {}", e)))?;

        Ok(())
    }
}

/// TTL-aware wrapper around a [`CacheStore`].
pub struct CacheManager {
    store: std::sync::Arc<dyn CacheStore>,
    ttl_secs: i64,
}

impl CacheManager {
    pub fn new(store: std::sync::Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl_secs: CACHE_TTL_SECS,
        }
    }

    /// Override the TTL (mainly for tests).
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Fetch a cached answer if present and fresh.
    ///
    /// Any lookup failure is treated as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<AnswerResult> {
        let entry = match self.store.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!("cache read failed, treating as miss: {}", e);
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(entry.created_at);
        if age.num_seconds() >= self.ttl_secs {
            tracing::debug!(key = %key, "cache entry expired");
            return None;
        }

        Some(entry.answer)
    }

    /// Store an answer. Failures are logged and not propagated.
    pub async fn set(&self, key: &CacheKey, answer: AnswerResult) {
        let entry = CacheEntry {
            answer,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.set(key, entry).await {
            tracing::warn!("cache write failed: {}", e);
        }
    }
}
