//! Embedding providers.
//!
//! The pipeline compares a question embedding against document
//! embeddings in the same space; this module defines the provider seam
//! and two implementations: an Ollama-backed provider for real
//! deployments and a deterministic hashed provider for tests and
//! offline development.

pub mod hashed;
pub mod ollama;

pub use hashed::HashedProvider;
pub use ollama::OllamaEmbeddingProvider;

use newsbrief_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get provider name (e.g., "ollama", "hashed")
    fn provider_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider by name.
pub fn create_provider(
    provider: &str,
    model: &str,
    dimensions: usize,
    endpoint: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider {
        "ollama" => Ok(Arc::new(OllamaEmbeddingProvider::new(
            endpoint.unwrap_or("http://localhost:11434"),
            model,
            dimensions,
        ))),
        "hashed" => Ok(Arc::new(HashedProvider::new(dimensions))),
        _ => Err(AppError::Embedding(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, hashed",
            provider
        ))),
    }
}

/// Cosine similarity of two vectors (normalized dot product).
///
/// Returns 0.0 for mismatched dimensions or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
