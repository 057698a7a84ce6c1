//! Grounded question answering over a news-document corpus.
//!
//! This crate implements the hybrid retrieval + grounded-generation
//! pipeline behind the newsbrief conversational feature: input hardening,
//! two-stage candidate ranking (lexical then semantic with diversity
//! constraints), response caching, refusal policy, and both batch and
//! token-streaming answer generation with post-hoc citation, takeaway,
//! and follow-up derivation.
//!
//! External collaborators (document ingestion, per-user quotas, UI) are
//! reached only through the narrow traits in [`store`], [`cache`],
//! [`embeddings`], and the `LlmClient` trait from `newsbrief-llm`.

pub mod cache;
pub mod context;
pub mod derive;
pub mod embeddings;
pub mod fetch;
pub mod generate;
pub mod lexical;
pub mod pipeline;
pub mod prompt;
pub mod refusal;
pub mod relevance;
pub mod sanitize;
pub mod semantic;
pub mod singleflight;
pub mod sse;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod validate;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::{CacheKey, CacheManager, CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use pipeline::{AskPipeline, PipelineConfig};
pub use refusal::RefusalKind;
pub use sse::{encode_event, StreamEvent};
pub use store::{DocumentQuery, DocumentStore};
pub use types::{
    AnswerResult, AskRequest, AskResponse, ChatTurn, Citation, ContextItem, Document, Scope,
    TimeWindow, TurnRole,
};
