//! Error types for the newsbrief service.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: request validation, document store access, caching,
//! embeddings, LLM calls, and model-output validation.
//!
//! Refusals are deliberately *not* errors. A refusal is a policy decision
//! returned as a normal answer; only genuine failures travel through
//! `AppError`.

use thiserror::Error;

/// Unified error type for the newsbrief service.
///
/// All fallible functions in the application return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or out-of-bounds request fields, rejected before any
    /// pipeline work
    #[error("Validation error: {0}")]
    Validation(String),

    /// Document store query/update failures
    #[error("Store error: {0}")]
    Store(String),

    /// Cache store failures. These are swallowed at the call site and
    /// logged; the variant exists so cache implementations can still
    /// return typed errors.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Embedding provider failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Structured model output failed schema/type validation. Fatal and
    /// never retried: this is an upstream contract breach.
    #[error("invalid AI response")]
    InvalidModelOutput,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Per-variant copy for fanning one failure out to several waiters.
    ///
    /// `Io` wraps a non-cloneable source and degrades to `Other` with the
    /// same message; every other variant is reproduced exactly.
    pub fn duplicate(&self) -> Self {
        match self {
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Store(s) => AppError::Store(s.clone()),
            AppError::Cache(s) => AppError::Cache(s.clone()),
            AppError::Embedding(s) => AppError::Embedding(s.clone()),
            AppError::Llm(s) => AppError::Llm(s.clone()),
            AppError::InvalidModelOutput => AppError::InvalidModelOutput,
            AppError::Serialization(s) => AppError::Serialization(s.clone()),
            AppError::Io(e) => AppError::Other(e.to_string()),
            AppError::Other(s) => AppError::Other(s.clone()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_output_message() {
        let err = AppError::InvalidModelOutput;
        assert_eq!(err.to_string(), "invalid AI response");
    }

    #[test]
    fn test_duplicate_preserves_variant() {
        let copy = AppError::InvalidModelOutput.duplicate();
        assert!(matches!(copy, AppError::InvalidModelOutput));

        let copy = AppError::Llm("timeout".to_string()).duplicate();
        assert!(matches!(copy, AppError::Llm(message) if message == "timeout"));
    }

    #[test]
    fn test_duplicate_degrades_io_to_other() {
        let io = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let copy = io.duplicate();
        assert!(matches!(copy, AppError::Other(message) if message.contains("disk gone")));
    }

    #[test]
    fn test_validation_message() {
        let err = AppError::Validation("question too short".to_string());
        assert!(err.to_string().contains("question too short"));
    }
}
