//! Embedding error types.

use ragstore_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The external provider failed
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache error. Only surfaced by explicit maintenance calls such as
    /// `EmbeddingCache::clear`; lookups and writes swallow it.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EmbeddingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::Provider(_) => ErrorKind::Retrieval,
            EmbeddingError::Io(_) | EmbeddingError::Serialization(_) => ErrorKind::Persistence,
            EmbeddingError::Cache(_) => ErrorKind::Cache,
            EmbeddingError::InvalidInput(_) | EmbeddingError::DimensionMismatch { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}
