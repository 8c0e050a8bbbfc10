//! Vector index error types.

use ragstore_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch or flat index failure
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Rejected input (empty build, count mismatch)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or corrupt on-disk generation
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No generation built or loaded
    #[error("No index available")]
    NotInitialized,

    /// Embedding error
    #[error("Embedding error: {0}")]
    Embedding(#[from] ragstore_embeddings::EmbeddingError),
}

impl VectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectorError::DimensionMismatch { .. } | VectorError::InvalidInput(_) => {
                ErrorKind::Configuration
            }
            VectorError::Persistence(_) | VectorError::Io(_) | VectorError::Serialization(_) => {
                ErrorKind::Persistence
            }
            VectorError::Index(_) | VectorError::NotInitialized => ErrorKind::Retrieval,
            VectorError::Embedding(e) => e.kind(),
        }
    }
}
