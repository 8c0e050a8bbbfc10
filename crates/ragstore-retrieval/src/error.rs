//! Retrieval error types.

use ragstore_types::ErrorKind;
use ragstore_vector::VectorError;
use thiserror::Error;

/// Errors raised by search-path operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Nothing built and nothing loadable on disk
    #[error("No index available")]
    NoIndex,

    /// Underlying engine failure, with its message attached
    #[error("Retrieval failed: {0}")]
    Engine(#[source] VectorError),

    /// Engine lock poisoned by a panicking writer
    #[error("Retrieval failed: engine lock poisoned")]
    LockPoisoned,

    /// Rejected search option
    #[error("Invalid retrieval option: {0}")]
    InvalidOption(String),
}

impl From<VectorError> for RetrievalError {
    fn from(e: VectorError) -> Self {
        match e {
            VectorError::NotInitialized => RetrievalError::NoIndex,
            other => RetrievalError::Engine(other),
        }
    }
}

impl RetrievalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::InvalidOption(_) => ErrorKind::Configuration,
            _ => ErrorKind::Retrieval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_initialized_becomes_no_index() {
        let err = RetrievalError::from(VectorError::NotInitialized);
        assert!(matches!(err, RetrievalError::NoIndex));
        assert_eq!(err.to_string(), "No index available");
    }

    #[test]
    fn test_engine_errors_keep_message() {
        let err = RetrievalError::from(VectorError::Persistence("corrupt docstore.json".into()));
        assert_eq!(err.kind(), ErrorKind::Retrieval);
        assert!(err.to_string().contains("corrupt docstore.json"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
