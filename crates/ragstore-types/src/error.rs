//! Error taxonomy shared across ragstore crates.

use std::fmt;

use thiserror::Error;

/// Classification every component error maps onto.
///
/// Each crate keeps its own error enum; `kind()` on those enums returns one
/// of these so callers can react to a failure class without matching on
/// crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid input or settings: dimension mismatch, empty build input.
    Configuration,
    /// Missing or corrupt on-disk artifacts, failed writes.
    Persistence,
    /// Embedding cache failures. Never fatal.
    Cache,
    /// No index available, or a query failed underneath.
    Retrieval,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Cache => "cache",
            ErrorKind::Retrieval => "retrieval",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered config could not be built or deserialized
    #[error("Configuration error: {0}")]
    Load(String),

    /// A value is out of its allowed range
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Tracing subscriber could not be installed
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
