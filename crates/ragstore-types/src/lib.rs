//! # ragstore-types
//!
//! Shared domain types for the ragstore vector index engine.
//!
//! This crate defines the data structures used throughout the system:
//! - Documents: pre-chunked passages handed to the index, and the
//!   `DocumentRecord`s the index assigns identities to
//! - Errors: the cross-crate failure taxonomy (`ErrorKind`)
//! - Settings: layered configuration for every component
//! - Telemetry: opt-in tracing subscriber bootstrap
//!
//! ## Usage
//!
//! ```rust
//! use ragstore_types::{Document, Settings};
//!
//! let doc = Document::new("Rust ownership prevents data races");
//! let settings = Settings::default();
//! assert!(settings.validate().is_ok());
//! assert!(!doc.content.is_empty());
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod telemetry;

pub use config::{CacheSettings, HnswSettings, IndexKind, RetrievalSettings, Settings};
pub use document::{Document, DocumentRecord, Metadata};
pub use error::{ConfigError, ErrorKind};
pub use telemetry::init_tracing;
