//! # ragstore-vector
//!
//! Persistent vector index engine for ragstore.
//!
//! A directory holds one *generation*: the index binary, the document table
//! with its position map, and `metadata.json`. The engine builds, extends,
//! saves, reloads and clears generations as a unit, snapshotting the
//! previous generation to a sibling backup directory before overwriting or
//! deleting it.
//!
//! ## Features
//! - Graph-based ANN via usearch HNSW (`m`, `ef_construction`, `ef_search`)
//! - Exact brute-force index for small corpora and tests
//! - Squared L2 distance everywhere, lower is better
//! - Append-only positions: ids are never reused within a generation
//! - Timestamped backups before every destructive write

pub mod docstore;
pub mod engine;
pub mod error;
pub mod flat;
pub mod hnsw;
pub mod index;
pub mod layout;
pub mod metadata;

pub use docstore::{DocumentTable, DOCSTORE_FORMAT_VERSION};
pub use engine::{BuildOutcome, EngineConfig, EngineState, ScoredDocument, VectorEngine};
pub use error::VectorError;
pub use flat::FlatIndex;
pub use hnsw::{HnswIndex, HnswParams};
pub use index::{IndexStats, Neighbor, VectorIndex};
pub use layout::IndexLayout;
pub use metadata::IndexMetadata;
pub use ragstore_types::IndexKind;
