//! # ragstore-embeddings
//!
//! Cache-first embedding gateway for the ragstore vector index.
//!
//! Raw embeddings come from an external [`EmbeddingProvider`]. This crate
//! puts an on-disk, content-addressed cache in front of it so the same text
//! is never embedded twice within the cache lifetime, across builds,
//! searches and process restarts.
//!
//! ## Features
//! - One JSON file per cache entry, keyed by the SHA-256 of the text
//! - 24 hour expiry, checked lazily at read time
//! - Best-effort writes: a failing cache never fails an embedding request
//! - Batched provider calls for cache misses, order-preserving results

pub mod cache;
pub mod error;
pub mod gateway;
pub mod model;

pub use cache::{fingerprint, CacheConfig, EmbeddingCache, CACHE_DIR_NAME, DEFAULT_CACHE_TTL};
pub use error::EmbeddingError;
pub use gateway::{CachedEmbedder, Embedder, GatewayStats};
pub use model::{Embedding, EmbeddingProvider};
