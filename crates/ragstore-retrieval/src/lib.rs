//! # ragstore-retrieval
//!
//! Query-side API over the ragstore vector engine.
//!
//! - [`RetrievalEngine`]: similarity top-k and MMR diversified search
//! - [`Retriever`]: a `(query) -> documents` callable bound to fixed options
//! - [`mmr`]: the greedy maximal-marginal-relevance selection
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = VectorEngine::new(EngineConfig::from_settings(&settings), embedder);
//! let retrieval = RetrievalEngine::from_engine(engine, RetrievalConfig::from(&settings.retrieval));
//!
//! let top = retrieval.similarity_search("how are backups named?", 4)?;
//! let retrieve = retrieval.as_retriever(RetrieverOptions::mmr(4)).into_fn();
//! let diverse = retrieve("how are backups named?")?;
//! ```

pub mod engine;
pub mod error;
pub mod mmr;
pub mod retriever;

pub use engine::{RetrievalConfig, RetrievalEngine};
pub use error::RetrievalError;
pub use mmr::FETCH_FACTOR;
pub use retriever::{Retriever, RetrieverFn, RetrieverOptions, SearchKind};
