//! Retriever: a query-to-documents callable bound to fixed options.

use ragstore_types::DocumentRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{RetrievalConfig, RetrievalEngine};
use crate::error::RetrievalError;

/// Search algorithm a retriever uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    #[default]
    Similarity,
    Mmr,
}

/// Options fixed when a retriever is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrieverOptions {
    pub k: usize,
    pub search_kind: SearchKind,
    /// MMR trade-off, ignored for similarity search
    pub lambda: f32,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrieverOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.k,
            search_kind: SearchKind::Similarity,
            lambda: config.lambda,
        }
    }
}

impl RetrieverOptions {
    pub fn similarity(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn mmr(k: usize) -> Self {
        Self {
            k,
            search_kind: SearchKind::Mmr,
            ..Self::default()
        }
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }
}

/// Boxed single-argument retrieval function for downstream callers.
pub type RetrieverFn =
    Box<dyn Fn(&str) -> Result<Vec<DocumentRecord>, RetrievalError> + Send + Sync>;

/// Query-to-documents callable.
///
/// Creating one never touches the index; a missing index surfaces as
/// `RetrievalError::NoIndex` when it is called.
#[derive(Clone)]
pub struct Retriever {
    engine: RetrievalEngine,
    options: RetrieverOptions,
}

impl Retriever {
    pub fn new(engine: RetrievalEngine, options: RetrieverOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &RetrieverOptions {
        &self.options
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<DocumentRecord>, RetrievalError> {
        debug!(k = self.options.k, kind = ?self.options.search_kind, "Retrieving");
        match self.options.search_kind {
            SearchKind::Similarity => self.engine.similarity_search(query, self.options.k),
            SearchKind::Mmr => {
                self.engine
                    .mmr_search_with_lambda(query, self.options.k, self.options.lambda)
            }
        }
    }

    pub fn into_fn(self) -> RetrieverFn {
        Box::new(move |query| self.retrieve(query))
    }
}
