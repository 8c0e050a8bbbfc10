//! Retrieval engine.
//!
//! Embeds queries through the engine's `Embedder`, queries the vector
//! engine and maps positions back to documents. The vector engine is
//! shared behind a `RwLock`; searches take the read lock and only fall
//! back to the write lock to lazily load a persisted generation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use ragstore_embeddings::Embedding;
use ragstore_types::{DocumentRecord, RetrievalSettings};
use ragstore_vector::{ScoredDocument, VectorEngine, VectorError};
use tracing::debug;

use crate::error::RetrievalError;
use crate::mmr::{self, FETCH_FACTOR};
use crate::retriever::{Retriever, RetrieverOptions};

/// Retrieval configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    /// Default number of results for retrievers
    pub k: usize,
    /// MMR trade-off: 1.0 = pure relevance, 0.0 = pure diversity
    pub lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 4, lambda: 0.5 }
    }
}

impl From<&RetrievalSettings> for RetrievalConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            k: settings.k,
            lambda: settings.mmr_lambda,
        }
    }
}

/// Similarity and MMR search over a shared `VectorEngine`.
#[derive(Clone)]
pub struct RetrievalEngine {
    engine: Arc<RwLock<VectorEngine>>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(engine: Arc<RwLock<VectorEngine>>, config: RetrievalConfig) -> Self {
        Self { engine, config }
    }

    /// Take ownership of an engine.
    pub fn from_engine(engine: VectorEngine, config: RetrievalConfig) -> Self {
        Self::new(Arc::new(RwLock::new(engine)), config)
    }

    pub fn engine(&self) -> &Arc<RwLock<VectorEngine>> {
        &self.engine
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Run `f` against a loaded engine, loading from disk on first use.
    fn with_loaded<T>(
        &self,
        f: impl FnOnce(&VectorEngine) -> Result<T, VectorError>,
    ) -> Result<T, RetrievalError> {
        {
            let engine = self.engine.read().map_err(|_| RetrievalError::LockPoisoned)?;
            if engine.is_loaded() {
                return f(&*engine).map_err(RetrievalError::from);
            }
        }

        let mut engine = self.engine.write().map_err(|_| RetrievalError::LockPoisoned)?;
        if !engine.ensure_loaded()? {
            return Err(RetrievalError::NoIndex);
        }
        f(&*engine).map_err(RetrievalError::from)
    }

    /// The `k` documents nearest to `query`, closest first.
    pub fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentRecord>, RetrievalError> {
        Ok(self
            .similarity_search_with_score(query, k)?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }

    /// Like `similarity_search`, with each document's squared L2 distance.
    pub fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(DocumentRecord, f32)>, RetrievalError> {
        let hits = self.with_loaded(|engine| {
            let embedding = engine.embedder().embed_query(query)?;
            engine.search_by_vector(&embedding, k)
        })?;

        debug!(k, found = hits.len(), "Similarity search complete");
        Ok(hits
            .into_iter()
            .map(|hit| (hit.record, hit.distance))
            .collect())
    }

    /// Nearest documents to a pre-computed query embedding.
    pub fn search_by_vector(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        self.with_loaded(|engine| engine.search_by_vector(query, k))
    }

    /// MMR search with the configured lambda.
    pub fn mmr_search(&self, query: &str, k: usize) -> Result<Vec<DocumentRecord>, RetrievalError> {
        self.mmr_search_with_lambda(query, k, self.config.lambda)
    }

    /// Fetch `3k` candidates by distance and pick up to `k` of them,
    /// trading relevance against redundancy.
    pub fn mmr_search_with_lambda(
        &self,
        query: &str,
        k: usize,
        lambda: f32,
    ) -> Result<Vec<DocumentRecord>, RetrievalError> {
        if !(0.0..=1.0).contains(&lambda) {
            return Err(RetrievalError::InvalidOption(format!(
                "lambda must be within 0.0-1.0, got {}",
                lambda
            )));
        }

        let selected = self.with_loaded(|engine| {
            if k == 0 {
                return Ok(Vec::new());
            }
            let embedding = engine.embedder().embed_query(query)?;
            let (candidates, vectors): (Vec<ScoredDocument>, Vec<Embedding>) = engine
                .search_with_vectors(&embedding, k.saturating_mul(FETCH_FACTOR))?
                .into_iter()
                .unzip();

            let limit = candidates.len().min(k);
            let mut picked = Vec::with_capacity(limit);
            let mut seen = HashSet::with_capacity(limit);
            for i in mmr::select(&embedding, &vectors, k, lambda) {
                let record = &candidates[i].record;
                if seen.insert(record.id.clone()) {
                    picked.push(record.clone());
                }
            }
            debug!(k, candidates = candidates.len(), selected = picked.len(), "MMR search complete");
            Ok(picked)
        })?;

        Ok(selected)
    }

    /// A callable bound to fixed search options.
    pub fn as_retriever(&self, options: RetrieverOptions) -> Retriever {
        Retriever::new(self.clone(), options)
    }

    /// Retriever using the configured `k` and lambda with similarity search.
    pub fn default_retriever(&self) -> Retriever {
        self.as_retriever(RetrieverOptions::from(&self.config))
    }
}
