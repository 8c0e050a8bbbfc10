//! Cache-first embedding gateway.
//!
//! `CachedEmbedder` wraps an `EmbeddingProvider`, answering from the
//! `EmbeddingCache` where it can and sending only the misses to the
//! provider, in a single batch call. Queries and documents share one cache
//! namespace.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ragstore_types::CacheSettings;
use tracing::debug;

use crate::cache::{CacheConfig, EmbeddingCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider};

/// Embedding capability consumed by the vector engine and retrieval.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
pub trait Embedder: Send + Sync {
    /// Embed texts, one result per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Embed a single query text.
    fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Provider("no embedding returned for query".to_string()))
    }

    /// Embed owned strings.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed_batch(&refs)
    }
}

/// Gateway counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Texts answered from the cache
    pub hits: u64,
    /// Texts sent to the provider
    pub misses: u64,
    /// Batch calls made to the provider
    pub provider_calls: u64,
}

/// `Embedder` that consults an `EmbeddingCache` before the provider.
pub struct CachedEmbedder<P: EmbeddingProvider> {
    provider: P,
    cache: Option<EmbeddingCache>,
    hits: AtomicU64,
    misses: AtomicU64,
    provider_calls: AtomicU64,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self::with_optional_cache(provider, Some(cache))
    }

    /// Gateway with caching disabled: every text goes to the provider.
    pub fn uncached(provider: P) -> Self {
        Self::with_optional_cache(provider, None)
    }

    /// Gateway configured from settings; `enabled = false` disables the cache.
    pub fn from_settings(provider: P, settings: &CacheSettings, index_dir: impl AsRef<Path>) -> Self {
        if !settings.enabled {
            debug!(provider = provider.name(), "Embedding cache disabled");
            return Self::uncached(provider);
        }
        let cache = EmbeddingCache::open(CacheConfig::from_settings(settings, index_dir));
        Self::new(provider, cache)
    }

    pub fn with_optional_cache(provider: P, cache: Option<EmbeddingCache>) -> Self {
        Self {
            provider,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            provider_calls: AtomicU64::new(0),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cache(&self) -> Option<&EmbeddingCache> {
        self.cache.as_ref()
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, text: &str) -> Option<Embedding> {
        self.cache.as_ref().and_then(|cache| cache.get(text))
    }

    fn store(&self, text: &str, embedding: &Embedding) {
        if let Some(cache) = &self.cache {
            cache.put(text, embedding);
        }
    }

    /// Embed `texts[positions]` with one provider call and cache the results.
    ///
    /// The provider must return one vector per text, all of one dimension.
    fn fetch(&self, texts: &[&str], positions: &[usize]) -> Result<Vec<Embedding>, EmbeddingError> {
        let batch: Vec<&str> = positions.iter().map(|&p| texts[p]).collect();
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        let fresh = self.provider.embed(&batch)?;
        if fresh.len() != batch.len() {
            return Err(EmbeddingError::InvalidInput(format!(
                "provider {} returned {} embeddings for {} texts",
                self.provider.name(),
                fresh.len(),
                batch.len()
            )));
        }
        if let Some(first) = fresh.first() {
            check_uniform(&fresh, first.dimension())?;
        }

        for (text, embedding) in batch.iter().zip(&fresh) {
            self.store(text, embedding);
        }
        Ok(fresh)
    }
}

fn check_uniform(embeddings: &[Embedding], expected: usize) -> Result<(), EmbeddingError> {
    match embeddings.iter().find(|e| e.dimension() != expected) {
        Some(bad) => Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: bad.dimension(),
        }),
        None => Ok(()),
    }
}

impl<P: EmbeddingProvider> Embedder for CachedEmbedder<P> {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut cached: Vec<(usize, Embedding)> = Vec::new();
        let mut pending: Vec<usize> = Vec::new();
        for (position, text) in texts.iter().enumerate() {
            match self.lookup(text) {
                Some(embedding) => cached.push((position, embedding)),
                None => pending.push(position),
            }
        }

        // Hits that disagree among themselves, with no fresh vector to compare
        // against: the provider decides for all of them.
        if pending.is_empty() {
            let dimension = cached.first().map(|(_, e)| e.dimension()).unwrap_or(0);
            if cached.iter().any(|(_, e)| e.dimension() != dimension) {
                pending = cached.drain(..).map(|(position, _)| position).collect();
            }
        }

        let mut resolved: Vec<(usize, Embedding)> = Vec::with_capacity(texts.len());
        if !pending.is_empty() {
            let fresh = self.fetch(texts, &pending)?;
            let reference = fresh.first().map(|e| e.dimension()).unwrap_or(0);
            resolved.extend(pending.iter().copied().zip(fresh));

            // Entries written under another provider dimension are stale
            let (current, stale): (Vec<_>, Vec<_>) = cached
                .into_iter()
                .partition(|(_, e)| e.dimension() == reference);
            cached = current;

            if !stale.is_empty() {
                let positions: Vec<usize> = stale.into_iter().map(|(position, _)| position).collect();
                debug!(count = positions.len(), dim = reference, "Re-embedding stale cache entries");
                let refreshed = self.fetch(texts, &positions)?;
                check_uniform(&refreshed, reference)?;
                pending.extend_from_slice(&positions);
                resolved.extend(positions.into_iter().zip(refreshed));
            }
        }

        let hits = cached.len() as u64;
        let misses = pending.len() as u64;
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);

        resolved.extend(cached);
        resolved.sort_by_key(|(position, _)| *position);

        debug!(
            provider = self.provider.name(),
            total = texts.len(),
            hits,
            misses,
            "Embedded batch"
        );

        Ok(resolved.into_iter().map(|(_, e)| e).collect())
    }
}
