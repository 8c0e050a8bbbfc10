//! End-to-end test infrastructure for ragstore.
//!
//! Provides a shared TestHarness, a deterministic embedding provider that
//! counts its calls, and helpers for building engines over a temp index
//! directory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragstore_embeddings::{
    CacheConfig, CachedEmbedder, Embedder, Embedding, EmbeddingCache, EmbeddingError,
    EmbeddingProvider,
};
use ragstore_types::Document;
use ragstore_vector::{EngineConfig, HnswParams, IndexKind, VectorEngine};

/// Topic keywords, each mapped to its own axis by `TopicProvider`.
pub const TOPICS: [&str; 3] = ["rust", "pasta", "neural"];

/// Calls observed by a `TopicProvider`.
#[derive(Debug, Clone, Default)]
pub struct ProviderCounters {
    calls: Arc<AtomicUsize>,
    texts: Arc<AtomicUsize>,
}

impl ProviderCounters {
    /// Batch calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts embedded across all calls
    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

/// Deterministic provider.
///
/// A text's vector has 1.0 on the axis of the first topic keyword it
/// contains (the last axis when none match), plus a small length-derived
/// component on the next axis so different texts rarely collide.
#[derive(Debug, Clone)]
pub struct TopicProvider {
    dimension: usize,
    counters: ProviderCounters,
}

impl TopicProvider {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension >= 2, "TopicProvider needs at least two axes");
        Self {
            dimension,
            counters: ProviderCounters::default(),
        }
    }

    pub fn counters(&self) -> ProviderCounters {
        self.counters.clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let axis = TOPICS
            .iter()
            .position(|topic| lower.contains(topic))
            .unwrap_or(self.dimension - 1)
            % self.dimension;

        let mut values = vec![0.0f32; self.dimension];
        values[axis] = 1.0;
        values[(axis + 1) % self.dimension] += (text.len() % 17) as f32 * 0.01;
        values
    }
}

impl EmbeddingProvider for TopicProvider {
    fn name(&self) -> &str {
        "topic-test-provider"
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        self.counters.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| Embedding::new(self.vector_for(t)))
            .collect())
    }
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Index directory (not created until the first build)
    pub index_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_dir = temp_dir.path().join("vector-index");
        Self {
            _temp_dir: temp_dir,
            index_dir,
        }
    }

    /// Engine config for this harness, with small HNSW expansion for speed.
    pub fn config(&self, kind: IndexKind) -> EngineConfig {
        EngineConfig::new(&self.index_dir)
            .with_kind(kind)
            .with_hnsw(HnswParams::default().with_expansion(64, 64))
    }

    /// Cache-backed embedder over a fresh `TopicProvider`.
    pub fn embedder(&self, dimension: usize) -> (Arc<dyn Embedder>, ProviderCounters) {
        let provider = TopicProvider::new(dimension);
        let counters = provider.counters();
        let cache = EmbeddingCache::open(CacheConfig::for_index_dir(&self.index_dir));
        (Arc::new(CachedEmbedder::new(provider, cache)), counters)
    }

    /// Engine with a cache-backed 4-dimensional topic embedder.
    pub fn engine(&self, kind: IndexKind) -> (VectorEngine, ProviderCounters) {
        let (embedder, counters) = self.embedder(4);
        (VectorEngine::new(self.config(kind), embedder), counters)
    }

    pub fn cache(&self) -> EmbeddingCache {
        EmbeddingCache::open(CacheConfig::for_index_dir(&self.index_dir))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Documents with the given contents and a `source` metadata entry.
pub fn documents(texts: &[&str]) -> Vec<Document> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Document::new(*text).with_metadata("source", format!("doc-{}.txt", i)))
        .collect()
}

/// `count` random unit vectors of `dimension`.
pub fn random_unit_embeddings(count: usize, dimension: usize) -> Vec<Embedding> {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let values: Vec<f32> = (0..dimension).map(|_| rng.random::<f32>() - 0.5).collect();
            Embedding::new(values).normalized()
        })
        .collect()
}

/// Read every generation artifact, for before/after comparisons.
pub fn snapshot_generation(engine: &VectorEngine) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    let layout = engine.layout();
    let mut files = Vec::new();
    for path in [
        layout.index_file(IndexKind::Hnsw),
        layout.index_file(IndexKind::Flat),
        layout.docstore_file(),
        layout.metadata_file(),
    ] {
        if path.is_file() {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            files.push((name, std::fs::read(&path)?));
        }
    }
    Ok(files)
}
