//! HNSW index implementation using usearch.
//!
//! Keys are vector positions. Metric is squared L2, so returned distances
//! are directly comparable with the flat index.
//!
//! Default parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use std::path::Path;

use ragstore_embeddings::Embedding;
use ragstore_types::{HnswSettings, IndexKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::index::{check_dimensions, Neighbor, VectorIndex};

/// HNSW graph parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Number of connections per layer (M parameter)
    pub m: usize,
    /// Build-time search depth
    pub ef_construction: usize,
    /// Query-time search depth
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
        }
    }
}

impl From<&HnswSettings> for HnswParams {
    fn from(settings: &HnswSettings) -> Self {
        Self {
            m: settings.m,
            ef_construction: settings.ef_construction,
            ef_search: settings.ef_search,
        }
    }
}

impl HnswParams {
    pub fn with_connectivity(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_expansion(mut self, ef_construction: usize, ef_search: usize) -> Self {
        self.ef_construction = ef_construction;
        self.ef_search = ef_search;
        self
    }
}

fn index_options(dimension: usize, params: &HnswParams) -> IndexOptions {
    IndexOptions {
        dimensions: dimension,
        metric: MetricKind::L2sq,
        quantization: ScalarKind::F32,
        connectivity: params.m,
        expansion_add: params.ef_construction,
        expansion_search: params.ef_search,
        multi: false, // Single vector per key
    }
}

fn path_str(path: &Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

/// HNSW index wrapper around usearch.
pub struct HnswIndex {
    index: Index,
    dimension: usize,
    params: HnswParams,
}

impl HnswIndex {
    /// Create an empty index with room for `capacity` vectors.
    pub fn new(dimension: usize, params: HnswParams, capacity: usize) -> Result<Self, VectorError> {
        let index = Index::new(&index_options(dimension, &params))
            .map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .reserve(capacity.max(1))
            .map_err(|e| VectorError::Index(e.to_string()))?;

        debug!(dim = dimension, m = params.m, "Created HNSW index");
        Ok(Self {
            index,
            dimension,
            params,
        })
    }

    /// Load a serialized index.
    ///
    /// `ef_search` is re-applied after loading because the serialized graph
    /// does not reliably carry it.
    pub fn load(path: &Path, dimension: usize, params: HnswParams) -> Result<Self, VectorError> {
        let index = Index::new(&index_options(dimension, &params))
            .map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .load(path_str(path)?)
            .map_err(|e| {
                VectorError::Persistence(format!("Failed to load {}: {}", path.display(), e))
            })?;

        if index.dimensions() != dimension {
            return Err(VectorError::Persistence(format!(
                "index file {} has dimension {}, metadata says {}",
                path.display(),
                index.dimensions(),
                dimension
            )));
        }

        index.change_expansion_search(params.ef_search);

        info!(
            path = ?path,
            vectors = index.size(),
            ef_search = params.ef_search,
            "Loaded HNSW index"
        );
        Ok(Self {
            index,
            dimension,
            params,
        })
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Current search-time expansion as reported by usearch.
    pub fn expansion_search(&self) -> usize {
        self.index.expansion_search()
    }

    fn ensure_capacity(&self, additional: usize) -> Result<(), VectorError> {
        let needed = self.index.size() + additional;
        let capacity = self.index.capacity();
        if needed > capacity {
            self.index
                .reserve(needed.max(capacity * 2))
                .map_err(|e| VectorError::Index(e.to_string()))?;
        }
        Ok(())
    }
}

impl VectorIndex for HnswIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.index.size()
    }

    fn append(&mut self, vectors: &[Embedding]) -> Result<(), VectorError> {
        check_dimensions(self.dimension, vectors)?;
        self.ensure_capacity(vectors.len())?;

        let start = self.index.size() as u64;
        for (offset, vector) in vectors.iter().enumerate() {
            self.index
                .add(start + offset as u64, &vector.values)
                .map_err(|e| VectorError::Index(e.to_string()))?;
        }

        debug!(start, count = vectors.len(), "Appended vectors");
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        if query.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.index.size() == 0 {
            return Ok(Vec::new());
        }

        // usearch sizes its result buffers from k
        let k = k.min(self.index.size());
        let matches = self
            .index
            .search(query, k)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let mut neighbors: Vec<Neighbor> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&key, &distance)| Neighbor::new(key, distance))
            .collect();
        neighbors.sort_by(Neighbor::cmp_by_distance);

        debug!(k, found = neighbors.len(), "Search complete");
        Ok(neighbors)
    }

    fn vector(&self, position: u64) -> Result<Option<Embedding>, VectorError> {
        let mut buffer = vec![0.0f32; self.dimension];
        let found = self
            .index
            .get(position, buffer.as_mut_slice())
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok((found > 0).then(|| Embedding::new(buffer)))
    }

    fn save(&self, path: &Path) -> Result<(), VectorError> {
        self.index
            .save(path_str(path)?)
            .map_err(|e| VectorError::Persistence(format!("Failed to save: {}", e)))?;

        info!(path = ?path, vectors = self.index.size(), "Saved HNSW index");
        Ok(())
    }
}
