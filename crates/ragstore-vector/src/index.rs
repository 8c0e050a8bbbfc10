//! Vector index trait and types.
//!
//! Both index kinds store vectors at dense positions `0..len` and answer
//! k-nearest-neighbor queries by squared L2 distance.

use std::cmp::Ordering;
use std::path::Path;

use ordered_float::OrderedFloat;
use ragstore_embeddings::Embedding;
use ragstore_types::IndexKind;

use crate::error::VectorError;

/// One nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Vector position in the index
    pub position: u64,
    /// Squared L2 distance to the query (lower = closer)
    pub distance: f32,
}

impl Neighbor {
    pub fn new(position: u64, distance: f32) -> Self {
        Self { position, distance }
    }

    /// Ascending distance, ties broken by ascending position.
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        OrderedFloat(self.distance)
            .cmp(&OrderedFloat(other.distance))
            .then(self.position.cmp(&other.position))
    }
}

/// Index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Kind of the loaded generation, if any
    pub kind: Option<IndexKind>,
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Index file size in bytes
    pub size_bytes: u64,
    /// Whether index is available for search
    pub available: bool,
}

/// Trait for vector indexes.
///
/// Mutation is append-only: vectors are never edited or removed in place.
pub trait VectorIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors at positions `len()..len() + vectors.len()`.
    ///
    /// All dimensions are checked before anything is inserted.
    fn append(&mut self, vectors: &[Embedding]) -> Result<(), VectorError>;

    /// Search for k nearest neighbors, closest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError>;

    /// Stored vector at `position`.
    fn vector(&self, position: u64) -> Result<Option<Embedding>, VectorError>;

    /// Serialize the index to `path`.
    fn save(&self, path: &Path) -> Result<(), VectorError>;
}

/// Reject a batch if any vector's dimension differs from `expected`.
pub(crate) fn check_dimensions(expected: usize, vectors: &[Embedding]) -> Result<(), VectorError> {
    match vectors.iter().find(|v| v.dimension() != expected) {
        Some(bad) => Err(VectorError::DimensionMismatch {
            expected,
            actual: bad.dimension(),
        }),
        None => Ok(()),
    }
}
