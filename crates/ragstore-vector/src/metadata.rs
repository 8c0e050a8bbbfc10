//! Index metadata (`metadata.json`).
//!
//! Written with every generation and read first on load, so the right
//! index kind and search-time parameters are restored before the binary
//! index is opened.

use std::path::Path;

use chrono::{DateTime, Utc};
use ragstore_types::IndexKind;
use serde::{Deserialize, Serialize};

use crate::error::VectorError;
use crate::hnsw::HnswParams;

/// Generation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// "hnsw" or "flat"
    pub index_type: IndexKind,
    /// Embedding dimension every vector must have
    pub dimension: usize,
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<usize>,
}

impl IndexMetadata {
    /// Metadata for a fresh generation. Graph parameters are recorded only
    /// for HNSW.
    pub fn new(kind: IndexKind, dimension: usize, document_count: usize, hnsw: &HnswParams) -> Self {
        let graph = kind == IndexKind::Hnsw;
        Self {
            index_type: kind,
            dimension,
            document_count,
            created_at: Utc::now(),
            ef_construction: graph.then_some(hnsw.ef_construction),
            ef_search: graph.then_some(hnsw.ef_search),
            m: graph.then_some(hnsw.m),
        }
    }

    /// Graph parameters recorded at build time, each falling back to
    /// `defaults` when absent.
    pub fn hnsw_params(&self, defaults: &HnswParams) -> HnswParams {
        HnswParams {
            m: self.m.unwrap_or(defaults.m),
            ef_construction: self.ef_construction.unwrap_or(defaults.ef_construction),
            ef_search: self.ef_search.unwrap_or(defaults.ef_search),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, VectorError> {
        serde_json::to_vec_pretty(self).map_err(|e| VectorError::Serialization(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, VectorError> {
        let bytes = std::fs::read(path).map_err(|e| {
            VectorError::Persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VectorError::Persistence(format!("corrupt {}: {}", path.display(), e)))
    }
}
