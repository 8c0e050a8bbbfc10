//! Document table and position map.
//!
//! Maps stable document ids to `DocumentRecord`s and keeps the ordered
//! position -> id map that aligns records with index vectors. Both are
//! extended together by `append` and persisted together in one versioned
//! JSON file.

use std::collections::HashMap;
use std::path::Path;

use ragstore_types::{Document, DocumentRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::VectorError;

/// Current on-disk format version of the document table
pub const DOCSTORE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocstoreFileRef<'a> {
    format_version: u32,
    documents: Vec<&'a DocumentRecord>,
    positions: &'a [String],
}

#[derive(Deserialize)]
struct DocstoreFile {
    format_version: u32,
    documents: Vec<DocumentRecord>,
    positions: Vec<String>,
}

/// Documents by id plus the position map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentTable {
    records: HashMap<String, DocumentRecord>,
    positions: Vec<String>,
}

impl DocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position the next appended document will occupy.
    pub fn next_position(&self) -> u64 {
        self.positions.len() as u64
    }

    /// Assign ids to `documents` at the next positions and record them.
    ///
    /// Returns the new ids in order. Fails without modifying the table if
    /// any new id is already taken.
    pub fn append(&mut self, documents: Vec<Document>) -> Result<Vec<String>, VectorError> {
        let start = self.next_position();
        let records: Vec<DocumentRecord> = documents
            .into_iter()
            .enumerate()
            .map(|(offset, doc)| DocumentRecord::from_document(start + offset as u64, doc))
            .collect();

        if let Some(taken) = records.iter().find(|r| self.records.contains_key(&r.id)) {
            return Err(VectorError::Persistence(format!(
                "document id {} already assigned",
                taken.id
            )));
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        for record in records {
            self.positions.push(record.id.clone());
            self.records.insert(record.id.clone(), record);
        }

        debug!(start, count = ids.len(), "Appended document records");
        Ok(ids)
    }

    /// Drop positions from `len` onward, with their records.
    pub(crate) fn truncate(&mut self, len: usize) {
        for id in self.positions.drain(len.min(self.positions.len())..) {
            self.records.remove(&id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.records.get(id)
    }

    pub fn id_at(&self, position: u64) -> Option<&str> {
        self.positions.get(position as usize).map(|s| s.as_str())
    }

    pub fn record_at(&self, position: u64) -> Option<&DocumentRecord> {
        self.id_at(position).and_then(|id| self.records.get(id))
    }

    /// The position map: `positions()[i]` is the id of vector `i`.
    pub fn positions(&self) -> &[String] {
        &self.positions
    }

    /// Records in position order.
    pub fn records(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.positions.iter().filter_map(|id| self.records.get(id))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, VectorError> {
        let file = DocstoreFileRef {
            format_version: DOCSTORE_FORMAT_VERSION,
            documents: self.records().collect(),
            positions: &self.positions,
        };
        serde_json::to_vec(&file).map_err(|e| VectorError::Serialization(e.to_string()))
    }

    /// Parse and validate a persisted table.
    pub fn from_json(bytes: &[u8]) -> Result<Self, VectorError> {
        let file: DocstoreFile = serde_json::from_slice(bytes)
            .map_err(|e| VectorError::Persistence(format!("corrupt document table: {}", e)))?;

        if file.format_version != DOCSTORE_FORMAT_VERSION {
            return Err(VectorError::Persistence(format!(
                "unsupported document table version {}",
                file.format_version
            )));
        }

        let mut records = HashMap::with_capacity(file.documents.len());
        for record in file.documents {
            let id = record.id.clone();
            if records.insert(id.clone(), record).is_some() {
                return Err(VectorError::Persistence(format!(
                    "duplicate document id {} in document table",
                    id
                )));
            }
        }

        if records.len() != file.positions.len() {
            return Err(VectorError::Persistence(format!(
                "document table holds {} records but {} positions",
                records.len(),
                file.positions.len()
            )));
        }
        // Equal sizes plus every position resolving means the map is a bijection
        let mut seen = std::collections::HashSet::with_capacity(file.positions.len());
        for id in &file.positions {
            if !records.contains_key(id) || !seen.insert(id.as_str()) {
                return Err(VectorError::Persistence(format!(
                    "position map entry {} does not match a unique record",
                    id
                )));
            }
        }

        Ok(Self {
            records,
            positions: file.positions,
        })
    }

    pub fn load(path: &Path) -> Result<Self, VectorError> {
        let bytes = std::fs::read(path).map_err(|e| {
            VectorError::Persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&bytes)
    }
}
