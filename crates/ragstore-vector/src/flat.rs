//! Exact brute-force index.
//!
//! Vectors are kept row-major in one contiguous buffer and every query
//! scans all of them. On disk:
//!
//! ```text
//! magic "RSFLAT" | version u16 | dimension u32 | count u64 | count*dimension f32
//! ```
//!
//! All integers and floats little-endian.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ragstore_embeddings::Embedding;
use ragstore_types::IndexKind;
use tracing::{debug, info};

use crate::error::VectorError;
use crate::index::{check_dimensions, Neighbor, VectorIndex};

const MAGIC: &[u8; 6] = b"RSFLAT";
const FORMAT_VERSION: u16 = 1;

/// Exact L2 index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Load a serialized flat index.
    pub fn load(path: &Path) -> Result<Self, VectorError> {
        let file = File::open(path).map_err(|e| {
            VectorError::Persistence(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 6];
        read_exact(&mut reader, &mut magic, path)?;
        if &magic != MAGIC {
            return Err(VectorError::Persistence(format!(
                "{} is not a flat index file",
                path.display()
            )));
        }

        let mut version = [0u8; 2];
        read_exact(&mut reader, &mut version, path)?;
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(VectorError::Persistence(format!(
                "unsupported flat index version {} in {}",
                version,
                path.display()
            )));
        }

        let mut dimension = [0u8; 4];
        read_exact(&mut reader, &mut dimension, path)?;
        let dimension = u32::from_le_bytes(dimension) as usize;

        let mut count = [0u8; 8];
        read_exact(&mut reader, &mut count, path)?;
        let count = u64::from_le_bytes(count);

        let expected_bytes = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(dimension))
            .and_then(|floats| floats.checked_mul(4))
            .ok_or_else(|| {
                VectorError::Persistence(format!("corrupt header in {}", path.display()))
            })?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != expected_bytes {
            return Err(VectorError::Persistence(format!(
                "{} holds {} data bytes, header promises {}",
                path.display(),
                bytes.len(),
                expected_bytes
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        info!(path = ?path, vectors = count, dim = dimension, "Loaded flat index");
        Ok(Self { dimension, data })
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8], path: &Path) -> Result<(), VectorError> {
    reader.read_exact(buf).map_err(|e| {
        VectorError::Persistence(format!("truncated flat index {}: {}", path.display(), e))
    })
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn append(&mut self, vectors: &[Embedding]) -> Result<(), VectorError> {
        check_dimensions(self.dimension, vectors)?;
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(&vector.values);
        }
        debug!(count = vectors.len(), total = self.len(), "Appended vectors");
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        if query.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = (0..self.len())
            .map(|position| {
                let distance = self
                    .row(position)
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                Neighbor::new(position as u64, distance)
            })
            .collect();

        neighbors.sort_by(Neighbor::cmp_by_distance);
        neighbors.truncate(k);
        Ok(neighbors)
    }

    fn vector(&self, position: u64) -> Result<Option<Embedding>, VectorError> {
        let position = position as usize;
        if position >= self.len() {
            return Ok(None);
        }
        Ok(Some(Embedding::new(self.row(position).to_vec())))
    }

    fn save(&self, path: &Path) -> Result<(), VectorError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;

        info!(path = ?path, vectors = self.len(), "Saved flat index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index_with(vectors: &[[f32; 2]]) -> FlatIndex {
        let mut index = FlatIndex::new(2);
        let embeddings: Vec<Embedding> = vectors.iter().map(|v| Embedding::new(v.to_vec())).collect();
        index.append(&embeddings).unwrap();
        index
    }

    #[test]
    fn test_exact_order() {
        let index = index_with(&[[0.0, 0.0], [5.0, 5.0], [1.0, 0.0], [2.0, 2.0]]);
        let results = index.search(&[0.9, 0.0], 4).unwrap();
        let positions: Vec<u64> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![2, 0, 3, 1]);
        assert!((results[0].distance - 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_with(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
        let results = index.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<u64> = results.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_len() {
        let index = index_with(&[[1.0, 0.0]]);
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 1);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_vector_lookup() {
        let index = index_with(&[[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(
            index.vector(1).unwrap(),
            Some(Embedding::new(vec![3.0, 4.0]))
        );
        assert_eq!(index.vector(2).unwrap(), None);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.flat");
        let index = index_with(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.data, index.data);
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.flat");
        index_with(&[[1.0, 2.0], [3.0, 4.0]]).save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(matches!(
            FlatIndex::load(&path),
            Err(VectorError::Persistence(_))
        ));

        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            FlatIndex::load(&path),
            Err(VectorError::Persistence(_))
        ));
    }

    #[test]
    fn test_load_rejects_oversized_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.flat");

        // count * dimension fits in usize, the byte length does not
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(1u64 << 62).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        std::fs::write(&path, &bytes).unwrap();

        let err = FlatIndex::load(&path).unwrap_err();
        assert!(matches!(err, VectorError::Persistence(_)));
        assert!(err.to_string().contains("corrupt header"));
    }

    #[test]
    fn test_dimension_mismatch_inserts_nothing() {
        let mut index = FlatIndex::new(3);
        let result = index.append(&[Embedding::new(vec![1.0; 3]), Embedding::new(vec![1.0; 4])]);
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
        assert!(index.is_empty());
    }
}
