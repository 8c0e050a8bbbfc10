//! On-disk layout and backup protocol for an index directory.
//!
//! ```text
//! <dir>/index.usearch | index.flat   index binary
//! <dir>/docstore.json                document table + position map
//! <dir>/metadata.json                IndexMetadata
//! <dir>/embedding_cache/             embedding cache entries
//! <dir>_backup_<unix seconds>/       full copies taken before overwrite/clear
//! ```
//!
//! Every artifact is written to a temporary sibling and renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ragstore_types::IndexKind;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::VectorError;
use crate::index::VectorIndex;

pub const HNSW_INDEX_FILE: &str = "index.usearch";
pub const FLAT_INDEX_FILE: &str = "index.flat";
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const METADATA_FILE: &str = "metadata.json";

const BACKUP_MARKER: &str = "_backup_";

/// Paths and file operations for one index directory.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    dir: PathBuf,
}

impl IndexLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_file(&self, kind: IndexKind) -> PathBuf {
        match kind {
            IndexKind::Hnsw => self.dir.join(HNSW_INDEX_FILE),
            IndexKind::Flat => self.dir.join(FLAT_INDEX_FILE),
        }
    }

    pub fn docstore_file(&self) -> PathBuf {
        self.dir.join(DOCSTORE_FILE)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Kind of the index binary present on disk, if any.
    pub fn existing_index(&self) -> Option<IndexKind> {
        [IndexKind::Hnsw, IndexKind::Flat]
            .into_iter()
            .find(|kind| self.index_file(*kind).is_file())
    }

    /// Whether a loadable generation (index binary + document table) exists.
    pub fn has_generation(&self) -> bool {
        self.existing_index().is_some() && self.docstore_file().is_file()
    }

    /// Write `bytes` to `<dir>/<name>` via a temp file and rename.
    pub fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), VectorError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(name))
            .map_err(|e| VectorError::Io(e.error))?;
        Ok(())
    }

    /// Serialize `index` to its kind's file via a partial file and rename.
    pub fn write_index(&self, index: &dyn VectorIndex) -> Result<PathBuf, VectorError> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.index_file(index.kind());
        let partial = self.dir.join(format!(
            ".{}.partial",
            target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("index")
        ));

        if let Err(e) = index.save(&partial) {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }
        std::fs::rename(&partial, &target)?;
        Ok(target)
    }

    /// Remove the index binary of every kind except `keep`.
    pub fn remove_stale_index(&self, keep: IndexKind) -> Result<(), VectorError> {
        for kind in [IndexKind::Hnsw, IndexKind::Flat] {
            if kind != keep {
                remove_if_exists(&self.index_file(kind))?;
            }
        }
        Ok(())
    }

    /// Delete the generation's artifacts. The embedding cache is kept.
    pub fn remove_generation(&self) -> Result<(), VectorError> {
        remove_if_exists(&self.index_file(IndexKind::Hnsw))?;
        remove_if_exists(&self.index_file(IndexKind::Flat))?;
        remove_if_exists(&self.docstore_file())?;
        remove_if_exists(&self.metadata_file())?;
        debug!(dir = ?self.dir, "Removed generation artifacts");
        Ok(())
    }

    fn backup_prefix(&self) -> Result<(PathBuf, String), VectorError> {
        let name = self
            .dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                VectorError::Persistence(format!(
                    "index directory {} has no usable name",
                    self.dir.display()
                ))
            })?;
        let parent = self
            .dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok((parent.to_path_buf(), format!("{}{}", name, BACKUP_MARKER)))
    }

    /// Copy the whole directory to `<dir>_backup_<unix seconds>` if a
    /// generation exists. Returns the backup path.
    ///
    /// A `_<n>` suffix is added when a backup with the same timestamp
    /// already exists.
    pub fn backup(&self) -> Result<Option<PathBuf>, VectorError> {
        if !self.has_generation() {
            return Ok(None);
        }

        let (parent, prefix) = self.backup_prefix()?;
        let stamp = Utc::now().timestamp();
        let mut target = parent.join(format!("{}{}", prefix, stamp));
        let mut attempt = 1;
        while target.exists() {
            target = parent.join(format!("{}{}_{}", prefix, stamp, attempt));
            attempt += 1;
        }

        copy_dir(&self.dir, &target)?;
        info!(from = ?self.dir, to = ?target, "Backed up index generation");
        Ok(Some(target))
    }

    /// Existing backups of this directory, oldest first.
    pub fn backups(&self) -> Result<Vec<PathBuf>, VectorError> {
        let (parent, prefix) = self.backup_prefix()?;
        let entries = match std::fs::read_dir(&parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<((i64, u32), PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(suffix) = name.to_str().and_then(|n| n.strip_prefix(prefix.as_str())) else {
                continue;
            };
            if let Some(order) = parse_backup_suffix(suffix) {
                found.push((order, entry.path()));
            }
        }

        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }
}

/// "<secs>" or "<secs>_<n>" -> (secs, n)
fn parse_backup_suffix(suffix: &str) -> Option<(i64, u32)> {
    match suffix.split_once('_') {
        Some((secs, n)) => Some((secs.parse().ok()?, n.parse().ok()?)),
        None => Some((suffix.parse().ok()?, 0)),
    }
}

fn remove_if_exists(path: &Path) -> Result<(), VectorError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), VectorError> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| VectorError::Persistence(format!("backup walk failed: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| VectorError::Persistence(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
        } else {
            warn!(path = ?entry.path(), "Skipping non-regular file during backup");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::FlatIndex;
    use ragstore_embeddings::Embedding;
    use tempfile::TempDir;

    fn seed_generation(layout: &IndexLayout) {
        let mut index = FlatIndex::new(2);
        index.append(&[Embedding::new(vec![1.0, 2.0])]).unwrap();
        layout.write_index(&index).unwrap();
        layout.write_atomic(DOCSTORE_FILE, b"{}").unwrap();
        layout.write_atomic(METADATA_FILE, b"{}").unwrap();
    }

    #[test]
    fn test_has_generation_requires_index_and_docstore() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path().join("idx"));
        assert!(!layout.has_generation());

        layout.write_atomic(DOCSTORE_FILE, b"{}").unwrap();
        assert!(!layout.has_generation());

        seed_generation(&layout);
        assert!(layout.has_generation());
        assert_eq!(layout.existing_index(), Some(IndexKind::Flat));
    }

    #[test]
    fn test_backup_copies_everything() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path().join("idx"));
        seed_generation(&layout);
        std::fs::create_dir_all(layout.dir().join("embedding_cache")).unwrap();
        std::fs::write(layout.dir().join("embedding_cache").join("abc"), b"x").unwrap();

        let backup = layout.backup().unwrap().unwrap();
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("idx_backup_"));
        assert_eq!(backup.parent(), Some(temp.path()));
        assert!(backup.join(FLAT_INDEX_FILE).is_file());
        assert!(backup.join(DOCSTORE_FILE).is_file());
        assert!(backup.join(METADATA_FILE).is_file());
        assert!(backup.join("embedding_cache").join("abc").is_file());
    }

    #[test]
    fn test_backup_without_generation_is_noop() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path().join("idx"));
        assert!(layout.backup().unwrap().is_none());
        assert!(layout.backups().unwrap().is_empty());
    }

    #[test]
    fn test_same_second_backups_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path().join("idx"));
        seed_generation(&layout);

        let first = layout.backup().unwrap().unwrap();
        let second = layout.backup().unwrap().unwrap();
        let third = layout.backup().unwrap().unwrap();
        assert_ne!(first, second);
        assert_ne!(second, third);

        let listed = layout.backups().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed.last(), Some(&third));
    }

    #[test]
    fn test_remove_generation_keeps_cache() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path().join("idx"));
        seed_generation(&layout);
        std::fs::create_dir_all(layout.dir().join("embedding_cache")).unwrap();

        layout.remove_generation().unwrap();
        assert!(!layout.has_generation());
        assert!(!layout.metadata_file().exists());
        assert!(layout.dir().join("embedding_cache").is_dir());

        // Idempotent
        layout.remove_generation().unwrap();
    }

    #[test]
    fn test_write_index_leaves_no_partial() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path().join("idx"));
        seed_generation(&layout);

        let names: Vec<String> = std::fs::read_dir(layout.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".partial")));
    }

    #[test]
    fn test_parse_backup_suffix() {
        assert_eq!(parse_backup_suffix("1700000000"), Some((1_700_000_000, 0)));
        assert_eq!(parse_backup_suffix("1700000000_2"), Some((1_700_000_000, 2)));
        assert_eq!(parse_backup_suffix("nope"), None);
    }
}
