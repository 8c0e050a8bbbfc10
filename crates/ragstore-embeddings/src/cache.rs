//! On-disk embedding cache.
//!
//! Content-addressed: each entry lives in `<cache dir>/<hex sha256 of text>`
//! as JSON `{embedding, timestamp, text_hash}`. Entries older than the TTL
//! are ignored at read time but left on disk until overwritten or cleared.
//!
//! Every failure on the read path is a miss and every failure on the write
//! path is logged and dropped. The cache is an optimization only.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ragstore_types::CacheSettings;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::EmbeddingError;
use crate::model::Embedding;

/// Subdirectory of an index directory holding cache entries
pub const CACHE_DIR_NAME: &str = "embedding_cache";

/// Entry lifetime
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fingerprint of a text: lowercase hex SHA-256 of its UTF-8 bytes.
pub fn fingerprint(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one file per entry
    pub dir: PathBuf,
    /// Entries at least this old are treated as misses
    pub ttl: Duration,
}

impl CacheConfig {
    /// Cache stored inside an index directory, default TTL.
    pub fn for_index_dir(index_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: index_dir.as_ref().join(CACHE_DIR_NAME),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn from_settings(settings: &CacheSettings, index_dir: impl AsRef<Path>) -> Self {
        Self::for_index_dir(index_dir).with_ttl(Duration::from_secs(settings.ttl_secs))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Persisted cache record
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    embedding: Vec<f32>,
    /// Unix seconds at write time
    timestamp: f64,
    text_hash: String,
}

/// Content-addressed embedding cache.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    config: CacheConfig,
}

impl EmbeddingCache {
    /// Open the cache. The directory is created lazily on first write.
    pub fn open(config: CacheConfig) -> Self {
        debug!(path = ?config.dir, ttl_secs = config.ttl.as_secs(), "Opened embedding cache");
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.config.dir.join(key)
    }

    /// Look up a non-expired embedding for `text`.
    pub fn get(&self, text: &str) -> Option<Embedding> {
        self.get_at(text, Utc::now())
    }

    fn get_at(&self, text: &str, now: DateTime<Utc>) -> Option<Embedding> {
        let key = fingerprint(text);
        let path = self.entry_path(&key);

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };

        let record: CacheRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                debug!(path = ?path, error = %e, "Unreadable cache entry, treating as miss");
                return None;
            }
        };

        if record.text_hash != key {
            debug!(path = ?path, "Cache entry hash mismatch, treating as miss");
            return None;
        }

        let age_secs = unix_seconds(now) - record.timestamp;
        if age_secs >= self.config.ttl.as_secs_f64() {
            debug!(key = %key, age_secs, "Cache entry expired");
            return None;
        }

        Some(Embedding::new(record.embedding))
    }

    /// Store an embedding for `text`, replacing any existing entry.
    ///
    /// Never fails: write errors are logged at warn level and dropped.
    pub fn put(&self, text: &str, embedding: &Embedding) {
        if let Err(e) = self.put_at(text, embedding, Utc::now()) {
            warn!(dir = ?self.config.dir, error = %e, "Failed to write embedding cache entry");
        }
    }

    fn put_at(
        &self,
        text: &str,
        embedding: &Embedding,
        now: DateTime<Utc>,
    ) -> Result<(), EmbeddingError> {
        let key = fingerprint(text);
        let record = CacheRecord {
            embedding: embedding.values.clone(),
            timestamp: unix_seconds(now),
            text_hash: key.clone(),
        };
        let bytes =
            serde_json::to_vec(&record).map_err(|e| EmbeddingError::Serialization(e.to_string()))?;

        std::fs::create_dir_all(&self.config.dir)?;

        // Write-then-rename: concurrent writers of the same key each rename a
        // complete file, last one wins.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.config.dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(self.entry_path(&key))
            .map_err(|e| EmbeddingError::Io(e.error))?;

        debug!(key = %key, dim = embedding.dimension(), "Cached embedding");
        Ok(())
    }

    /// Number of entries on disk, expired ones included.
    pub fn len(&self) -> usize {
        self.entry_paths().map(|paths| paths.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every entry. Returns the number removed.
    pub fn clear(&self) -> Result<usize, EmbeddingError> {
        let paths = self.entry_paths()?;
        let mut removed = 0;
        for path in paths {
            std::fs::remove_file(&path)
                .map_err(|e| EmbeddingError::Cache(format!("{}: {}", path.display(), e)))?;
            removed += 1;
        }
        info!(dir = ?self.config.dir, removed, "Cleared embedding cache");
        Ok(removed)
    }

    fn entry_paths(&self) -> Result<Vec<PathBuf>, EmbeddingError> {
        let entries = match std::fs::read_dir(&self.config.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EmbeddingError::Cache(e.to_string())),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EmbeddingError::Cache(e.to_string()))?;
            let name = entry.file_name();
            if name.to_str().is_some_and(is_fingerprint) {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

fn is_fingerprint(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
