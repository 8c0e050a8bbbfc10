//! Configuration loading for ragstore.
//!
//! Layered config: defaults -> default config file -> explicit config file
//! -> environment variables. The resulting `Settings` value is converted
//! into per-component config structs and passed to constructors; nothing
//! reads settings from global state.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Which index structure backs a generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Graph-based approximate index (HNSW)
    #[default]
    Hnsw,
    /// Exact brute-force L2 scan
    Flat,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Hnsw => "hnsw",
            IndexKind::Flat => "flat",
        }
    }
}

/// HNSW graph parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HnswSettings {
    /// Connections per node
    #[serde(default = "default_m")]
    pub m: usize,

    /// Build-time candidate list size
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Search-time candidate list size (accuracy/speed knob)
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

fn default_m() -> usize {
    16
}

fn default_ef_construction() -> usize {
    200
}

fn default_ef_search() -> usize {
    100
}

impl Default for HnswSettings {
    fn default() -> Self {
        Self {
            m: default_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
        }
    }
}

/// Embedding cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheSettings {
    /// When false every embedding request goes to the provider.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime in seconds (24 hours)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Retrieval defaults used when building a retriever from settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalSettings {
    /// Number of documents returned per query
    #[serde(default = "default_k")]
    pub k: usize,

    /// MMR trade-off: 1.0 = pure relevance, 0.0 = pure diversity
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

fn default_k() -> usize {
    4
}

fn default_mmr_lambda() -> f32 {
    0.5
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: default_k(),
            mmr_lambda: default_mmr_lambda(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Index directory holding one persisted generation
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// Index structure used by `build`
    #[serde(default)]
    pub index_kind: IndexKind,

    #[serde(default)]
    pub hnsw: HnswSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_index_dir() -> String {
    ProjectDirs::from("", "", "ragstore")
        .map(|p| p.data_local_dir().join("vector-index"))
        .unwrap_or_else(|| PathBuf::from("./vector-index"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            index_kind: IndexKind::default(),
            hnsw: HnswSettings::default(),
            cache: CacheSettings::default(),
            retrieval: RetrievalSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/ragstore/config.toml)
    /// 3. Explicit config file (optional, must exist when given)
    /// 4. Environment variables (RAGSTORE_*, nested keys split on `__`)
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "ragstore")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("index_dir", default_index_dir())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("index_kind", IndexKind::default().as_str())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Format: RAGSTORE_INDEX_DIR, RAGSTORE_HNSW__EF_SEARCH, RAGSTORE_CACHE__ENABLED, ...
        builder = builder.add_source(
            Environment::with_prefix("RAGSTORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool, &str); 6] = [
            ("hnsw.m", self.hnsw.m > 0, "must be > 0"),
            (
                "hnsw.ef_construction",
                self.hnsw.ef_construction > 0,
                "must be > 0",
            ),
            ("hnsw.ef_search", self.hnsw.ef_search > 0, "must be > 0"),
            ("cache.ttl_secs", self.cache.ttl_secs > 0, "must be > 0"),
            ("retrieval.k", self.retrieval.k > 0, "must be > 0"),
            (
                "retrieval.mmr_lambda",
                (0.0..=1.0).contains(&self.retrieval.mmr_lambda),
                "must be within 0.0-1.0",
            ),
        ];

        for (field, ok, reason) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field,
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Index directory with a leading `~/` expanded.
    pub fn expanded_index_dir(&self) -> PathBuf {
        if let Some(rest) = self.index_dir.strip_prefix("~/") {
            if let Some(dirs) = directories::BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.index_dir)
    }
}
