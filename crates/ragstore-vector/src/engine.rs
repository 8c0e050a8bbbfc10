//! Vector index engine.
//!
//! Owns one generation (index, document table, metadata) for an index
//! directory and moves it through `Empty -> Built -> Saved/Modified ->
//! Reloaded`. Every write of a generation is preceded by a backup of the
//! one already on disk.

use std::path::PathBuf;
use std::sync::Arc;

use ragstore_embeddings::{Embedder, Embedding};
use ragstore_types::{Document, DocumentRecord, IndexKind, Settings};
use tracing::{debug, error, info, warn};

use crate::docstore::DocumentTable;
use crate::error::VectorError;
use crate::flat::FlatIndex;
use crate::hnsw::{HnswIndex, HnswParams};
use crate::index::{IndexStats, VectorIndex};
use crate::layout::{IndexLayout, DOCSTORE_FILE, METADATA_FILE};
use crate::metadata::IndexMetadata;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the persisted generation
    pub index_dir: PathBuf,
    /// Index kind used by `build`. On load the persisted kind wins.
    pub index_kind: IndexKind,
    /// Graph parameters for HNSW builds
    pub hnsw: HnswParams,
}

impl EngineConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            index_kind: IndexKind::default(),
            hnsw: HnswParams::default(),
        }
    }

    pub fn with_kind(mut self, kind: IndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    pub fn with_hnsw(mut self, params: HnswParams) -> Self {
        self.hnsw = params;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            index_dir: settings.expanded_index_dir(),
            index_kind: settings.index_kind,
            hnsw: HnswParams::from(&settings.hnsw),
        }
    }
}

/// Lifecycle state of the in-memory generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing built or loaded
    Empty,
    /// Freshly built (and persisted)
    Built,
    /// In-memory generation matches disk after an explicit save
    Saved,
    /// Appended vectors not yet persisted
    Modified,
    /// Loaded from disk
    Reloaded,
}

/// What `build` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A new generation was built and persisted
    Built { document_count: usize },
    /// A generation already existed and was loaded instead
    Loaded { document_count: usize },
}

impl BuildOutcome {
    pub fn document_count(&self) -> usize {
        match self {
            BuildOutcome::Built { document_count } | BuildOutcome::Loaded { document_count } => {
                *document_count
            }
        }
    }
}

/// A document returned by a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub record: DocumentRecord,
    /// Squared L2 distance to the query (lower = closer)
    pub distance: f32,
    /// Vector position in the index
    pub position: u64,
}

struct Generation {
    index: Box<dyn VectorIndex>,
    table: DocumentTable,
    metadata: IndexMetadata,
}

/// Builds, extends, persists and queries one index directory.
///
/// Not internally synchronized: mutations take `&mut self`, so sharing
/// across threads needs an outer lock.
pub struct VectorEngine {
    config: EngineConfig,
    layout: IndexLayout,
    embedder: Arc<dyn Embedder>,
    generation: Option<Generation>,
    state: EngineState,
}

impl VectorEngine {
    pub fn new(config: EngineConfig, embedder: Arc<dyn Embedder>) -> Self {
        let layout = IndexLayout::new(config.index_dir.clone());
        Self {
            config,
            layout,
            embedder,
            generation: None,
            state: EngineState::Empty,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Whether a generation is held in memory.
    pub fn is_loaded(&self) -> bool {
        self.generation.is_some()
    }

    pub fn metadata(&self) -> Option<&IndexMetadata> {
        self.generation.as_ref().map(|g| &g.metadata)
    }

    pub fn table(&self) -> Option<&DocumentTable> {
        self.generation.as_ref().map(|g| &g.table)
    }

    /// Build and persist a generation from `documents` and their embeddings.
    ///
    /// If a generation already exists on disk and `force_rebuild` is false,
    /// it is loaded instead and nothing is written.
    pub fn build(
        &mut self,
        documents: Vec<Document>,
        embeddings: Vec<Embedding>,
        force_rebuild: bool,
    ) -> Result<BuildOutcome, VectorError> {
        if !force_rebuild && self.layout.has_generation() {
            info!(dir = ?self.layout.dir(), "Index exists, loading instead of rebuilding");
            self.load()?;
            return Ok(BuildOutcome::Loaded {
                document_count: self.table().map(|t| t.len()).unwrap_or(0),
            });
        }

        if documents.is_empty() || embeddings.is_empty() {
            return Err(VectorError::InvalidInput(
                "cannot build an index from no documents".to_string(),
            ));
        }
        if documents.len() != embeddings.len() {
            return Err(VectorError::InvalidInput(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        let dimension = embeddings[0].dimension();
        if dimension == 0 {
            return Err(VectorError::InvalidInput(
                "embeddings have zero dimension".to_string(),
            ));
        }

        let kind = self.config.index_kind;
        let mut index: Box<dyn VectorIndex> = match kind {
            IndexKind::Hnsw => Box::new(HnswIndex::new(
                dimension,
                self.config.hnsw,
                embeddings.len(),
            )?),
            IndexKind::Flat => Box::new(FlatIndex::new(dimension)),
        };
        index.append(&embeddings)?;

        let mut table = DocumentTable::new();
        table.append(documents)?;

        let metadata = IndexMetadata::new(kind, dimension, table.len(), &self.config.hnsw);
        let generation = Generation {
            index,
            table,
            metadata,
        };

        persist(&self.layout, &generation)?;

        let document_count = generation.table.len();
        self.generation = Some(generation);
        self.state = EngineState::Built;

        info!(
            kind = kind.as_str(),
            dim = dimension,
            documents = document_count,
            "Built index"
        );
        Ok(BuildOutcome::Built { document_count })
    }

    /// Embed document contents with the wired embedder and build.
    pub fn build_documents(
        &mut self,
        documents: Vec<Document>,
        force_rebuild: bool,
    ) -> Result<BuildOutcome, VectorError> {
        if !force_rebuild && self.layout.has_generation() {
            return self.build(Vec::new(), Vec::new(), false);
        }
        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        self.build(documents, embeddings, force_rebuild)
    }

    /// Append documents at the next positions and persist.
    ///
    /// Loads the persisted generation first if none is in memory. Returns
    /// the new document ids.
    ///
    /// If persisting fails the error is returned, but the appended documents
    /// stay in memory (state `Modified`) until the next successful `save`.
    pub fn add(
        &mut self,
        documents: Vec<Document>,
        embeddings: Vec<Embedding>,
    ) -> Result<Vec<String>, VectorError> {
        if documents.len() != embeddings.len() {
            return Err(VectorError::InvalidInput(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        if !self.ensure_loaded()? {
            return Err(VectorError::NotInitialized);
        }

        let generation = self.generation.as_mut().ok_or(VectorError::NotInitialized)?;
        let expected = generation.metadata.dimension;
        if let Some(bad) = embeddings.iter().find(|e| e.dimension() != expected) {
            return Err(VectorError::DimensionMismatch {
                expected,
                actual: bad.dimension(),
            });
        }

        let before = generation.table.len();
        let ids = generation.table.append(documents)?;
        if let Err(e) = generation.index.append(&embeddings) {
            generation.table.truncate(before);
            return Err(e);
        }
        generation.metadata.document_count = generation.table.len();
        self.state = EngineState::Modified;

        debug!(added = ids.len(), total = before + ids.len(), "Appended documents");
        self.save()?;
        Ok(ids)
    }

    /// Embed document contents with the wired embedder and add.
    pub fn add_documents(&mut self, documents: Vec<Document>) -> Result<Vec<String>, VectorError> {
        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        self.add(documents, embeddings)
    }

    /// Persist the in-memory generation, backing up the one on disk first.
    pub fn save(&mut self) -> Result<(), VectorError> {
        let generation = self.generation.as_ref().ok_or_else(|| {
            warn!(dir = ?self.layout.dir(), "Save requested with no index in memory");
            VectorError::NotInitialized
        })?;

        persist(&self.layout, generation)?;
        self.state = EngineState::Saved;
        Ok(())
    }

    /// Load the persisted generation, replacing anything in memory.
    pub fn load(&mut self) -> Result<(), VectorError> {
        let dir = self.layout.dir();
        let kind = self.layout.existing_index().ok_or_else(|| {
            VectorError::Persistence(format!("no index binary in {}", dir.display()))
        })?;
        let docstore = self.layout.docstore_file();
        if !docstore.is_file() {
            return Err(VectorError::Persistence(format!(
                "no document table in {}",
                dir.display()
            )));
        }

        let metadata = IndexMetadata::load(&self.layout.metadata_file())?;
        if metadata.index_type != kind {
            return Err(VectorError::Persistence(format!(
                "metadata says {} but {} holds a {} index",
                metadata.index_type.as_str(),
                dir.display(),
                kind.as_str()
            )));
        }
        if kind != self.config.index_kind {
            info!(
                persisted = kind.as_str(),
                configured = self.config.index_kind.as_str(),
                "Using persisted index kind"
            );
        }

        let path = self.layout.index_file(kind);
        let index: Box<dyn VectorIndex> = match kind {
            IndexKind::Hnsw => {
                let params = metadata.hnsw_params(&self.config.hnsw);
                if params.ef_construction != self.config.hnsw.ef_construction {
                    debug!(
                        persisted = params.ef_construction,
                        configured = self.config.hnsw.ef_construction,
                        "ef_construction differs from configuration, keeping persisted graph"
                    );
                }
                Box::new(HnswIndex::load(&path, metadata.dimension, params)?)
            }
            IndexKind::Flat => {
                let index = FlatIndex::load(&path)?;
                if index.dimension() != metadata.dimension {
                    return Err(VectorError::Persistence(format!(
                        "index file {} has dimension {}, metadata says {}",
                        path.display(),
                        index.dimension(),
                        metadata.dimension
                    )));
                }
                Box::new(index)
            }
        };

        let table = DocumentTable::load(&docstore)?;
        if index.len() != table.len() || table.len() != metadata.document_count {
            return Err(VectorError::Persistence(format!(
                "corrupt generation in {}: {} vectors, {} documents, metadata count {}",
                dir.display(),
                index.len(),
                table.len(),
                metadata.document_count
            )));
        }

        info!(
            dir = ?dir,
            kind = kind.as_str(),
            documents = table.len(),
            "Loaded index"
        );
        self.generation = Some(Generation {
            index,
            table,
            metadata,
        });
        self.state = EngineState::Reloaded;
        Ok(())
    }

    /// Make sure a generation is in memory, loading it if one is on disk.
    ///
    /// `Ok(false)` means there is simply no index yet. Corrupt or unreadable
    /// artifacts are errors.
    pub fn ensure_loaded(&mut self) -> Result<bool, VectorError> {
        if self.generation.is_some() {
            return Ok(true);
        }
        if self.layout.existing_index().is_none() {
            return Ok(false);
        }
        self.load()?;
        Ok(true)
    }

    /// Back up and delete the persisted generation, resetting to `Empty`.
    ///
    /// The embedding cache is left in place. Returns the backup path, if a
    /// generation existed.
    pub fn clear(&mut self) -> Result<Option<PathBuf>, VectorError> {
        let backup = self.layout.backup().map_err(|e| {
            error!(dir = ?self.layout.dir(), error = %e, "Backup before clear failed");
            e
        })?;
        self.layout.remove_generation()?;
        self.generation = None;
        self.state = EngineState::Empty;

        info!(dir = ?self.layout.dir(), backup = ?backup, "Cleared index");
        Ok(backup)
    }

    /// The `k` nearest documents to `query`, closest first.
    pub fn search_by_vector(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, VectorError> {
        Ok(self
            .search_with_vectors(query, k)?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    /// Like `search_by_vector`, also returning each hit's stored vector.
    pub fn search_with_vectors(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<Vec<(ScoredDocument, Embedding)>, VectorError> {
        let generation = self.generation.as_ref().ok_or(VectorError::NotInitialized)?;
        let expected = generation.metadata.dimension;
        if query.dimension() != expected {
            return Err(VectorError::DimensionMismatch {
                expected,
                actual: query.dimension(),
            });
        }

        let neighbors = generation.index.search(&query.values, k)?;
        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let Some(record) = generation.table.record_at(neighbor.position) else {
                warn!(position = neighbor.position, "Index position has no document");
                continue;
            };
            let vector = generation
                .index
                .vector(neighbor.position)?
                .ok_or_else(|| {
                    VectorError::Index(format!("no vector stored at {}", neighbor.position))
                })?;
            results.push((
                ScoredDocument {
                    record: record.clone(),
                    distance: neighbor.distance,
                    position: neighbor.position,
                },
                vector,
            ));
        }
        Ok(results)
    }

    /// Embed `query` with the wired embedder and search.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, VectorError> {
        if self.generation.is_none() {
            return Err(VectorError::NotInitialized);
        }
        let embedding = self.embedder.embed_query(query)?;
        self.search_by_vector(&embedding, k)
    }

    pub fn stats(&self) -> IndexStats {
        let Some(generation) = &self.generation else {
            return IndexStats::default();
        };
        let kind = generation.index.kind();
        let size_bytes = std::fs::metadata(self.layout.index_file(kind))
            .map(|m| m.len())
            .unwrap_or(0);

        IndexStats {
            kind: Some(kind),
            vector_count: generation.index.len(),
            dimension: generation.index.dimension(),
            size_bytes,
            available: true,
        }
    }
}

/// Write a whole generation, backing up the previous one first.
fn persist(layout: &IndexLayout, generation: &Generation) -> Result<Option<PathBuf>, VectorError> {
    match write_generation(layout, generation) {
        Ok(backup) => {
            info!(
                dir = ?layout.dir(),
                documents = generation.table.len(),
                backup = ?backup,
                "Saved index generation"
            );
            Ok(backup)
        }
        Err(e) => {
            error!(dir = ?layout.dir(), error = %e, "Failed to save index generation");
            Err(e)
        }
    }
}

fn write_generation(
    layout: &IndexLayout,
    generation: &Generation,
) -> Result<Option<PathBuf>, VectorError> {
    // Serialize first so a bad table fails before anything is touched
    let docstore = generation.table.to_json()?;
    let metadata = generation.metadata.to_json()?;

    let backup = layout.backup()?;
    layout.write_index(generation.index.as_ref())?;
    layout.write_atomic(DOCSTORE_FILE, &docstore)?;
    layout.write_atomic(METADATA_FILE, &metadata)?;
    layout.remove_stale_index(generation.index.kind())?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragstore_embeddings::EmbeddingError;
    use ragstore_types::ErrorKind;
    use tempfile::TempDir;

    /// [length, count of 'a']
    struct LetterEmbedder;

    impl Embedder for LetterEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| Embedding::new(vec![t.len() as f32, t.matches('a').count() as f32]))
                .collect())
        }
    }

    fn engine(dir: &std::path::Path, kind: IndexKind) -> VectorEngine {
        let config = EngineConfig::new(dir.join("index"))
            .with_kind(kind)
            .with_hnsw(HnswParams::default().with_expansion(64, 32));
        VectorEngine::new(config, Arc::new(LetterEmbedder))
    }

    fn docs(texts: &[&str]) -> Vec<Document> {
        texts.iter().map(|t| Document::new(*t)).collect()
    }

    fn vectors(rows: &[[f32; 2]]) -> Vec<Embedding> {
        rows.iter().map(|r| Embedding::new(r.to_vec())).collect()
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = Settings::default();
        settings.index_dir = "/tmp/ragstore-test-index".to_string();
        settings.index_kind = IndexKind::Flat;
        settings.hnsw.ef_search = 64;

        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config.index_dir, PathBuf::from("/tmp/ragstore-test-index"));
        assert_eq!(config.index_kind, IndexKind::Flat);
        assert_eq!(config.hnsw.ef_search, 64);
        assert_eq!(config.hnsw.m, 16);
    }

    #[test]
    fn test_build_persists_generation() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        assert_eq!(engine.state(), EngineState::Empty);

        let outcome = engine
            .build(
                docs(&["zero", "one", "two"]),
                vectors(&[[0.0, 0.0], [1.0, 1.0], [5.0, 5.0]]),
                false,
            )
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Built { document_count: 3 });
        assert_eq!(engine.state(), EngineState::Built);
        assert!(engine.layout().has_generation());
        assert!(engine.layout().metadata_file().is_file());

        let table = engine.table().unwrap();
        assert_eq!(table.positions(), &["0", "1", "2"]);
        assert_eq!(engine.metadata().unwrap().document_count, 3);
        assert_eq!(engine.metadata().unwrap().dimension, 2);
    }

    #[test]
    fn test_build_rejects_empty_and_mismatched_input() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);

        let err = engine.build(Vec::new(), Vec::new(), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = engine
            .build(docs(&["a", "b"]), vectors(&[[1.0, 0.0]]), true)
            .unwrap_err();
        assert!(matches!(err, VectorError::InvalidInput(_)));
        assert!(!engine.layout().has_generation());
        assert_eq!(engine.state(), EngineState::Empty);
    }

    #[test]
    fn test_build_without_force_loads_existing() {
        let temp = TempDir::new().unwrap();
        let mut first = engine(temp.path(), IndexKind::Flat);
        first
            .build(docs(&["a", "b"]), vectors(&[[0.0, 0.0], [1.0, 0.0]]), false)
            .unwrap();

        let mut second = engine(temp.path(), IndexKind::Flat);
        let outcome = second
            .build(docs(&["other"]), vectors(&[[9.0, 9.0]]), false)
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Loaded { document_count: 2 });
        assert_eq!(second.state(), EngineState::Reloaded);
        assert_eq!(second.table().unwrap().get("0").unwrap().content, "a");
        assert!(first.layout().backups().unwrap().is_empty());
    }

    #[test]
    fn test_force_rebuild_backs_up_previous() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(docs(&["a"]), vectors(&[[0.0, 0.0]]), false)
            .unwrap();
        engine
            .build(docs(&["b", "c"]), vectors(&[[1.0, 0.0], [2.0, 0.0]]), true)
            .unwrap();

        let backups = engine.layout().backups().unwrap();
        assert_eq!(backups.len(), 1);
        let old = DocumentTable::load(&backups[0].join(DOCSTORE_FILE)).unwrap();
        assert_eq!(old.get("0").unwrap().content, "a");
        assert_eq!(engine.table().unwrap().len(), 2);
    }

    #[test]
    fn test_rebuild_with_other_kind_replaces_binary() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Hnsw);
        engine
            .build(docs(&["a"]), vectors(&[[0.0, 1.0]]), false)
            .unwrap();

        engine.config.index_kind = IndexKind::Flat;
        engine
            .build(docs(&["b"]), vectors(&[[1.0, 1.0]]), true)
            .unwrap();
        assert_eq!(engine.layout().existing_index(), Some(IndexKind::Flat));
        assert!(!engine.layout().index_file(IndexKind::Hnsw).exists());
    }

    #[test]
    fn test_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut built = engine(temp.path(), IndexKind::Flat);
        built
            .build(
                vec![
                    Document::new("first").with_metadata("page", 1),
                    Document::new("second"),
                ],
                vectors(&[[0.0, 0.0], [3.0, 4.0]]),
                false,
            )
            .unwrap();

        let mut loaded = engine(temp.path(), IndexKind::Flat);
        loaded.load().unwrap();
        assert_eq!(loaded.state(), EngineState::Reloaded);
        assert_eq!(loaded.table(), built.table());
        assert_eq!(
            loaded.metadata().unwrap().document_count,
            built.metadata().unwrap().document_count
        );
    }

    #[test]
    fn test_hnsw_reload_uses_persisted_parameters() {
        let temp = TempDir::new().unwrap();
        let mut built = engine(temp.path(), IndexKind::Hnsw);
        built
            .build(docs(&["a", "b"]), vectors(&[[0.0, 0.0], [1.0, 0.0]]), false)
            .unwrap();

        // Different configured kind and parameters: persisted values win
        let config = EngineConfig::new(temp.path().join("index"))
            .with_kind(IndexKind::Flat)
            .with_hnsw(HnswParams::default().with_expansion(300, 250));
        let mut loaded = VectorEngine::new(config, Arc::new(LetterEmbedder));
        loaded.load().unwrap();

        let metadata = loaded.metadata().unwrap();
        assert_eq!(metadata.index_type, IndexKind::Hnsw);
        assert_eq!(metadata.ef_search, Some(32));
        assert_eq!(loaded.stats().kind, Some(IndexKind::Hnsw));
    }

    #[test]
    fn test_add_continues_positions() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(docs(&["a", "b"]), vectors(&[[0.0, 0.0], [1.0, 0.0]]), false)
            .unwrap();

        let ids = engine.add(docs(&["c"]), vectors(&[[2.0, 0.0]])).unwrap();
        assert_eq!(ids, vec!["2"]);
        let ids = engine
            .add(docs(&["d", "e"]), vectors(&[[3.0, 0.0], [4.0, 0.0]]))
            .unwrap();
        assert_eq!(ids, vec!["3", "4"]);
        assert_eq!(engine.state(), EngineState::Saved);
        assert_eq!(engine.metadata().unwrap().document_count, 5);

        let mut reloaded = self::engine(temp.path(), IndexKind::Flat);
        reloaded.load().unwrap();
        assert_eq!(reloaded.table().unwrap().len(), 5);
        assert_eq!(reloaded.stats().vector_count, 5);
    }

    #[test]
    fn test_add_auto_loads() {
        let temp = TempDir::new().unwrap();
        engine(temp.path(), IndexKind::Flat)
            .build(docs(&["a"]), vectors(&[[0.0, 0.0]]), false)
            .unwrap();

        let mut fresh = engine(temp.path(), IndexKind::Flat);
        assert!(!fresh.is_loaded());
        let ids = fresh.add(docs(&["b"]), vectors(&[[1.0, 1.0]])).unwrap();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_add_without_index() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        let err = engine.add(docs(&["a"]), vectors(&[[0.0, 0.0]])).unwrap_err();
        assert!(matches!(err, VectorError::NotInitialized));
        assert!(engine.add(Vec::new(), Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_disk_untouched() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(docs(&["a"]), vectors(&[[0.0, 0.0]]), false)
            .unwrap();
        let before = std::fs::read(engine.layout().docstore_file()).unwrap();

        let err = engine
            .add(docs(&["b"]), vec![Embedding::new(vec![1.0, 2.0, 3.0])])
            .unwrap_err();
        assert!(matches!(
            err,
            VectorError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(std::fs::read(engine.layout().docstore_file()).unwrap(), before);
        assert_eq!(engine.table().unwrap().len(), 1);
        assert!(engine.layout().backups().unwrap().is_empty());
    }

    #[test]
    fn test_failed_persist_keeps_added_documents_in_memory() {
        let temp = TempDir::new().unwrap();
        let mut writer = engine(temp.path(), IndexKind::Flat);
        writer
            .build(docs(&["zero", "one"]), vectors(&[[0.0, 0.0], [1.0, 1.0]]), false)
            .unwrap();

        // A directory where the document table goes makes the write fail
        let docstore = writer.layout().docstore_file();
        std::fs::remove_file(&docstore).unwrap();
        std::fs::create_dir(&docstore).unwrap();
        std::fs::write(docstore.join("blocker"), b"x").unwrap();

        assert!(writer.add(docs(&["two"]), vectors(&[[2.0, 2.0]])).is_err());
        assert_eq!(writer.state(), EngineState::Modified);
        assert_eq!(writer.table().unwrap().len(), 3);
        assert_eq!(writer.metadata().unwrap().document_count, 3);

        std::fs::remove_dir_all(&docstore).unwrap();
        writer.save().unwrap();
        assert_eq!(writer.state(), EngineState::Saved);

        let mut reloaded = engine(temp.path(), IndexKind::Flat);
        reloaded.load().unwrap();
        assert_eq!(reloaded.table().unwrap().len(), 3);
    }

    #[test]
    fn test_save_without_index() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        assert!(matches!(engine.save(), Err(VectorError::NotInitialized)));
    }

    #[test]
    fn test_clear_then_load_fails() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(docs(&["a"]), vectors(&[[0.0, 0.0]]), false)
            .unwrap();

        let backup = engine.clear().unwrap();
        assert!(backup.is_some());
        assert_eq!(engine.state(), EngineState::Empty);
        assert!(!engine.stats().available);

        let err = engine.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!engine.ensure_loaded().unwrap());

        // Nothing left to back up
        assert!(engine.clear().unwrap().is_none());
    }

    #[test]
    fn test_load_detects_count_disagreement() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(docs(&["a", "b"]), vectors(&[[0.0, 0.0], [1.0, 0.0]]), false)
            .unwrap();

        let mut metadata = engine.metadata().unwrap().clone();
        metadata.document_count = 7;
        std::fs::write(engine.layout().metadata_file(), metadata.to_json().unwrap()).unwrap();

        let err = engine.load().unwrap_err();
        assert!(matches!(err, VectorError::Persistence(_)));
    }

    #[test]
    fn test_load_requires_metadata() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(docs(&["a"]), vectors(&[[0.0, 0.0]]), false)
            .unwrap();
        std::fs::remove_file(engine.layout().metadata_file()).unwrap();

        assert!(matches!(engine.load(), Err(VectorError::Persistence(_))));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build(
                docs(&["far", "near", "mid"]),
                vectors(&[[10.0, 0.0], [1.0, 0.0], [4.0, 0.0]]),
                false,
            )
            .unwrap();

        let hits = engine
            .search_by_vector(&Embedding::new(vec![0.0, 0.0]), 3)
            .unwrap();
        let contents: Vec<&str> = hits.iter().map(|h| h.record.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "mid", "far"]);
        assert!((hits[0].distance - 1.0).abs() < 1e-6);

        let err = engine
            .search_by_vector(&Embedding::new(vec![0.0; 5]), 1)
            .unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_text_level_build_and_search() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        engine
            .build_documents(docs(&["a", "aaaa", "bbbbbbbb"]), false)
            .unwrap();
        engine.add_documents(docs(&["aaa"])).unwrap();

        let hits = engine.search("aaa", 2).unwrap();
        assert_eq!(hits[0].record.content, "aaa");
        assert_eq!(hits[1].record.content, "aaaa");
    }

    #[test]
    fn test_search_before_build() {
        let temp = TempDir::new().unwrap();
        let engine = engine(temp.path(), IndexKind::Flat);
        assert!(matches!(
            engine.search("anything", 3),
            Err(VectorError::NotInitialized)
        ));
    }

    #[test]
    fn test_stats() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path(), IndexKind::Flat);
        assert_eq!(engine.stats().vector_count, 0);

        engine
            .build(docs(&["a", "b"]), vectors(&[[0.0, 0.0], [1.0, 0.0]]), false)
            .unwrap();
        let stats = engine.stats();
        assert_eq!(stats.kind, Some(IndexKind::Flat));
        assert_eq!(stats.vector_count, 2);
        assert_eq!(stats.dimension, 2);
        assert!(stats.available);
        // header + 4 floats
        assert_eq!(stats.size_bytes, 6 + 2 + 4 + 8 + 16);
    }
}
