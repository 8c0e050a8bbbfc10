//! Document types.
//!
//! `Document` is what a caller hands to the index: an already chunked
//! passage plus free-form metadata. `DocumentRecord` is the same passage
//! once the index has assigned it a stable identifier.

use serde::{Deserialize, Serialize};

/// Free-form document metadata (source file, page, chunk number, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A pre-chunked passage waiting to be indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Passage text; this is what gets embedded
    pub content: String,

    /// Caller-supplied metadata, carried through to search results
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry (builder pattern).
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A passage with its index-assigned identity.
///
/// The id is the stringified vector position the passage was inserted at.
/// Ids are never reused within one index generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentRecord {
    /// Assign an identity to a document inserted at `position`.
    pub fn from_document(position: u64, document: Document) -> Self {
        Self {
            id: position.to_string(),
            content: document.content,
            metadata: document.metadata,
        }
    }
}
