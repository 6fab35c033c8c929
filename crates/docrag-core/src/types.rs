//! Domain types shared by the chunker, the store and both search engines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Base metadata describing one extracted document.
///
/// - `source`: stable identifier of the document (usually the original file name)
/// - `title`: optional human-readable title
/// - `path`: optional location of the original file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DocumentMeta {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), ..Self::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Metadata attached to every chunk.
///
/// `chunk_index` is 0-based and contiguous within a source; `total_chunks` is
/// the size of that source's chunk list. Keys this type does not know about
/// are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChunkMetadata {
    pub fn from_document(meta: &DocumentMeta, chunk_index: usize, total_chunks: usize) -> Self {
        Self {
            source: meta.source.clone(),
            title: meta.title.clone(),
            chunk_index,
            total_chunks,
            path: meta.path.clone(),
            extra: BTreeMap::new(),
        }
    }
}

/// A bounded span of a document's text plus its metadata; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Raw text handed over by the document extractor.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub meta: DocumentMeta,
}

/// One ranked hit. `score` is engine-specific but higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// A chat message sent to the model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Which engine answers a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Semantic,
}

impl std::str::FromStr for SearchMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" | "text" => Ok(Self::Keyword),
            "semantic" | "vector" => Ok(Self::Semantic),
            other => Err(crate::error::Error::InvalidConfig(format!("unknown search mode '{other}'"))),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword => f.write_str("keyword"),
            Self::Semantic => f.write_str("semantic"),
        }
    }
}
