//! Domain types shared by the extractor, chunker, collection and session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Name of the only filterable metadata attribute.
pub const FILENAME_ATTRIBUTE: &str = "filename";

/// A stored window of document text.
///
/// - `id`: decimal string, unique within a collection, assigned at indexing time
/// - `text`: the chunk payload that gets embedded
/// - `filename`: name of the uploaded source file; never empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub filename: String,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), filename: filename.into() }
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.filename, &self.text)
    }
}

/// Hash keyed by source filename and chunk text, used to skip re-uploads.
pub fn content_hash(filename: &str, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(filename.as_bytes());
    hasher.update(&[0]);
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// An uploaded file held in memory until it is processed.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))?;
        let bytes = std::fs::read(path)?;
        Ok(Self { name, bytes })
    }
}

/// Equality / inclusion predicate on a metadata attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "comparator", rename_all = "lowercase")]
pub enum MetadataFilter {
    Eq { attribute: String, value: String },
    In { attribute: String, values: Vec<String> },
}

impl MetadataFilter {
    pub fn filename_eq(value: impl Into<String>) -> Self {
        Self::Eq { attribute: FILENAME_ATTRIBUTE.to_string(), value: value.into() }
    }

    pub fn filename_in<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In { attribute: FILENAME_ATTRIBUTE.to_string(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Self::Eq { attribute, .. } | Self::In { attribute, .. } => attribute,
        }
    }
}

/// A free-text question translated into a semantic term plus optional filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredQuery {
    pub query: String,
    pub filter: Option<MetadataFilter>,
    pub limit: Option<usize>,
}

/// Chunks matched for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalResult {
    pub context_texts: Vec<String>,
    pub source_filenames: BTreeSet<String>,
}

impl RetrievalResult {
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let mut result = Self::default();
        for chunk in chunks {
            result.source_filenames.insert(chunk.filename);
            result.context_texts.push(chunk.text);
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.context_texts.is_empty()
    }

    /// Distinct filenames joined by newlines, as shown under "View Sources".
    pub fn sources_display(&self) -> String {
        self.source_filenames.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), sources: None }
    }

    pub fn assistant(content: impl Into<String>, sources: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), sources: Some(sources.into()) }
    }
}
