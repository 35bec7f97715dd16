use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};

use crate::error::Result;
use crate::types::{Chunk, MetadataFilter};

/// Whether a text is embedded for storage or as a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    Document,
    Query,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `gemini:models/embedding-001:d768`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model(&self) -> &str;
    /// Single prompt in, generated text out.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// A persistent, named set of chunks with an attached embedding function.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;
    async fn count(&self) -> Result<usize>;
    /// Append chunks; embeddings are computed by the attached embedder.
    async fn add(&self, chunks: &[Chunk]) -> Result<()>;
    /// Similarity search, best match first.
    async fn query(&self, text: &str, filter: Option<&MetadataFilter>, limit: usize) -> Result<Vec<Chunk>>;
    async fn filenames(&self) -> Result<BTreeSet<String>>;
    async fn content_hashes(&self) -> Result<HashSet<String>>;
}
