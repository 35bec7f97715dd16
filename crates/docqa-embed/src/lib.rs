//! docqa-embed
//!
//! Embedding functions attached to a collection: the hosted Gemini model and a
//! deterministic offline embedder for tests and development
//! (`APP_USE_FAKE_EMBEDDINGS=1`).
#![deny(unused_imports)]

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use docqa_core::config::Settings;
use docqa_core::traits::{EmbedTask, Embedder};
use docqa_core::{Error, Result};
use docqa_llm::client::{model_path, GeminiClient};

/// `batchEmbedContents` accepts at most this many texts per request.
pub const PROVIDER_BATCH_LIMIT: usize = 100;

pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    dim: usize,
    id: String,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, model: &str, dim: usize) -> Self {
        let model = model_path(model);
        let id = format!("gemini:{model}:d{dim}");
        Self { client, model, dim, id }
    }
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

fn task_type(task: EmbedTask) -> &'static str {
    match task {
        EmbedTask::Document => "RETRIEVAL_DOCUMENT",
        EmbedTask::Query => "RETRIEVAL_QUERY",
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(PROVIDER_BATCH_LIMIT) {
            let requests: Vec<_> = batch
                .iter()
                .map(|t| json!({ "model": self.model, "content": { "parts": [{ "text": t }] }, "taskType": task_type(task) }))
                .collect();
            let body = json!({ "requests": requests });
            let path = format!("{}:batchEmbedContents", self.model);
            let response: BatchEmbedResponse = self.client.post_json(&path, &body).await?;
            if response.embeddings.len() != batch.len() {
                return Err(Error::provider(
                    None,
                    format!("embedder returned {} vectors for {} texts", response.embeddings.len(), batch.len()),
                ));
            }
            for e in response.embeddings {
                if e.values.len() != self.dim {
                    return Err(Error::InvalidConfig(format!(
                        "dim mismatch: model {} returned {} values, embedding.dimension is {}",
                        self.model,
                        e.values.len(),
                        self.dim
                    )));
                }
                out.push(e.values);
            }
            tracing::debug!(model = %self.model, batch = batch.len(), "embedded batch");
        }
        Ok(out)
    }
}

/// Hashes whitespace tokens into a fixed-size, L2-normalized vector.
/// Texts sharing words land close together, which is enough for tests.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxhash:d{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 { return v; }
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            v[idx] += 1.0 + ((h >> 32) as u32) as f32 / u32::MAX as f32 * 0.1;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// The single embedder shared by the indexing and query paths.
pub fn get_default_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    if settings.embedding.use_fake || fake_requested() {
        tracing::info!(dim = settings.embedding.dimension, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.embedding.dimension)));
    }
    let client = GeminiClient::from_settings(settings)?;
    Ok(Arc::new(GeminiEmbedder::new(client, &settings.embedding.model, settings.embedding.dimension)))
}
