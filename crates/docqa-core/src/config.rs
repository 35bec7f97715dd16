//! Layered configuration and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml` (env
//! taken from `RUST_ENV`) and `APP_*` environment variables, where `__`
//! separates sections (`APP_STORAGE__PERSIST_DIRECTORY=/data/qa`).
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound on chunks per collection add.
pub const MAX_BATCH_SIZE: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub persist_directory: String,
    pub collection_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { persist_directory: "Q&A".to_string(), collection_name: "collection".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Falls back to `GOOGLE_API_KEY` when unset.
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// One embedding model for both indexing and querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: "models/embedding-001".to_string(), dimension: 768, use_fake: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model that writes the final answer.
    pub answer_model: String,
    /// Model that translates questions into structured queries.
    pub query_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { answer_model: "gemini-2.5-pro".to_string(), query_model: "gemini-2.0-flash-lite".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// A separator cut shorter than this falls back to a hard cut.
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50, min_chunk_chars: 100 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.min_chunk_chars || self.min_chunk_chars > self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking requires chunk_overlap < min_chunk_chars <= chunk_size (got {} / {} / {})",
                self.chunk_overlap, self.min_chunk_chars, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub batch_size: usize,
    /// Skip chunks whose (filename, text) hash is already stored.
    pub dedup: bool,
    pub show_progress: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { batch_size: MAX_BATCH_SIZE, dedup: true, show_progress: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Result count when the translated query carries no limit.
    pub top_k: usize,
    /// Cap on a limit requested by the translated query.
    pub max_k: usize,
    pub content_description: String,
    pub filename_description: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_k: 20,
            content_description: "This is a content of a file uploaded by the user".to_string(),
            filename_description:
                "The name of the file the chunk text is from. For example, `state_of_the_union_2022.txt`".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.storage.collection_name.trim().is_empty() {
            return Err(Error::InvalidConfig("storage.collection_name must not be empty".to_string()));
        }
        if self.storage.persist_directory.trim().is_empty() {
            return Err(Error::InvalidConfig("storage.persist_directory must not be empty".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be > 0".to_string()));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.model must not be empty".to_string()));
        }
        self.chunking.validate()?;
        if !(1..=MAX_BATCH_SIZE).contains(&self.indexing.batch_size) {
            return Err(Error::InvalidConfig(format!(
                "indexing.batch_size must be within 1..={MAX_BATCH_SIZE}, got {}",
                self.indexing.batch_size
            )));
        }
        if self.retrieval.top_k == 0 || self.retrieval.max_k < self.retrieval.top_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval requires 0 < top_k <= max_k (got {} / {})",
                self.retrieval.top_k, self.retrieval.max_k
            )));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig("provider.request_timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// The storage directory with `~` and `${VAR}` expanded.
    pub fn persist_path(&self) -> PathBuf {
        expand_path(&self.storage.persist_directory)
    }

    /// Configured credential, else `GOOGLE_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.provider
            .api_key
            .clone()
            .or_else(|| env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], with `file` read in place of `config.toml`.
    pub fn load_with(file: Option<&Path>) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let base = file.map_or_else(|| PathBuf::from("config.toml"), Path::to_path_buf);
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
