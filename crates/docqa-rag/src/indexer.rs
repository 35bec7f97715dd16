//! Append chunk texts to a collection with sequential ids.
//!
//! Ids continue from the current collection size, so indexing is guarded by
//! an exclusive advisory lock on `<persist_dir>/.<collection>.lock`.
use fs2::FileExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::config::{IndexingConfig, MAX_BATCH_SIZE};
use docqa_core::traits::Collection;
use docqa_core::types::{content_hash, Chunk};
use docqa_core::{Error, Result};

/// Held for the duration of one indexing run.
struct CollectionLock {
    file: File,
    path: PathBuf,
}

impl CollectionLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || -> Result<Self> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).read(true).write(true).truncate(false).open(&path)?;
            file.lock_exclusive()?;
            Ok(Self { file, path })
        })
        .await
        .map_err(|e| Error::Operation(format!("lock task failed: {e}")))?
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release collection lock");
        }
    }
}

pub fn lock_path(persist_dir: &Path, collection: &str) -> PathBuf {
    persist_dir.join(format!(".{collection}.lock"))
}

pub struct Indexer {
    collection: Arc<dyn Collection>,
    lock_path: PathBuf,
    config: IndexingConfig,
}

impl Indexer {
    pub fn new(collection: Arc<dyn Collection>, persist_dir: &Path, config: IndexingConfig) -> Result<Self> {
        if !(1..=MAX_BATCH_SIZE).contains(&config.batch_size) {
            return Err(Error::InvalidConfig(format!(
                "indexing.batch_size must be within 1..={MAX_BATCH_SIZE}, got {}",
                config.batch_size
            )));
        }
        let lock_path = lock_path(persist_dir, collection.name());
        Ok(Self { collection, lock_path, config })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Index `(text, filename)` pairs in input order. Returns how many chunks
    /// the collection grew by.
    pub async fn index(&self, items: &[(String, String)]) -> Result<usize> {
        if items.iter().any(|(_, filename)| filename.is_empty()) {
            return Err(Error::InvalidInput("every chunk needs a filename".to_string()));
        }
        let _lock = CollectionLock::acquire(self.lock_path.clone()).await?;

        let start = self.collection.count().await?;
        tracing::info!(collection = self.collection.name(), existing = start, incoming = items.len(), "indexing chunks");

        let mut seen: HashSet<String> = if self.config.dedup {
            self.collection.content_hashes().await?
        } else {
            HashSet::new()
        };
        let mut chunks = Vec::with_capacity(items.len());
        for (text, filename) in items {
            if self.config.dedup && !seen.insert(content_hash(filename, text)) {
                continue;
            }
            chunks.push(Chunk::new((start + chunks.len()).to_string(), text.clone(), filename.clone()));
        }
        let dropped = items.len() - chunks.len();
        if dropped > 0 {
            tracing::info!(dropped, "skipping chunks already stored");
        }

        let pb = self.progress_bar(chunks.len());
        for batch in chunks.chunks(self.config.batch_size) {
            self.collection.add(batch).await?;
            pb.inc(batch.len() as u64);
            tracing::debug!(rows = batch.len(), first_id = %batch[0].id, "batch added");
        }
        pb.finish_and_clear();

        let added = self.collection.count().await?.saturating_sub(start);
        tracing::info!(collection = self.collection.name(), added, "indexing finished");
        Ok(added)
    }
}
