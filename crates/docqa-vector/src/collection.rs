//! A persistent chunk collection stored in LanceDB.
//!
//! The collection owns its embedder: `add` embeds documents and `query`
//! embeds the question with the same function. The embedder id is written to
//! the collection's meta table on first open and checked on every later open.
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::traits::{Collection, EmbedTask, Embedder};
use docqa_core::types::{Chunk, MetadataFilter};
use docqa_core::{Error, Result};

use crate::filter::to_predicate;
use crate::schema::{build_chunk_schema, vector_dim};
use crate::table::{ensure_table, get_meta, meta_table_name, open_db, set_meta};

pub const EMBEDDER_KEY: &str = "embedder_id";

pub struct LanceCollection {
    conn: Connection,
    name: String,
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for LanceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceCollection")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("embedder", &self.embedder.embedder_id())
            .finish()
    }
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Store(format!("missing {name} column")))
}

impl LanceCollection {
    /// Open (creating if needed) the collection `name` under `dir`.
    pub async fn open(dir: &Path, name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::InvalidConfig("collection name is empty".to_string()));
        }
        std::fs::create_dir_all(dir)?;
        let conn = open_db(&dir.to_string_lossy()).await?;
        let dim = i32::try_from(embedder.dim())
            .map_err(|_| Error::InvalidConfig(format!("embedding dimension {} is too large", embedder.dim())))?;

        let meta = meta_table_name(name);
        match get_meta(&conn, &meta, EMBEDDER_KEY).await? {
            Some(found) if found != embedder.embedder_id() => {
                return Err(Error::EmbedderMismatch { expected: found, found: embedder.embedder_id().to_string() });
            }
            Some(_) => {}
            None => set_meta(&conn, &meta, EMBEDDER_KEY, embedder.embedder_id()).await?,
        }
        ensure_table(&conn, name, build_chunk_schema(dim)).await?;

        let collection = Self { conn, name: name.to_string(), dir: dir.to_path_buf(), embedder };
        let schema = collection.table().await?.schema().await.map_err(Error::store)?;
        if vector_dim(&schema) != Some(dim) {
            return Err(Error::Store(format!(
                "collection '{name}' stores vectors of dimension {:?}, embedder produces {dim}",
                vector_dim(&schema)
            )));
        }
        tracing::debug!(collection = name, dir = %dir.display(), embedder = collection.embedder.embedder_id(), "collection opened");
        Ok(collection)
    }

    async fn table(&self) -> Result<Table> {
        self.conn.open_table(&self.name).execute().await.map_err(Error::store)
    }

    /// Scan one string column across the whole table.
    async fn scan_column(&self, column: &str) -> Result<Vec<String>> {
        let t = self.table().await?;
        let mut stream = t.query().select(Select::columns(&[column])).execute().await.map_err(Error::store)?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let col = string_col(&batch, column)?;
            out.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
        }
        Ok(out)
    }

    fn to_record_batch(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let dim = self.embedder.dim() as i32;
        let now = Utc::now().timestamp_millis();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut texts = Vec::with_capacity(chunks.len());
        let mut filenames = Vec::with_capacity(chunks.len());
        let mut hashes = Vec::with_capacity(chunks.len());
        let mut created = Vec::with_capacity(chunks.len());
        for c in chunks {
            ids.push(c.id.clone());
            texts.push(c.text.clone());
            filenames.push(c.filename.clone());
            hashes.push(c.content_hash());
            created.push(now);
        }
        let vectors: Vec<Option<Vec<Option<f32>>>> =
            vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect())).collect();
        RecordBatch::try_new(
            build_chunk_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(filenames)),
                Arc::new(StringArray::from(hashes)),
                Arc::new(TimestampMillisecondArray::from(created)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
            ],
        )
        .map_err(Error::store)
    }
}

#[async_trait]
impl Collection for LanceCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self) -> Result<usize> {
        self.table().await?.count_rows(None).await.map_err(Error::store)
    }

    async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() { return Ok(()); }
        if let Some(c) = chunks.iter().find(|c| c.filename.is_empty()) {
            return Err(Error::InvalidInput(format!("chunk {} has no filename", c.id)));
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts, EmbedTask::Document).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::provider(None, format!("embedder returned {} vectors for {} chunks", vectors.len(), chunks.len())));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.embedder.dim()) {
            return Err(Error::InvalidConfig(format!("dim mismatch: got {} expected {}", v.len(), self.embedder.dim())));
        }
        let batch = self.to_record_batch(chunks, vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.table().await?.add(reader).execute().await.map_err(Error::store)?;
        tracing::debug!(collection = %self.name, rows = chunks.len(), "chunks appended");
        Ok(())
    }

    async fn query(&self, text: &str, filter: Option<&MetadataFilter>, limit: usize) -> Result<Vec<Chunk>> {
        if limit == 0 { return Ok(Vec::new()); }
        let predicate = match filter {
            Some(f) => match to_predicate(f)? {
                Some(p) => Some(p),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let t = self.table().await?;
        if t.count_rows(None).await.map_err(Error::store)? == 0 {
            return Ok(Vec::new());
        }
        let mut vectors = self.embedder.embed_batch(&[text.to_string()], EmbedTask::Query).await?;
        let vector = vectors.pop().ok_or_else(|| Error::provider(None, "embedder returned no vector for the query"))?;

        let mut search = t
            .vector_search(vector)
            .map_err(Error::store)?
            .distance_type(DistanceType::Cosine)
            .select(Select::columns(&["id", "text", "filename"]))
            .limit(limit);
        if let Some(p) = predicate {
            search = search.only_if(p);
        }
        let mut stream = search.execute().await.map_err(Error::store)?;

        let mut hits: Vec<(f32, Chunk)> = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let ids = string_col(&batch, "id")?;
            let texts = string_col(&batch, "text")?;
            let files = string_col(&batch, "filename")?;
            let dist = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for i in 0..batch.num_rows() {
                let d = dist.filter(|d| d.is_valid(i)).map(|d| d.value(i)).unwrap_or(f32::MAX);
                hits.push((d, Chunk::new(ids.value(i), texts.value(i), files.value(i))));
            }
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.truncate(limit);
        Ok(hits.into_iter().map(|(_, c)| c).collect())
    }

    async fn filenames(&self) -> Result<BTreeSet<String>> {
        Ok(self.scan_column("filename").await?.into_iter().collect())
    }

    async fn content_hashes(&self) -> Result<HashSet<String>> {
        Ok(self.scan_column("content_hash").await?.into_iter().collect())
    }
}
