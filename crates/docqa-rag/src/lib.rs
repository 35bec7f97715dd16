//! docqa-rag
//!
//! The question-answering pipeline over uploaded documents: extraction and
//! chunking of uploads, indexing, self-query retrieval and grounded answers.
//! [`DocQa`] wires the pieces together from [`Settings`]; [`session::Session`]
//! layers a conversation on top.
#![deny(unused_imports)]

pub mod indexer;
pub mod responder;
pub mod retriever;
pub mod session;

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::extract::extract_text;
use docqa_core::traits::{Collection, Generator};
use docqa_core::types::{RetrievalResult, UploadedFile};
use docqa_core::Result;
use docqa_llm::GeminiGenerator;
use docqa_vector::LanceCollection;

use crate::indexer::Indexer;
use crate::responder::Responder;
use crate::retriever::Retriever;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub filename: String,
    pub reason: String,
}

/// Outcome of processing a set of uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Chunks the collection grew by.
    pub added: usize,
    pub indexed_files: Vec<String>,
    /// Unsupported names and files without extractable text.
    pub skipped: Vec<String>,
    pub failures: Vec<UploadFailure>,
}

pub struct DocQa {
    collection: Arc<dyn Collection>,
    chunker: Chunker,
    indexer: Indexer,
    retriever: Retriever,
    responder: Responder,
}

impl DocQa {
    /// Open the configured collection and connect the hosted models. A missing
    /// API key is only an error once a question is asked.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = docqa_embed::get_default_embedder(settings)?;
        let collection = LanceCollection::open(&settings.persist_path(), &settings.storage.collection_name, embedder).await?;
        let translator = Arc::new(GeminiGenerator::from_settings(settings, settings.llm.query_model.clone()));
        let answerer = Arc::new(GeminiGenerator::from_settings(settings, settings.llm.answer_model.clone()));
        Self::new(settings, Arc::new(collection), translator, answerer)
    }

    /// Assemble from explicit parts; tests pass fakes here.
    pub fn new(
        settings: &Settings,
        collection: Arc<dyn Collection>,
        translator: Arc<dyn Generator>,
        answerer: Arc<dyn Generator>,
    ) -> Result<Self> {
        let chunker = Chunker::new(settings.chunking.clone())?;
        let indexer = Indexer::new(collection.clone(), &settings.persist_path(), settings.indexing.clone())?;
        let retriever = Retriever::new(collection.clone(), translator, settings.retrieval.clone());
        let responder = Responder::new(answerer);
        Ok(Self { collection, chunker, indexer, retriever, responder })
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    /// Extract, chunk and index `files`. A bad file is reported and the rest
    /// still get indexed.
    pub async fn upload(&self, files: &[UploadedFile]) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        let mut items = Vec::new();
        for file in files {
            match extract_text(file) {
                Ok(None) => report.skipped.push(file.name.clone()),
                Ok(Some(text)) => {
                    let chunks = self.chunker.split(&text);
                    if chunks.is_empty() {
                        tracing::warn!(file = %file.name, "no text extracted");
                        report.skipped.push(file.name.clone());
                        continue;
                    }
                    tracing::debug!(file = %file.name, chunks = chunks.len(), "chunked upload");
                    items.extend(chunks.into_iter().map(|c| (c, file.name.clone())));
                    report.indexed_files.push(file.name.clone());
                }
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "extraction failed");
                    report.failures.push(UploadFailure { filename: file.name.clone(), reason: e.to_string() });
                }
            }
        }
        if !items.is_empty() {
            report.added = self.indexer.index(&items).await?;
        }
        tracing::info!(
            added = report.added,
            files = report.indexed_files.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "upload processed"
        );
        Ok(report)
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(query).await
    }

    pub async fn respond(&self, query: &str, context: &[String]) -> Result<String> {
        self.responder.respond(query, context).await
    }

    /// Distinct filenames present in the collection.
    pub async fn available_documents(&self) -> Result<BTreeSet<String>> {
        self.collection.filenames().await
    }
}
