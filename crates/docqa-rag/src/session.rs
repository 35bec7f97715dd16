//! A conversation with the document collection.
//!
//! The transcript is append-only and only grows when a question was answered:
//! a failed turn leaves it exactly as it was.
use std::sync::Arc;

use docqa_core::types::{ChatMessage, UploadedFile};
use docqa_core::{Error, Result};

use crate::{DocQa, UploadReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingUpload,
    Indexing,
    Retrieving,
    Generating,
}

pub struct Session {
    qa: Arc<DocQa>,
    transcript: Vec<ChatMessage>,
    staged: Vec<UploadedFile>,
    state: SessionState,
}

impl Session {
    pub fn new(qa: Arc<DocQa>) -> Self {
        Self { qa, transcript: Vec::new(), staged: Vec::new(), state: SessionState::Idle }
    }

    pub fn qa(&self) -> &DocQa {
        &self.qa
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn staged(&self) -> &[UploadedFile] {
        &self.staged
    }

    /// Queue files for the next [`Session::process_documents`].
    pub fn stage(&mut self, files: Vec<UploadedFile>) {
        if files.is_empty() { return; }
        self.staged.extend(files);
        self.state = SessionState::AwaitingUpload;
    }

    /// Index everything staged. Staged files are kept when indexing fails so
    /// the user can retry.
    pub async fn process_documents(&mut self) -> Result<UploadReport> {
        if self.staged.is_empty() {
            return Ok(UploadReport::default());
        }
        self.state = SessionState::Indexing;
        let result = self.qa.upload(&self.staged).await;
        match result {
            Ok(report) => {
                self.staged.clear();
                self.state = SessionState::Idle;
                Ok(report)
            }
            Err(e) => {
                self.state = SessionState::AwaitingUpload;
                Err(e)
            }
        }
    }

    /// Answer `query` from the collection and record the turn.
    pub async fn ask(&mut self, query: &str) -> Result<&ChatMessage> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }
        let outcome = self.answer(query).await;
        self.state = if self.staged.is_empty() { SessionState::Idle } else { SessionState::AwaitingUpload };
        let (answer, sources) = outcome?;
        self.transcript.push(ChatMessage::user(query));
        self.transcript.push(ChatMessage::assistant(answer, sources));
        self.transcript.last().ok_or_else(|| Error::Operation("transcript is empty".to_string()))
    }

    async fn answer(&mut self, query: &str) -> Result<(String, String)> {
        self.state = SessionState::Retrieving;
        let retrieved = self.qa.retrieve(query).await?;
        if retrieved.is_empty() {
            tracing::info!("no matching context, answering with an empty context");
        }
        self.state = SessionState::Generating;
        let answer = self.qa.respond(query, &retrieved.context_texts).await?;
        Ok((answer, retrieved.sources_display()))
    }

    /// Drop the transcript and anything staged.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.staged.clear();
        self.state = SessionState::Idle;
    }
}
