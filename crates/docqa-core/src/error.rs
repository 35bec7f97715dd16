use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to extract text from '{filename}': {reason}")]
    Extraction { filename: String, reason: String },

    /// The hosted embedding/generation provider rejected or failed a request
    /// (auth, quota, network, oversized input).
    #[error("Provider error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Provider { status: Option<u16>, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Collection is bound to embedder '{expected}' but '{found}' is configured")]
    EmbedderMismatch { expected: String, found: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn store<E: Display>(e: E) -> Self {
        Self::Store(e.to_string())
    }

    pub fn provider<E: Display>(status: Option<u16>, e: E) -> Self {
        Self::Provider { status, message: e.to_string() }
    }

    pub fn extraction<E: Display>(filename: &str, e: E) -> Self {
        Self::Extraction { filename: filename.to_string(), reason: e.to_string() }
    }

    /// Errors the interactive session can report and keep going after.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_) | Self::EmbedderMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
