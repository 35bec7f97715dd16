use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chat with your PDF and DOCX documents
#[derive(Debug, Parser)]
#[command(
    name = "docqa",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chat with your PDF and DOCX documents",
    long_about = "Upload PDF or DOCX files into a local vector collection and ask questions answered from their content."
)]
pub struct Cli {
    /// Path to a config.toml (defaults to ./config.toml)
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable progress bars (overrides indexing.show_progress)
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Defaults to `chat`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload files or directories (searched recursively for .pdf/.docx)
    Ingest {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer one question and exit
    Ask {
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// List the documents available in the collection
    Docs,
    /// Interactive session
    Chat,
}
