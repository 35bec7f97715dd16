//! `docqa` command-line front end.
pub mod args;
pub mod files;
pub mod render;
pub mod repl;

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docqa_core::config::{Config, Settings};
use docqa_rag::session::Session;
use docqa_rag::DocQa;

use crate::args::{Cli, Commands};
use crate::render::{render_documents, render_message, render_report};

/// Logs go to stderr so stdout carries only the conversation.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let config = Config::load_with(cli.config.as_deref()).context("loading configuration")?;
    let mut settings = config.settings()?;
    if cli.no_progress {
        settings.indexing.show_progress = false;
    }
    Ok(settings)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(&cli)?;
    tracing::debug!(storage = ?settings.storage, embedding = ?settings.embedding, "settings loaded");
    let qa = Arc::new(DocQa::from_settings(&settings).await?);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Ingest { paths } => {
            let read = files::read_uploads(&paths);
            if read.files.is_empty() && read.failures.is_empty() {
                println!("No PDF or DOCX files found.");
                return Ok(());
            }
            println!("Collection already contains {} chunks", qa.collection().count().await?);
            let mut report = qa.upload(&read.files).await?;
            report.failures.splice(0..0, read.failures);
            println!("{}", render_report(&report));
        }
        Commands::Ask { question } => {
            let mut session = Session::new(qa);
            let reply = session.ask(&question.join(" ")).await?;
            println!("{}", render_message(reply));
        }
        Commands::Docs => {
            println!("{}", render_documents(&qa.available_documents().await?));
        }
        Commands::Chat => {
            let mut session = Session::new(qa);
            repl::run_repl(&mut session).await?;
        }
    }
    Ok(())
}
