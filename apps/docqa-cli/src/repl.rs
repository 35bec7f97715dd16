//! The interactive session loop behind `docqa chat`.
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use docqa_rag::session::Session;

use crate::files::read_uploads;
use crate::render::{render_documents, render_error, render_message, render_report};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Upload(Vec<PathBuf>),
    Process,
    Docs,
    History,
    Reset,
    Help,
    Quit,
    Ask(String),
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::Empty;
        }
        if !input.starts_with('/') {
            return Self::Ask(input.to_string());
        }
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or_default();
        match cmd {
            "/upload" | "/u" => Self::Upload(parts.map(PathBuf::from).collect()),
            "/process" | "/p" => Self::Process,
            "/docs" | "/d" => Self::Docs,
            "/history" => Self::History,
            "/reset" => Self::Reset,
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

fn show_help() {
    println!("Commands:");
    println!("  /upload <paths…>  - Stage PDF/DOCX files or directories");
    println!("  /process          - Index the staged files");
    println!("  /docs             - List available documents");
    println!("  /history          - Show the conversation so far");
    println!("  /reset            - Clear the conversation and staged files");
    println!("  /help             - Show this help message");
    println!("  /quit             - Exit");
    println!("  <question>        - Ask about your documents");
}

fn prompt() -> std::io::Result<()> {
    print!("docqa> ");
    std::io::stdout().flush()
}

pub async fn run_repl(session: &mut Session) -> anyhow::Result<()> {
    println!("💬 Chat With Your Documents");
    println!("Upload your documents and ask questions about them!");
    match session.qa().available_documents().await {
        Ok(docs) => println!("{}", render_documents(&docs)),
        Err(e) => println!("{}", render_error(&e)),
    }
    println!();
    show_help();
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else { break };
        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Help => show_help(),
            ReplCommand::Quit => {
                println!("👋 Goodbye!");
                break;
            }
            ReplCommand::Unknown(cmd) => println!("Unknown command {cmd}, try /help"),
            ReplCommand::Upload(paths) if paths.is_empty() => println!("Usage: /upload <paths…>"),
            ReplCommand::Upload(paths) => {
                let read = read_uploads(&paths);
                for failure in &read.failures {
                    println!("❌ {}: {}", failure.filename, failure.reason);
                }
                let n = read.files.len();
                session.stage(read.files);
                println!("Staged {n} file(s), {} waiting. Run /process to index them.", session.staged().len());
            }
            ReplCommand::Process => {
                if session.staged().is_empty() {
                    println!("Nothing staged, use /upload first.");
                    continue;
                }
                println!("Processing...");
                match session.process_documents().await {
                    Ok(report) => println!("{}\n✅ Done!", render_report(&report)),
                    Err(e) => println!("{}", render_error(&e)),
                }
            }
            ReplCommand::Docs => match session.qa().available_documents().await {
                Ok(docs) => println!("{}", render_documents(&docs)),
                Err(e) => println!("{}", render_error(&e)),
            },
            ReplCommand::History => {
                if session.transcript().is_empty() {
                    println!("No messages yet.");
                }
                for msg in session.transcript() {
                    println!("{}\n", render_message(msg));
                }
            }
            ReplCommand::Reset => {
                session.reset();
                println!("Conversation cleared.");
            }
            ReplCommand::Ask(question) => match session.ask(&question).await {
                Ok(reply) => println!("{}", render_message(reply)),
                Err(e) => println!("{}", render_error(&e)),
            },
        }
        println!();
    }
    Ok(())
}
