//! Plain-text rendering for the terminal.
use std::collections::BTreeSet;

use docqa_core::types::{ChatMessage, Role};
use docqa_core::Error;
use docqa_rag::UploadReport;

pub fn render_message(msg: &ChatMessage) -> String {
    match msg.role {
        Role::User => format!("🧑 {}", msg.content),
        Role::Assistant => {
            let mut out = format!("🤖 {}", msg.content);
            if let Some(sources) = &msg.sources {
                out.push_str("\n\n▸ View Sources\n");
                if sources.is_empty() {
                    out.push_str("  (no matching documents)");
                } else {
                    out.push_str(&sources.lines().map(|s| format!("  {s}")).collect::<Vec<_>>().join("\n"));
                }
            }
            out
        }
    }
}

pub fn render_report(report: &UploadReport) -> String {
    let mut lines = vec![format!("Created {} chunks", report.added)];
    for f in &report.indexed_files {
        lines.push(format!("  📄 {f}"));
    }
    for f in &report.skipped {
        lines.push(format!("  ⚠️  skipped {f} (not a PDF/DOCX or no text)"));
    }
    for f in &report.failures {
        lines.push(format!("  ❌ {}: {}", f.filename, f.reason));
    }
    lines.join("\n")
}

pub fn render_documents(docs: &BTreeSet<String>) -> String {
    if docs.is_empty() {
        return "No documents uploaded yet.".to_string();
    }
    docs.iter().map(|d| format!("📄 {d}")).collect::<Vec<_>>().join("\n")
}

/// What the user sees when an action fails.
pub fn render_error(e: &Error) -> String {
    let hint = match e {
        Error::Provider { status: Some(401 | 403), .. } => Some("check provider.api_key or GOOGLE_API_KEY"),
        Error::Provider { status: Some(429), .. } => Some("the provider quota is exhausted, try again later"),
        Error::Provider { status: Some(413), .. } => Some("the request was too large for the provider"),
        Error::Timeout(_) => Some("the provider is slow to answer, try again or raise provider.request_timeout_secs"),
        Error::EmbedderMismatch { .. } => {
            Some("use the embedding model the collection was built with, or a new storage.collection_name")
        }
        _ => None,
    };
    match hint {
        Some(h) => format!("❌ {e}\n   hint: {h}"),
        None => format!("❌ {e}"),
    }
}

/// Unwrap a typed error from an `anyhow` chain when there is one.
pub fn render_any(e: &anyhow::Error) -> String {
    match e.downcast_ref::<Error>() {
        Some(typed) => render_error(typed),
        None => format!("❌ {e:#}"),
    }
}
