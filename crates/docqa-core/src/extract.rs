//! Raw text extraction from uploaded PDF and DOCX files.
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Result};
use crate::types::UploadedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Kind from the file name's extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".docx") {
            Some(Self::Docx)
        } else {
            None
        }
    }
}

pub fn is_supported(name: &str) -> bool {
    DocumentKind::from_name(name).is_some()
}

/// Extract the text of one uploaded file.
///
/// Returns `Ok(None)` for unsupported extensions; those are skipped, not failed.
pub fn extract_text(file: &UploadedFile) -> Result<Option<String>> {
    let text = match DocumentKind::from_name(&file.name) {
        Some(DocumentKind::Pdf) => extract_pdf(&file.name, &file.bytes)?,
        Some(DocumentKind::Docx) => extract_docx(&file.name, &file.bytes)?,
        None => {
            tracing::debug!(file = %file.name, "skipping unsupported file type");
            return Ok(None);
        }
    };
    tracing::debug!(file = %file.name, chars = text.chars().count(), "extracted text");
    Ok(Some(text))
}

/// Page texts concatenated in page order.
pub fn extract_pdf(filename: &str, bytes: &[u8]) -> Result<String> {
    // The PDF parser panics on some malformed inputs.
    let pages = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes)))
        .map_err(|_| Error::extraction(filename, "PDF parser panicked on malformed input"))?
        .map_err(|e| Error::extraction(filename, e))?;
    Ok(pages.concat())
}

/// Paragraph texts of `word/document.xml`, in document order, one per line.
pub fn extract_docx(filename: &str, bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::extraction(filename, e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::extraction(filename, e))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::extraction(filename, e))?;
    let paragraphs = docx_paragraphs(&xml).map_err(|e| Error::extraction(filename, e))?;
    Ok(paragraphs.join("\n"))
}

/// Collect the text of every `w:p` element. Runs inside a paragraph are
/// concatenated; `w:tab` and `w:br` become a tab and a newline. A paragraph
/// nested in a text box is emitted on its own, before the paragraph holding it.
pub fn docx_paragraphs(xml: &str) -> std::result::Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:p" => open.push(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => {
                    if let Some(p) = open.last_mut() { p.push('\t'); }
                }
                b"w:br" | b"w:cr" => {
                    if let Some(p) = open.last_mut() { p.push('\n'); }
                }
                _ => {}
            },
            Event::Text(ref e) if in_text => {
                if let Some(p) = open.last_mut() {
                    p.push_str(&e.unescape()?);
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if let Some(p) = open.pop() { paragraphs.push(p); }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}
