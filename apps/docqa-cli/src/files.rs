//! Turn command-line paths into uploads.
use std::path::PathBuf;
use walkdir::WalkDir;

use docqa_core::extract::is_supported;
use docqa_core::types::UploadedFile;
use docqa_rag::UploadFailure;

/// Explicit files are taken as given (unsupported ones get reported by the
/// upload); directories contribute only their PDF/DOCX files.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for p in paths {
        if p.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(p)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| is_supported(&e.file_name().to_string_lossy()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            out.extend(found);
        } else {
            out.push(p.clone());
        }
    }
    out
}

/// Uploads read from disk, plus one failure per path that could not be read.
#[derive(Debug, Default)]
pub struct ReadUploads {
    pub files: Vec<UploadedFile>,
    pub failures: Vec<UploadFailure>,
}

pub fn read_uploads(paths: &[PathBuf]) -> ReadUploads {
    let mut out = ReadUploads::default();
    for path in expand_paths(paths) {
        match UploadedFile::from_path(&path) {
            Ok(file) => out.files.push(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read upload");
                out.failures.push(UploadFailure { filename: path.display().to_string(), reason: e.to_string() });
            }
        }
    }
    out
}
