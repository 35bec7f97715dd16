//! Overlapping fixed-size text windows with natural-boundary cuts.
//!
//! Each window holds at most `chunk_size` characters. Inside a window the cut
//! goes after the latest paragraph break, else line break, else sentence end,
//! else space, as long as the chunk keeps `min_chunk_chars`; otherwise it is a
//! hard cut. The next window starts `chunk_overlap` characters before the cut,
//! so chunks are exact substrings and the input can be rebuilt from them.

use crate::config::ChunkingConfig;
use crate::error::Result;

/// Separator groups, most preferred first. Within a group the latest match wins.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// A chunk and its char offset in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { config: ChunkingConfig::default() }
    }
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text).into_iter().map(|s| s.text).collect()
    }

    pub fn split_with_offsets(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        // Byte offset of every char boundary, plus the end of the string.
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total = bounds.len() - 1;
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut spans = Vec::new();
        let mut offset = 0usize;
        loop {
            if total - offset <= size {
                spans.push(TextSpan { text: text[bounds[offset]..].to_string(), start: offset });
                break;
            }
            let window = &text[bounds[offset]..bounds[offset + size]];
            let cut = self.find_cut(window).unwrap_or(size);
            spans.push(TextSpan { text: text[bounds[offset]..bounds[offset + cut]].to_string(), start: offset });
            offset = (offset + cut.saturating_sub(overlap)).max(offset + 1);
        }
        spans
    }

    /// Char length of the chunk when cutting after the preferred separator.
    fn find_cut(&self, window: &str) -> Option<usize> {
        for group in SEPARATORS {
            let best = group
                .iter()
                .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
                .max();
            if let Some(byte_end) = best {
                let chars = window[..byte_end].chars().count();
                if chars >= self.config.min_chunk_chars {
                    return Some(chars);
                }
            }
        }
        None
    }
}

/// Split with the default 500/50 policy.
pub fn split_text(text: &str) -> Vec<String> {
    Chunker::default().split(text)
}
