//! File readers that produce matchable text segments.

use std::fs;
use std::path::Path;

use crate::content::TextSegment;
use crate::error::Result;

/// Extracts text segments from files of the formats it claims.
///
/// Implementations run on pool worker threads, one file per call.
pub trait ContentReader: Send + Sync {
    /// Whether this reader takes files with `extension` (lowercase, no dot).
    fn handles(&self, extension: &str) -> bool;

    /// Reads one file into located segments.
    fn read(&self, path: &Path) -> Result<Vec<TextSegment>>;
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "log", "csv", "json", "xml", "yaml", "yml", "toml",
];

/// Line-oriented reader for plain text formats.
///
/// Bytes are decoded lossily, so a stray invalid sequence degrades to the
/// replacement character instead of failing the file. Blank lines produce
/// no segments.
#[derive(Debug, Default)]
pub struct PlainTextReader;

impl PlainTextReader {
    pub fn new() -> Self {
        Self
    }
}

impl ContentReader for PlainTextReader {
    fn handles(&self, extension: &str) -> bool {
        TEXT_EXTENSIONS.contains(&extension)
    }

    fn read(&self, path: &Path) -> Result<Vec<TextSegment>> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| TextSegment {
                location: format!("line {}", index + 1),
                text: line.to_string(),
            })
            .collect())
    }
}
