//! Inside-the-file keyword search.
//!
//! Readers turn files into located text segments (a line of a log file, a
//! cell of a spreadsheet) and the engine fans segment matching out across a
//! worker pool. Matching is deliberately coarse: the first keyword to hit a
//! segment wins and the segment yields one match.

mod engine;
mod reader;

// Re-export main types
pub use engine::ContentSearchEngine;
pub use reader::{ContentReader, PlainTextReader};

use serde::Serialize;

/// One matchable piece of a file, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Human-readable position, e.g. `line 42` or `Sheet1!B7`.
    pub location: String,
    pub text: String,
}

/// A keyword hit inside a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMatch {
    /// The keyword that hit, in its original casing.
    pub keyword: String,
    pub location: String,
    /// The matched segment, trimmed and length-capped.
    pub snippet: String,
}

/// Everything content search has to say about one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileContentResult {
    pub path: String,
    pub matches: Vec<ContentMatch>,
    /// Set when the file could not be read; `matches` is empty then.
    pub error: Option<String>,
}
