//! File discovery and search caching library.
//!
//! This crate provides core file search functionality:
//! - Recursive folder scanning with keyword, extension, and date filters
//! - Persistent file index with TTL-based freshness
//! - Background search sessions with pollable progress
//! - Content search inside plain-text files
//! - Persistent search history with de-duplication

pub mod cancel;
pub mod content;
pub mod error;
pub mod history;
pub mod index;
pub mod progress;
pub mod query;
pub mod scanner;
pub mod search;
pub mod types;

// Re-export main types
pub use cancel::CancelToken;
pub use content::{ContentSearchEngine, FileContentResult};
pub use error::{Result, ScoutError};
pub use history::{HistoryEntry, SearchHistory};
pub use index::FileIndex;
pub use progress::{ProgressTracker, SearchStatus};
pub use query::{SearchQuery, SearchRequest};
pub use search::{SearchEngine, SearchSessions};
pub use types::{FileRecord, IndexStats};
