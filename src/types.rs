//! Core record types shared across the engine.
//!
//! These are the durable shapes: what the persistent index stores and what
//! searches return. Callers embedding the engine serialize them directly.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One discovered file, as stored in the persistent index and returned from
/// searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Root folder the search that found this file was run against.
    pub folder: String,
    /// Base name of the file.
    pub filename: String,
    /// Absolute path. Unique per record.
    pub path: String,
    /// Modification time, Unix seconds.
    pub modified_time: i64,
    /// Extension, lowercase without the dot. None when the name has none.
    pub extension: Option<String>,
    /// Unix seconds of the cache write that produced this record. Refreshed
    /// only by a full re-scan of `folder`, never partially.
    pub indexed_at: i64,
}

/// Aggregate statistics over the persistent index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Total records across all folders.
    pub total_files: u64,
    /// Distinct folders with at least one record.
    pub total_folders: u64,
    /// Oldest `indexed_at` present, Unix seconds.
    pub oldest_indexed_at: Option<i64>,
    /// Newest `indexed_at` present, Unix seconds.
    pub newest_indexed_at: Option<i64>,
}

/// Returns the current Unix timestamp in seconds.
pub fn unix_now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs() as i64)
        .unwrap_or(0)
}

/// Extracts a filename's extension: lowercase, no dot, None when absent.
///
/// Dotfiles like `.gitignore` and trailing-dot names like `draft.` have no
/// extension.
pub fn extension_of(filename: &str) -> Option<String> {
    let extension = Path::new(filename).extension()?.to_str()?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_lowercase())
    }
}
