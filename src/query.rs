//! Search queries: wire shape, boundary validation, and compiled filters.
//!
//! Requests arrive from an API or CLI layer as [`SearchRequest`] and are
//! validated into a [`SearchQuery`] before any I/O: dates must parse and be
//! ordered, and the extension allow-set is normalized so the scan path and
//! the cache path agree on it.

mod date_range;
mod matcher;

// Re-export main types
pub use date_range::DateRange;
pub use matcher::KeywordSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Caller-supplied search criteria, exactly as they cross the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Keywords matched against filenames.
    pub keywords: Vec<String>,
    /// Keywords matched against directory names; a hit prunes the subtree.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Earliest modification date, `YYYY-MM-DD`.
    #[serde(default)]
    pub start_date: Option<String>,
    /// Latest modification date, `YYYY-MM-DD`, inclusive of the whole day.
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Extension allow-set. None (or empty) means all extensions.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// Root folders to search, processed in order.
    pub folders: Vec<String>,
}

impl SearchRequest {
    /// Validates the request into a query. Rejects malformed or reversed
    /// dates synchronously, before any filesystem or store access.
    pub fn validate(self) -> Result<SearchQuery> {
        let date_range = DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?;
        let extensions = normalize_extensions(self.extensions);

        Ok(SearchQuery {
            keywords: self.keywords,
            exclude_keywords: self.exclude_keywords,
            case_sensitive: self.case_sensitive,
            extensions,
            date_range,
            folders: self.folders,
        })
    }
}

/// A validated search: dates parsed, extensions normalized.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub case_sensitive: bool,
    /// Allow-set entries, lowercase without the dot. None means no filter.
    pub extensions: Option<Vec<String>>,
    pub date_range: Option<DateRange>,
    pub folders: Vec<String>,
}

impl SearchQuery {
    /// Compiles the filename keyword patterns.
    pub fn keyword_set(&self) -> KeywordSet {
        KeywordSet::compile(&self.keywords, self.case_sensitive)
    }

    /// Compiles the directory exclusion patterns.
    pub fn exclude_set(&self) -> KeywordSet {
        KeywordSet::compile(&self.exclude_keywords, self.case_sensitive)
    }

    /// Applies the extension allow-set to a file's extension.
    ///
    /// With a configured allow-set, extensionless files never pass.
    pub fn allows_extension(&self, extension: Option<&str>) -> bool {
        match (&self.extensions, extension) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(allowed), Some(found)) => allowed.iter().any(|entry| entry == found),
        }
    }

    /// Applies the date range to a modification timestamp.
    pub fn matches_date(&self, modified_time: i64) -> bool {
        match &self.date_range {
            Some(range) => range.matches(modified_time),
            None => true,
        }
    }
}

/// Normalizes allow-set entries to the stored extension form: leading dot
/// stripped, lowercased, empties dropped. An empty set collapses to None.
fn normalize_extensions(extensions: Option<Vec<String>>) -> Option<Vec<String>> {
    let entries = extensions?;
    let normalized: Vec<String> = entries
        .iter()
        .map(|entry| entry.trim().trim_start_matches('.').to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
