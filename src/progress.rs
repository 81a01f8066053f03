//! Shared progress state for pollable searches.
//!
//! Background search threads write into a [`ProgressTracker`] keyed by
//! search id; pollers read point-in-time [`ProgressReport`] snapshots out
//! of it. One mutex guards the whole registry. Terminal states are
//! absorbing: once a search completes, is cancelled, or fails, further
//! updates are ignored until the entry is removed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::{lock_poisoned_error, Result};
use crate::types::{unix_now_secs, FileRecord};

/// Lifecycle of a pollable search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Starting,
    Scanning,
    Completed,
    Cancelled,
    Error,
}

impl SearchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SearchStatus::Completed | SearchStatus::Cancelled | SearchStatus::Error
        )
    }
}

/// Live state for one search.
#[derive(Debug, Clone)]
pub struct SearchProgress {
    pub search_id: String,
    pub status: SearchStatus,
    pub total_folders: usize,
    pub folders_completed: usize,
    /// Directory currently being processed. Cleared when the search ends.
    pub current_directory: Option<String>,
    pub files_found: usize,
    pub directories_scanned: usize,
    pub files_checked: usize,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
    /// Results accumulated so far, available to pollers mid-search.
    pub results: Vec<FileRecord>,
}

impl SearchProgress {
    fn new(search_id: String, total_folders: usize) -> Self {
        Self {
            search_id,
            status: SearchStatus::Starting,
            total_folders,
            folders_completed: 0,
            current_directory: None,
            files_found: 0,
            directories_scanned: 0,
            files_checked: 0,
            started_at: unix_now_secs(),
            completed_at: None,
            error: None,
            results: Vec::new(),
        }
    }

    /// Seconds from start to completion, or to now while still running.
    pub fn elapsed_seconds(&self) -> i64 {
        self.completed_at.unwrap_or_else(unix_now_secs) - self.started_at
    }

    /// Estimated seconds left, a linear projection from folders completed
    /// so far. None until the first folder finishes.
    pub fn estimated_remaining(&self) -> Option<f64> {
        if self.folders_completed == 0 {
            return None;
        }
        let per_folder = self.elapsed_seconds() as f64 / self.folders_completed as f64;
        let remaining = self.total_folders.saturating_sub(self.folders_completed);
        Some(per_folder * remaining as f64)
    }

    fn report(&self) -> ProgressReport {
        ProgressReport {
            search_id: self.search_id.clone(),
            status: self.status,
            total_folders: self.total_folders,
            folders_completed: self.folders_completed,
            current_directory: self.current_directory.clone(),
            files_found: self.files_found,
            directories_scanned: self.directories_scanned,
            files_checked: self.files_checked,
            started_at: self.started_at,
            completed_at: self.completed_at,
            elapsed_seconds: self.elapsed_seconds(),
            estimated_remaining: self.estimated_remaining(),
            error: self.error.clone(),
            results_count: self.results.len(),
            results: self.results.clone(),
        }
    }
}

/// Point-in-time view of one search, as handed to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub search_id: String,
    pub status: SearchStatus,
    pub total_folders: usize,
    pub folders_completed: usize,
    pub current_directory: Option<String>,
    pub files_found: usize,
    pub directories_scanned: usize,
    pub files_checked: usize,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub elapsed_seconds: i64,
    pub estimated_remaining: Option<f64>,
    pub error: Option<String>,
    pub results_count: usize,
    pub results: Vec<FileRecord>,
}

/// Registry of in-flight searches, shared across threads.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    searches: Mutex<HashMap<String, SearchProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a search in the starting state. A reused id restarts its
    /// state from scratch.
    pub fn start(&self, search_id: &str, total_folders: usize) -> Result<()> {
        let mut searches = self.lock()?;
        searches.insert(
            search_id.to_string(),
            SearchProgress::new(search_id.to_string(), total_folders),
        );
        Ok(())
    }

    /// Applies `apply` to a live search's state. Returns false when the id
    /// is unknown or the search already ended.
    pub fn update<F>(&self, search_id: &str, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut SearchProgress),
    {
        let mut searches = self.lock()?;
        match live_entry(&mut searches, search_id) {
            Some(progress) => {
                apply(progress);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Appends a result batch and refreshes the found counter. Returns
    /// false when the id is unknown or the search already ended.
    pub fn add_results(&self, search_id: &str, records: &[FileRecord]) -> Result<bool> {
        let mut searches = self.lock()?;
        match live_entry(&mut searches, search_id) {
            Some(progress) => {
                progress.results.extend_from_slice(records);
                progress.files_found = progress.results.len();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Moves a search into a terminal state and stamps completion. The
    /// status passed in should be one of the terminal variants. Returns
    /// false when the id is unknown or the search already ended.
    pub fn complete(&self, search_id: &str, status: SearchStatus) -> Result<bool> {
        let mut searches = self.lock()?;
        match live_entry(&mut searches, search_id) {
            Some(progress) => {
                progress.status = status;
                progress.completed_at = Some(unix_now_secs());
                progress.current_directory = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Records a failure with its message and stamps completion. Returns
    /// false when the id is unknown or the search already ended.
    pub fn fail(&self, search_id: &str, error: &str) -> Result<bool> {
        let mut searches = self.lock()?;
        match live_entry(&mut searches, search_id) {
            Some(progress) => {
                progress.status = SearchStatus::Error;
                progress.error = Some(error.to_string());
                progress.completed_at = Some(unix_now_secs());
                progress.current_directory = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Snapshot for polling. None when the id is unknown.
    pub fn get(&self, search_id: &str) -> Result<Option<ProgressReport>> {
        let searches = self.lock()?;
        Ok(searches.get(search_id).map(SearchProgress::report))
    }

    /// Drops a search's state. Returns false when the id is unknown.
    pub fn remove(&self, search_id: &str) -> Result<bool> {
        let mut searches = self.lock()?;
        Ok(searches.remove(search_id).is_some())
    }

    /// Ids of searches that have not reached a terminal state.
    pub fn active(&self) -> Result<Vec<String>> {
        let searches = self.lock()?;
        Ok(searches
            .values()
            .filter(|progress| !progress.status.is_terminal())
            .map(|progress| progress.search_id.clone())
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SearchProgress>>> {
        self.searches
            .lock()
            .map_err(|_| lock_poisoned_error("progress tracker"))
    }
}

/// Terminal entries are absorbing, so mutation only sees live ones.
fn live_entry<'a>(
    searches: &'a mut HashMap<String, SearchProgress>,
    search_id: &str,
) -> Option<&'a mut SearchProgress> {
    searches
        .get_mut(search_id)
        .filter(|progress| !progress.status.is_terminal())
}
