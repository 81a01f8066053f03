//! Background search sessions with pollable progress.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::error::{lock_poisoned_error, Result};
use crate::history::SearchHistory;
use crate::progress::{ProgressReport, ProgressTracker, SearchStatus};
use crate::query::{SearchQuery, SearchRequest};
use crate::scanner::ScanStats;
use crate::search::engine::SearchEngine;
use crate::search::observer::SearchObserver;
use crate::types::FileRecord;

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Runs searches on background threads and tracks them by id.
///
/// `start` hands back a fresh id immediately; the search itself reports
/// into the shared [`ProgressTracker`], where pollers pick it up. Session
/// threads are never joined; a panic inside one is caught and surfaced as
/// an error state on the tracker instead of a dead silent session.
pub struct SearchSessions {
    engine: Arc<SearchEngine>,
    tracker: Arc<ProgressTracker>,
    history: Option<Arc<SearchHistory>>,
    sessions: Mutex<HashMap<String, CancelToken>>,
}

impl SearchSessions {
    pub fn new(engine: Arc<SearchEngine>, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            engine,
            tracker,
            history: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Wires in a history store; every accepted request gets recorded there
    /// before its session id is handed back.
    pub fn with_history(mut self, history: Arc<SearchHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Validates the request and launches it in the background. Returns the
    /// session id to poll and cancel with.
    pub fn start(&self, request: SearchRequest) -> Result<String> {
        let query = request.clone().validate()?;
        if let Some(history) = &self.history {
            // A history fault never blocks the search itself.
            if let Err(error) = history.record(&request) {
                log::warn!("history record failed error={error}");
            }
        }
        let total = query.folders.len();
        let search_id = Uuid::new_v4().to_string();
        let cancel = CancelToken::new();

        self.tracker.start(&search_id, total)?;
        {
            let mut sessions = self.lock_sessions()?;
            sessions.insert(search_id.clone(), cancel.clone());
        }

        let engine = Arc::clone(&self.engine);
        let tracker = Arc::clone(&self.tracker);
        let session_id = search_id.clone();
        thread::spawn(move || {
            // Catch panics so the tracker always reaches a terminal state.
            let run = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run_session(&engine, &tracker, &session_id, &query, &cancel)
            }));
            match run {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    log::warn!("search session failed id={session_id} error={error}");
                    if let Err(tracker_error) = tracker.fail(&session_id, &error.to_string()) {
                        log::warn!(
                            "search session state update failed id={session_id} error={tracker_error}"
                        );
                    }
                }
                Err(panic_info) => {
                    let message = if let Some(text) = panic_info.downcast_ref::<&str>() {
                        text.to_string()
                    } else if let Some(text) = panic_info.downcast_ref::<String>() {
                        text.clone()
                    } else {
                        "search thread panicked".to_string()
                    };
                    log::warn!("search session panicked id={session_id} error={message}");
                    let _ = tracker.fail(&session_id, &format!("panic during search: {message}"));
                }
            }
        });

        log::info!("search session started id={search_id} folders={total}");
        Ok(search_id)
    }

    /// Current snapshot of a session. None when the id is unknown or the
    /// session was cleaned up.
    pub fn poll(&self, search_id: &str) -> Result<Option<ProgressReport>> {
        self.tracker.get(search_id)
    }

    /// Trips a session's cancellation token. The session drains to the
    /// cancelled state on its own; this only requests it. Returns false
    /// when the id is unknown.
    pub fn cancel(&self, search_id: &str) -> Result<bool> {
        let sessions = self.lock_sessions()?;
        match sessions.get(search_id) {
            Some(token) => {
                token.cancel();
                log::info!("search session cancel requested id={search_id}");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drops a session's token and tracked state. Cleaning up a session
    /// that is still running detaches it: later updates from its thread
    /// land nowhere. Returns false when nothing was removed.
    pub fn cleanup(&self, search_id: &str) -> Result<bool> {
        let removed = {
            let mut sessions = self.lock_sessions()?;
            sessions.remove(search_id).is_some()
        };
        let tracked = self.tracker.remove(search_id)?;
        Ok(removed || tracked)
    }

    /// Ids of sessions that have not reached a terminal state.
    pub fn active(&self) -> Result<Vec<String>> {
        self.tracker.active()
    }

    /// Blocks until the session reaches a terminal state or the timeout
    /// passes. Returns false on timeout or unknown id.
    pub fn wait(&self, search_id: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.tracker.get(search_id)? {
                Some(report) if report.status.is_terminal() => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(WAIT_POLL);
        }
    }

    /// Requests cancellation of every live session, for process shutdown.
    pub fn shutdown(&self) -> Result<()> {
        let sessions = self.lock_sessions()?;
        for token in sessions.values() {
            token.cancel();
        }
        log::info!("search sessions shutdown tokens_tripped={}", sessions.len());
        Ok(())
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<String, CancelToken>>> {
        self.sessions
            .lock()
            .map_err(|_| lock_poisoned_error("search sessions"))
    }
}

fn run_session(
    engine: &SearchEngine,
    tracker: &ProgressTracker,
    search_id: &str,
    query: &SearchQuery,
    cancel: &CancelToken,
) -> Result<()> {
    let mut observer = TrackerObserver {
        tracker,
        search_id,
        found_base: 0,
        directories_base: 0,
        checked_base: 0,
    };
    let output = engine.run(query, cancel, &mut observer);
    let status = if output.cancelled {
        SearchStatus::Cancelled
    } else {
        SearchStatus::Completed
    };
    tracker.complete(search_id, status)?;
    Ok(())
}

/// Mirrors engine events into the shared tracker.
struct TrackerObserver<'a> {
    tracker: &'a ProgressTracker,
    search_id: &'a str,
    found_base: usize,
    directories_base: usize,
    checked_base: usize,
}

impl SearchObserver for TrackerObserver<'_> {
    fn folder_started(&mut self, index: usize, _total: usize, folder: &str) {
        let mut base = (0usize, 0usize, 0usize);
        let _ = self.tracker.update(self.search_id, |progress| {
            progress.status = SearchStatus::Scanning;
            progress.current_directory = Some(folder.to_string());
            progress.folders_completed = index;
            base = (
                progress.files_found,
                progress.directories_scanned,
                progress.files_checked,
            );
        });
        self.found_base = base.0;
        self.directories_base = base.1;
        self.checked_base = base.2;
    }

    fn scan_progress(&mut self, directory: &Path, stats: &ScanStats) {
        let found = self.found_base + stats.files_matched;
        let directories = self.directories_base + stats.directories_scanned;
        let checked = self.checked_base + stats.files_checked;
        let current = directory.to_string_lossy().into_owned();
        let _ = self.tracker.update(self.search_id, |progress| {
            progress.current_directory = Some(current);
            progress.files_found = found;
            progress.directories_scanned = directories;
            progress.files_checked = checked;
        });
    }

    fn folder_finished(&mut self, index: usize, records: &[FileRecord]) {
        let _ = self.tracker.add_results(self.search_id, records);
        let _ = self.tracker.update(self.search_id, |progress| {
            progress.folders_completed = index + 1;
        });
    }
}
