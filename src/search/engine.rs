//! Cache-first folder search.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::index::FileIndex;
use crate::query::SearchQuery;
use crate::scanner::{FolderScan, ScanStats};
use crate::search::observer::{SearchObserver, Throttle};
use crate::types::FileRecord;

/// Shortest gap between repeated found-count status lines.
const STATUS_INTERVAL: Duration = Duration::from_millis(200);

/// What one search run produced.
#[derive(Debug)]
pub struct SearchOutput {
    /// Matches across all folders, cache rows and walk finds alike.
    pub records: Vec<FileRecord>,
    /// True when the token tripped before every folder finished.
    pub cancelled: bool,
    /// Folders that had to be walked.
    pub scans_performed: usize,
    /// Folders answered straight from cache.
    pub cache_hits: usize,
    /// Folders dropped because they do not exist.
    pub folders_skipped: usize,
}

/// Orchestrates per-folder searches against the listing cache.
///
/// Each folder is answered from cache while its listing is fresh and walked
/// otherwise; a completed walk refreshes the folder's cache entry before
/// moving on. Folders are processed in request order, one at a time.
pub struct SearchEngine {
    index: Arc<FileIndex>,
}

impl SearchEngine {
    pub fn new(index: Arc<FileIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<FileIndex> {
        &self.index
    }

    /// Runs one search to completion or cancellation.
    ///
    /// Cancellation is polled before each folder and inside walks; a trip
    /// keeps the records gathered so far and skips the cache write for the
    /// folder it interrupted. A cache fault demotes its folder to a fresh
    /// walk, so `run` itself never fails.
    pub fn run(
        &self,
        query: &SearchQuery,
        cancel: &CancelToken,
        observer: &mut dyn SearchObserver,
    ) -> SearchOutput {
        let started = Instant::now();
        let total = query.folders.len();
        let mut throttle = Throttle::new(STATUS_INTERVAL);
        let mut output = SearchOutput {
            records: Vec::new(),
            cancelled: false,
            scans_performed: 0,
            cache_hits: 0,
            folders_skipped: 0,
        };

        for (index, folder) in query.folders.iter().enumerate() {
            if cancel.is_cancelled().is_none() {
                output.cancelled = true;
                break;
            }

            // Missing folders are skipped before they are announced.
            let folder_path = Path::new(folder);
            if !folder_path.is_dir() {
                log::warn!("search skipping missing folder={folder}");
                output.folders_skipped += 1;
                observer.folder_finished(index, &[]);
                continue;
            }

            observer.folder_started(index, total, folder);
            observer.status(&format!(
                "Searching folder {}/{}: {}...",
                index + 1,
                total,
                folder_display_name(folder)
            ));

            let cached = if self.is_cache_fresh(folder) {
                match self.index.query(folder, query) {
                    Ok(rows) => Some(rows),
                    Err(error) => {
                        log::warn!("cache read failed folder={folder} error={error}");
                        None
                    }
                }
            } else {
                None
            };

            let before = output.records.len();
            let folder_records = match cached {
                Some(rows) => {
                    observer.status("Using cached results...");
                    output.cache_hits += 1;
                    rows
                }
                None => {
                    observer.status("Scanning folder...");
                    output.scans_performed += 1;
                    let mut scan_observer = |directory: &Path, stats: &ScanStats| {
                        observer.scan_progress(directory, stats);
                    };
                    let outcome = FolderScan::new(folder_path, query, cancel)
                        .with_observer(&mut scan_observer)
                        .run();
                    // Found-count lines accompany walks only; cache serves
                    // stay quiet past their one status line.
                    for found in (before + 1)..=(before + outcome.records.len()) {
                        if found % 10 == 0 && throttle.ready() {
                            observer.status(&format!("Found {found} files..."));
                        }
                    }
                    // An interrupted or empty walk must not refresh the cache
                    // stamp.
                    if outcome.completed && !outcome.records.is_empty() {
                        if let Err(error) = self.index.replace(folder, &outcome.records) {
                            log::warn!("cache write failed folder={folder} error={error}");
                        }
                    }
                    if !outcome.completed {
                        output.cancelled = true;
                    }
                    outcome.records
                }
            };

            output.records.extend(folder_records);
            observer.folder_finished(index, &output.records[before..]);

            if output.cancelled {
                break;
            }
        }

        let found = output.records.len();
        if output.cancelled {
            observer.status(&format!("Search cancelled: {found} files found"));
        } else {
            observer.status(&format!("Search completed: {found} files found"));
        }
        log::info!(
            "search finished folders={} found={} scans={} cache_hits={} skipped={} cancelled={} elapsed_ms={}",
            total,
            found,
            output.scans_performed,
            output.cache_hits,
            output.folders_skipped,
            output.cancelled,
            started.elapsed().as_millis(),
        );
        output
    }

    /// A freshness check that cannot be answered counts as stale.
    fn is_cache_fresh(&self, folder: &str) -> bool {
        match self.index.is_fresh(folder) {
            Ok(fresh) => fresh,
            Err(error) => {
                log::warn!("cache freshness check failed folder={folder} error={error}");
                false
            }
        }
    }
}

fn folder_display_name(folder: &str) -> String {
    Path::new(folder)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.to_string())
}
