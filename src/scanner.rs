//! Directory scanning for filename search.
//!
//! The walk keeps an explicit worklist of pending directories instead of
//! recursing, so stack depth stays flat on pathologically deep trees. Each
//! directory costs one `read_dir` pass; entry type comes from the directory
//! entry itself and files are stat'ed only after the cheap name filters have
//! passed. Symlinks are never followed.
//!
//! Cancellation is polled per directory and per file. A tripped token stops
//! the walk immediately and the outcome keeps whatever was accumulated;
//! partial results are valid, not an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::cancel::CancelToken;
use crate::query::SearchQuery;
use crate::types::{extension_of, unix_now_secs, FileRecord};

/// Running counters for one folder walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Directories entered.
    pub directories_scanned: usize,
    /// Regular files seen, before filtering.
    pub files_checked: usize,
    /// Files that passed every filter.
    pub files_matched: usize,
    /// Directories whose listing failed and contributed nothing.
    pub errors: usize,
}

/// What a folder walk produced.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Matching records, in traversal order.
    pub records: Vec<FileRecord>,
    pub stats: ScanStats,
    /// False when the cancellation token tripped mid-walk. Incomplete output
    /// must not be written to the cache.
    pub completed: bool,
}

/// Observer invoked as the walk enters each directory.
pub type ScanObserver<'a> = dyn FnMut(&Path, &ScanStats) + 'a;

/// A single folder's filename scan.
pub struct FolderScan<'a> {
    folder: &'a Path,
    query: &'a SearchQuery,
    cancel: &'a CancelToken,
    observer: Option<&'a mut ScanObserver<'a>>,
}

impl<'a> FolderScan<'a> {
    pub fn new(folder: &'a Path, query: &'a SearchQuery, cancel: &'a CancelToken) -> Self {
        Self {
            folder,
            query,
            cancel,
            observer: None,
        }
    }

    /// Registers a per-directory observer, used by pollable sessions to
    /// mirror walk counters into progress state.
    pub fn with_observer(mut self, observer: &'a mut ScanObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs the walk to completion or cancellation.
    pub fn run(self) -> ScanOutcome {
        // Patterns are compiled once per folder and reused for every entry.
        let keywords = self.query.keyword_set();
        let excludes = self.query.exclude_set();
        let folder_name = self.folder.to_string_lossy().into_owned();
        let indexed_at = unix_now_secs();

        let mut observer = self.observer;
        let mut stats = ScanStats::default();
        let mut records: Vec<FileRecord> = Vec::new();
        let mut completed = true;
        let mut pending: Vec<PathBuf> = vec![self.folder.to_path_buf()];

        'walk: while let Some(directory) = pending.pop() {
            if self.cancel.is_cancelled().is_none() {
                completed = false;
                break;
            }
            stats.directories_scanned += 1;
            if let Some(on_directory) = observer.as_deref_mut() {
                on_directory(&directory, &stats);
            }

            let entries = match fs::read_dir(&directory) {
                Ok(entries) => entries,
                Err(error) => {
                    // This subtree contributes zero files; siblings continue.
                    stats.errors += 1;
                    log::debug!("error scanning directory {}: {error}", directory.display());
                    continue;
                }
            };

            for entry in entries {
                let Ok(entry) = entry else {
                    stats.errors += 1;
                    continue;
                };
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };

                if file_type.is_dir() {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    // Exclusion applies to the directory name, not the full
                    // path; one hit prunes the whole subtree.
                    if excludes.matches_any(&name) {
                        continue;
                    }
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    if self.cancel.is_cancelled().is_none() {
                        completed = false;
                        break 'walk;
                    }
                    stats.files_checked += 1;

                    let filename = entry.file_name().to_string_lossy().into_owned();

                    let extension = extension_of(&filename);
                    if !self.query.allows_extension(extension.as_deref()) {
                        continue;
                    }

                    // Filename keywords are OR: any single hit qualifies the
                    // file. (Exclude keywords above are the AND/NOT side.)
                    if !keywords.is_empty() && !keywords.matches_any(&filename) {
                        continue;
                    }

                    // Unreadable timestamps skip the file, never fail the scan.
                    let Some(modified_time) = entry.metadata().ok().and_then(modified_secs)
                    else {
                        continue;
                    };
                    if !self.query.matches_date(modified_time) {
                        continue;
                    }

                    records.push(FileRecord {
                        folder: folder_name.clone(),
                        filename,
                        path: entry.path().to_string_lossy().into_owned(),
                        modified_time,
                        extension,
                        indexed_at,
                    });
                    stats.files_matched = records.len();
                }
                // Symlinks and other entry types are ignored.
            }
        }

        ScanOutcome {
            records,
            stats,
            completed,
        }
    }
}

fn modified_secs(metadata: fs::Metadata) -> Option<i64> {
    let modified = metadata.modified().ok()?;
    match modified.duration_since(UNIX_EPOCH) {
        Ok(duration) => Some(duration.as_secs() as i64),
        Err(earlier) => Some(-(earlier.duration().as_secs() as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchRequest;
    use std::fs::File;
    use tempfile::TempDir;

    fn query(request: SearchRequest) -> SearchQuery {
        request.validate().unwrap()
    }

    fn paths(outcome: &ScanOutcome) -> Vec<String> {
        let mut paths: Vec<String> = outcome
            .records
            .iter()
            .map(|record| record.path.clone())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn keyword_and_extension_filters_select_one_file() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("report_q1.pdf")).unwrap();
        File::create(temp.path().join("notes.txt")).unwrap();

        let query = query(SearchRequest {
            keywords: vec!["report".to_string()],
            extensions: Some(vec![".pdf".to_string()]),
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let outcome = FolderScan::new(temp.path(), &query, &cancel).run();

        assert!(outcome.completed);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.filename, "report_q1.pdf");
        assert_eq!(record.extension.as_deref(), Some("pdf"));
        assert_eq!(record.folder, temp.path().to_string_lossy());
        assert_eq!(outcome.stats.files_checked, 2);
    }

    #[test]
    fn exclude_keywords_prune_whole_subtrees() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("temp_backup")).unwrap();
        fs::create_dir(temp.path().join("reports")).unwrap();
        File::create(temp.path().join("report_q1.pdf")).unwrap();
        File::create(temp.path().join("temp_backup/report_q2.pdf")).unwrap();
        File::create(temp.path().join("reports/report_q3.pdf")).unwrap();

        let query = query(SearchRequest {
            keywords: Vec::new(),
            exclude_keywords: vec!["temp".to_string()],
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let outcome = FolderScan::new(temp.path(), &query, &cancel).run();

        let found = paths(&outcome);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|path| !path.contains("temp_backup")));
        // The pruned subtree's files were never even checked.
        assert_eq!(outcome.stats.files_checked, 2);
    }

    #[test]
    fn filename_keywords_are_or_semantics() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("alpha_notes.txt")).unwrap();
        File::create(temp.path().join("beta_notes.txt")).unwrap();
        File::create(temp.path().join("gamma_notes.txt")).unwrap();

        let query = query(SearchRequest {
            keywords: vec!["alpha".to_string(), "beta".to_string()],
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let outcome = FolderScan::new(temp.path(), &query, &cancel).run();

        let names: Vec<&str> = outcome
            .records
            .iter()
            .map(|record| record.filename.as_str())
            .collect();
        assert_eq!(outcome.records.len(), 2);
        assert!(names.contains(&"alpha_notes.txt"));
        assert!(names.contains(&"beta_notes.txt"));
    }

    #[test]
    fn empty_keywords_match_every_file() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("one.txt")).unwrap();
        File::create(temp.path().join("two.txt")).unwrap();

        let query = query(SearchRequest {
            keywords: Vec::new(),
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let outcome = FolderScan::new(temp.path(), &query, &cancel).run();
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn date_range_filters_against_modified_time() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("fresh.txt")).unwrap();

        let past_only = query(SearchRequest {
            keywords: Vec::new(),
            start_date: Some("2000-01-01".to_string()),
            end_date: Some("2000-12-31".to_string()),
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let outcome = FolderScan::new(temp.path(), &past_only, &cancel).run();
        assert!(outcome.records.is_empty());

        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        let includes_today = query(SearchRequest {
            keywords: Vec::new(),
            start_date: Some(today.clone()),
            end_date: Some(today),
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let outcome = FolderScan::new(temp.path(), &includes_today, &cancel).run();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn pre_cancelled_scan_returns_nothing_and_reports_incomplete() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("file.txt")).unwrap();

        let query = query(SearchRequest {
            keywords: Vec::new(),
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = FolderScan::new(temp.path(), &query, &cancel).run();

        assert!(!outcome.completed);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.directories_scanned, 0);
    }

    #[test]
    fn cancellation_mid_walk_stops_within_the_current_directory() {
        let temp = TempDir::new().unwrap();
        for dir_index in 0..6 {
            let sub = temp.path().join(format!("sub{dir_index}"));
            fs::create_dir(&sub).unwrap();
            for file_index in 0..4 {
                File::create(sub.join(format!("file{file_index}.txt"))).unwrap();
            }
        }

        let query = query(SearchRequest {
            keywords: Vec::new(),
            folders: vec![temp.path().to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let trip_at = 3;
        let cancel_for_observer = cancel.clone();
        let mut observer = move |_directory: &Path, stats: &ScanStats| {
            if stats.directories_scanned == trip_at {
                cancel_for_observer.cancel();
            }
        };
        let outcome = FolderScan::new(temp.path(), &query, &cancel)
            .with_observer(&mut observer)
            .run();

        // The walk notices the trip on the next per-file or per-directory
        // poll: no further directories are entered.
        assert!(!outcome.completed);
        assert_eq!(outcome.stats.directories_scanned, trip_at);
    }

    #[test]
    fn unreadable_directory_is_counted_and_skipped() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("never_created");

        let query = query(SearchRequest {
            keywords: Vec::new(),
            folders: vec![missing.to_string_lossy().into_owned()],
            ..SearchRequest::default()
        });
        let cancel = CancelToken::new();
        let outcome = FolderScan::new(&missing, &query, &cancel).run();

        assert!(outcome.completed);
        assert_eq!(outcome.stats.errors, 1);
        assert!(outcome.records.is_empty());
    }
}
