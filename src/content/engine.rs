//! Worker pool driving content search across many files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::cancel::CancelToken;
use crate::content::{ContentMatch, ContentReader, FileContentResult, PlainTextReader};
use crate::error::{lock_poisoned_error, Result, ScoutError};
use crate::query::KeywordSet;
use crate::types::extension_of;

/// How long the collector waits for a completion before polling the token.
const COMPLETION_POLL: Duration = Duration::from_millis(100);

/// Longest snippet carried back to the caller, in characters.
const MAX_SNIPPET_CHARS: usize = 200;

/// Pool-backed content search over a set of readers.
///
/// The pool is built lazily on the first search and torn down by
/// [`shutdown`](Self::shutdown); a later search simply builds a new one.
/// Worker count is half the CPUs, at least one.
pub struct ContentSearchEngine {
    readers: Vec<Arc<dyn ContentReader>>,
    pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
    workers: usize,
}

impl ContentSearchEngine {
    pub fn new() -> Self {
        Self::with_readers(vec![Arc::new(PlainTextReader::new())])
    }

    /// Builds an engine with a caller-chosen reader set. Readers are tried
    /// in order; the first to claim a file's extension gets it.
    pub fn with_readers(readers: Vec<Arc<dyn ContentReader>>) -> Self {
        Self {
            readers,
            pool: Mutex::new(None),
            workers: (num_cpus::get() / 2).max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Searches every file for the keywords, fanning files out across the
    /// pool.
    ///
    /// Only files with at least one match or a failure appear in the
    /// output; unreadable files carry an error message instead of matches.
    /// Completion order is nondeterministic. A tripped token stops
    /// collection and returns whatever finished; with no keywords nothing
    /// is read at all.
    pub fn search(
        &self,
        files: &[PathBuf],
        keywords: &[String],
        case_sensitive: bool,
        cancel: &CancelToken,
        mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<Vec<FileContentResult>> {
        if files.is_empty() || keywords.is_empty() || cancel.is_set() {
            return Ok(Vec::new());
        }

        let pool = self.ensure_pool()?;
        let keyword_set = Arc::new(KeywordSet::compile(keywords, case_sensitive));
        let (sender, receiver) = crossbeam_channel::unbounded::<FileContentResult>();
        let total = files.len();

        for path in files {
            let sender = sender.clone();
            let keyword_set = Arc::clone(&keyword_set);
            let readers = self.readers.clone();
            let cancel = cancel.clone();
            let path = path.clone();
            pool.spawn(move || {
                // Queued work becomes a no-op once the token trips.
                if cancel.is_set() {
                    return;
                }
                let _ = sender.send(process_file(&path, &readers, &keyword_set));
            });
        }
        drop(sender);

        let mut results = Vec::new();
        let mut processed = 0usize;
        loop {
            match receiver.recv_timeout(COMPLETION_POLL) {
                Ok(outcome) => {
                    processed += 1;
                    // Clean no-match files contribute nothing.
                    if !outcome.matches.is_empty() || outcome.error.is_some() {
                        results.push(outcome);
                    }
                    if let Some(on_progress) = on_progress.as_mut() {
                        on_progress(processed, total);
                    }
                    if processed == total || cancel.is_cancelled().is_none() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled().is_none() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(results)
    }

    /// Tears the pool down. Safe to call repeatedly or before any search;
    /// in-flight work finishes in the background.
    pub fn shutdown(&self) -> Result<()> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|_| lock_poisoned_error("content search pool"))?;
        if pool.take().is_some() {
            log::debug!("content search pool shut down");
        }
        Ok(())
    }

    fn ensure_pool(&self) -> Result<Arc<rayon::ThreadPool>> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|_| lock_poisoned_error("content search pool"))?;
        match pool.as_ref() {
            Some(existing) => Ok(Arc::clone(existing)),
            None => {
                let built = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.workers)
                    .thread_name(|index| format!("content-search-{index}"))
                    .build()
                    .map_err(|error| ScoutError::Internal(error.to_string()))?;
                let shared = Arc::new(built);
                *pool = Some(Arc::clone(&shared));
                log::debug!("content search pool started workers={}", self.workers);
                Ok(shared)
            }
        }
    }
}

impl Default for ContentSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn process_file(
    path: &Path,
    readers: &[Arc<dyn ContentReader>],
    keywords: &KeywordSet,
) -> FileContentResult {
    let path_string = path.to_string_lossy().into_owned();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Some(extension) = extension_of(&filename) else {
        return FileContentResult {
            path: path_string,
            matches: Vec::new(),
            error: Some("file has no extension".to_string()),
        };
    };
    let Some(reader) = readers.iter().find(|reader| reader.handles(&extension)) else {
        return FileContentResult {
            path: path_string,
            matches: Vec::new(),
            error: Some(format!("no reader for .{extension} files")),
        };
    };

    match reader.read(path) {
        Ok(segments) => {
            let matches = segments
                .iter()
                .filter_map(|segment| {
                    // First keyword to hit a segment claims it.
                    keywords.first_match(&segment.text).map(|keyword| ContentMatch {
                        keyword: keyword.to_string(),
                        location: segment.location.clone(),
                        snippet: snippet_of(&segment.text),
                    })
                })
                .collect();
            FileContentResult {
                path: path_string,
                matches,
                error: None,
            }
        }
        Err(error) => FileContentResult {
            path: path_string,
            matches: Vec::new(),
            error: Some(error.to_string()),
        },
    }
}

fn snippet_of(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((byte_offset, _)) => trimmed[..byte_offset].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(temp: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn search_sorted(
        engine: &ContentSearchEngine,
        files: &[PathBuf],
        keywords: &[&str],
    ) -> Vec<FileContentResult> {
        let keywords: Vec<String> = keywords.iter().map(|keyword| keyword.to_string()).collect();
        let cancel = CancelToken::new();
        let mut results = engine
            .search(files, &keywords, false, &cancel, None)
            .unwrap();
        results.sort_by(|a, b| a.path.cmp(&b.path));
        results
    }

    #[test]
    fn finds_keywords_with_line_locations() {
        let temp = TempDir::new().unwrap();
        let path = write_file(
            &temp,
            "notes.txt",
            "nothing here\nbudget figures attached\nsee the budget answer\n",
        );
        let engine = ContentSearchEngine::new();

        let results = search_sorted(&engine, &[path], &["budget"]);
        assert_eq!(results.len(), 1);
        let outcome = &results[0];
        assert!(outcome.error.is_none());
        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.matches[0].location, "line 2");
        assert_eq!(outcome.matches[0].snippet, "budget figures attached");
        assert_eq!(outcome.matches[1].location, "line 3");
    }

    #[test]
    fn first_listed_keyword_claims_the_segment() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "both.txt", "alpha and beta on one line\n");
        let engine = ContentSearchEngine::new();

        let results = search_sorted(&engine, &[path], &["beta", "alpha"]);
        assert_eq!(results[0].matches.len(), 1);
        assert_eq!(results[0].matches[0].keyword, "beta");
    }

    #[test]
    fn matching_ignores_case_and_keeps_requested_casing() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "report.md", "the ANNUAL summary\n");
        let engine = ContentSearchEngine::new();

        let results = search_sorted(&engine, &[path], &["Annual"]);
        assert_eq!(results[0].matches.len(), 1);
        assert_eq!(results[0].matches[0].keyword, "Annual");
    }

    #[test]
    fn long_segments_are_capped() {
        let temp = TempDir::new().unwrap();
        let line = format!("  target {}  ", "x".repeat(400));
        let path = write_file(&temp, "big.log", &line);
        let engine = ContentSearchEngine::new();

        let results = search_sorted(&engine, &[path], &["target"]);
        let snippet = &results[0].matches[0].snippet;
        assert_eq!(snippet.chars().count(), MAX_SNIPPET_CHARS);
        assert!(snippet.starts_with("target"));
    }

    #[test]
    fn clean_no_match_files_contribute_nothing() {
        let temp = TempDir::new().unwrap();
        let with_match = write_file(&temp, "a.txt", "budget line\n");
        let without_match = write_file(&temp, "b.txt", "unrelated\n");
        let unsupported = write_file(&temp, "c.bin", "budget bytes");
        let engine = ContentSearchEngine::new();

        let results = search_sorted(
            &engine,
            &[with_match, without_match.clone(), unsupported],
            &["budget"],
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].matches.len(), 1);
        assert!(results[0].error.is_none());
        assert_eq!(
            results[1].error.as_deref(),
            Some("no reader for .bin files")
        );
        let no_match_path = without_match.to_string_lossy().into_owned();
        assert!(results.iter().all(|outcome| outcome.path != no_match_path));
    }

    #[test]
    fn case_sensitive_content_matching_respects_casing() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "memo.txt", "the Budget figures\n");
        let engine = ContentSearchEngine::new();
        let cancel = CancelToken::new();
        let keywords = vec!["budget".to_string()];

        let strict = engine
            .search(&[path.clone()], &keywords, true, &cancel, None)
            .unwrap();
        assert!(strict.is_empty());

        let relaxed = engine
            .search(&[path], &keywords, false, &cancel, None)
            .unwrap();
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed[0].matches[0].keyword, "budget");
    }

    #[test]
    fn unreadable_files_report_an_error_entry() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.txt");
        let engine = ContentSearchEngine::new();

        let results = search_sorted(&engine, &[missing], &["budget"]);
        assert_eq!(results.len(), 1);
        assert!(results[0].error.is_some());
        assert!(results[0].matches.is_empty());
    }

    #[test]
    fn pre_cancelled_search_reads_nothing() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "a.txt", "budget\n");
        let engine = ContentSearchEngine::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let results = engine
            .search(&[path], &["budget".to_string()], false, &cancel, None)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn empty_keywords_short_circuit() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "a.txt", "anything\n");
        let engine = ContentSearchEngine::new();
        let cancel = CancelToken::new();

        let results = engine.search(&[path], &[], false, &cancel, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn progress_callback_sees_every_completion() {
        let temp = TempDir::new().unwrap();
        let files = vec![
            write_file(&temp, "a.txt", "budget\n"),
            write_file(&temp, "b.txt", "budget\n"),
            write_file(&temp, "c.txt", "budget\n"),
        ];
        let engine = ContentSearchEngine::new();
        let cancel = CancelToken::new();
        let keywords = vec!["budget".to_string()];

        let mut seen: Vec<(usize, usize)> = Vec::new();
        let mut observer = |done: usize, total: usize| seen.push((done, total));
        engine
            .search(&files, &keywords, false, &cancel, Some(&mut observer))
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last(), Some(&(3, 3)));
    }

    #[test]
    fn shutdown_is_idempotent_and_pool_rebuilds() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "a.txt", "budget\n");
        let engine = ContentSearchEngine::new();

        let results = search_sorted(&engine, &[path.clone()], &["budget"]);
        assert_eq!(results.len(), 1);

        engine.shutdown().unwrap();
        engine.shutdown().unwrap();

        let results = search_sorted(&engine, &[path], &["budget"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matches.len(), 1);
    }
}
