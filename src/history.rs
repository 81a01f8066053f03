//! Persistent, deduplicated search history.
//!
//! Every recorded search is keyed by an FNV-1a fingerprint of its keyword
//! and folder lists, so repeating a search bumps its use counter instead of
//! growing the table. The table is capped: once it holds more than
//! [`MAX_HISTORY_ENTRIES`], the least recently used entries are evicted in
//! the same write transaction that inserted the newcomer.

use std::hash::Hasher;
use std::path::Path;

use fnv::FnvHasher;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{codec_error, store_error, Result};
use crate::query::SearchRequest;
use crate::types::unix_now_secs;

/// Most entries the history table will hold.
pub const MAX_HISTORY_ENTRIES: usize = 20;

const HISTORY: TableDefinition<u64, &[u8]> = TableDefinition::new("search_history");

/// One remembered search, carrying the full requested criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Stable id derived from keywords and folders.
    pub id: String,
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub folders: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub case_sensitive: bool,
    pub extensions: Option<Vec<String>>,
    pub created_at: i64,
    pub last_used_at: i64,
    /// How many times this exact search has been run.
    pub search_count: u64,
}

/// Recently-run searches, most recent first.
pub struct SearchHistory {
    db: Database,
}

impl SearchHistory {
    /// Opens (or creates) the history store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(store_error)?;
        let init = db.begin_write().map_err(store_error)?;
        {
            init.open_table(HISTORY).map_err(store_error)?;
        }
        init.commit().map_err(store_error)?;
        Ok(Self { db })
    }

    /// Records a search, deduplicating on (keywords, folders).
    ///
    /// A repeat bumps `search_count`, refreshes the last-used stamp, and
    /// takes the latest run's remaining criteria; a new entry may push the
    /// least recently used one out. Returns the entry id.
    pub fn record(&self, request: &SearchRequest) -> Result<String> {
        self.record_at(request, unix_now_secs())
    }

    fn record_at(&self, request: &SearchRequest, now: i64) -> Result<String> {
        let key = entry_key(&request.keywords, &request.folders);
        let id = entry_id(key);
        let txn = self.db.begin_write().map_err(store_error)?;
        {
            let mut table = txn.open_table(HISTORY).map_err(store_error)?;
            let previous: Option<HistoryEntry> = match table.get(key).map_err(store_error)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let entry = match previous {
                Some(mut entry) => {
                    entry.search_count += 1;
                    entry.last_used_at = now;
                    // Identity is (keywords, folders); the remaining criteria
                    // follow the most recent run.
                    entry.exclude_keywords = request.exclude_keywords.clone();
                    entry.start_date = request.start_date.clone();
                    entry.end_date = request.end_date.clone();
                    entry.case_sensitive = request.case_sensitive;
                    entry.extensions = request.extensions.clone();
                    entry
                }
                None => HistoryEntry {
                    id: id.clone(),
                    keywords: request.keywords.clone(),
                    exclude_keywords: request.exclude_keywords.clone(),
                    folders: request.folders.clone(),
                    start_date: request.start_date.clone(),
                    end_date: request.end_date.clone(),
                    case_sensitive: request.case_sensitive,
                    extensions: request.extensions.clone(),
                    created_at: now,
                    last_used_at: now,
                    search_count: 1,
                },
            };
            let encoded = postcard::to_stdvec(&entry).map_err(codec_error)?;
            table.insert(key, encoded.as_slice()).map_err(store_error)?;

            // Evict beyond the cap, oldest use first.
            let mut by_use: Vec<(u64, i64)> = Vec::new();
            for row in table.iter().map_err(store_error)? {
                let (row_key, value) = row.map_err(store_error)?;
                let stored: HistoryEntry = decode(value.value())?;
                by_use.push((row_key.value(), stored.last_used_at));
            }
            if by_use.len() > MAX_HISTORY_ENTRIES {
                by_use.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
                for (stale_key, _) in by_use.split_off(MAX_HISTORY_ENTRIES) {
                    table.remove(stale_key).map_err(store_error)?;
                }
            }
        }
        txn.commit().map_err(store_error)?;
        Ok(id)
    }

    /// Entries ordered by last use, newest first, optionally truncated.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let txn = self.db.begin_read().map_err(store_error)?;
        let table = txn.open_table(HISTORY).map_err(store_error)?;
        let mut entries: Vec<HistoryEntry> = Vec::new();
        for row in table.iter().map_err(store_error)? {
            let (_, value) = row.map_err(store_error)?;
            entries.push(decode(value.value())?);
        }
        entries.sort_by(|a, b| {
            b.last_used_at
                .cmp(&a.last_used_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Looks up one entry by id. Unknown or malformed ids yield None.
    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        let Some(key) = parse_id(id) else {
            return Ok(None);
        };
        let txn = self.db.begin_read().map_err(store_error)?;
        let table = txn.open_table(HISTORY).map_err(store_error)?;
        match table.get(key).map_err(store_error)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Removes one entry. Returns false when the id is unknown.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let Some(key) = parse_id(id) else {
            return Ok(false);
        };
        let txn = self.db.begin_write().map_err(store_error)?;
        let removed = {
            let mut table = txn.open_table(HISTORY).map_err(store_error)?;
            let removed = table.remove(key).map_err(store_error)?.is_some();
            removed
        };
        txn.commit().map_err(store_error)?;
        Ok(removed)
    }

    /// Empties the table. Returns how many entries were dropped.
    pub fn clear(&self) -> Result<u64> {
        let txn = self.db.begin_write().map_err(store_error)?;
        let removed = {
            let mut table = txn.open_table(HISTORY).map_err(store_error)?;
            let mut keys: Vec<u64> = Vec::new();
            for row in table.iter().map_err(store_error)? {
                let (key, _) = row.map_err(store_error)?;
                keys.push(key.value());
            }
            for key in &keys {
                table.remove(key).map_err(store_error)?;
            }
            keys.len() as u64
        };
        txn.commit().map_err(store_error)?;
        Ok(removed)
    }
}

/// FNV-1a over both lists, order-sensitive, with separators so list
/// boundaries cannot collide.
fn entry_key(keywords: &[String], folders: &[String]) -> u64 {
    let mut hasher = FnvHasher::default();
    for keyword in keywords {
        hasher.write(keyword.as_bytes());
        hasher.write_u8(0);
    }
    hasher.write_u8(0xff);
    for folder in folders {
        hasher.write(folder.as_bytes());
        hasher.write_u8(0);
    }
    hasher.finish()
}

fn entry_id(key: u64) -> String {
    format!("{key:016x}")
}

fn parse_id(id: &str) -> Option<u64> {
    u64::from_str_radix(id, 16).ok()
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(codec_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_history(temp: &TempDir) -> SearchHistory {
        SearchHistory::open(temp.path().join("history.redb")).unwrap()
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|value| value.to_string()).collect()
    }

    fn request(keywords: &[&str], folders: &[&str]) -> SearchRequest {
        SearchRequest {
            keywords: strings(keywords),
            folders: strings(folders),
            ..SearchRequest::default()
        }
    }

    #[test]
    fn repeat_searches_bump_the_counter_instead_of_duplicating() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);

        let first = history.record(&request(&["report"], &["/data"])).unwrap();
        let second = history.record(&request(&["report"], &["/data"])).unwrap();
        assert_eq!(first, second);

        let entries = history.recent(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].search_count, 2);
        assert!(entries[0].last_used_at >= entries[0].created_at);
    }

    #[test]
    fn different_folders_make_a_different_entry() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);

        let a = history.record(&request(&["report"], &["/data"])).unwrap();
        let b = history.record(&request(&["report"], &["/archive"])).unwrap();
        assert_ne!(a, b);
        assert_eq!(history.recent(None).unwrap().len(), 2);
    }

    #[test]
    fn repeats_take_the_latest_criteria() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);

        let mut first = request(&["report"], &["/data"]);
        first.extensions = Some(strings(&["pdf"]));
        let id = history.record_at(&first, 100).unwrap();

        let mut again = request(&["report"], &["/data"]);
        again.extensions = Some(strings(&["xlsx"]));
        again.start_date = Some("2025-01-01".to_string());
        history.record_at(&again, 200).unwrap();

        let entry = history.get(&id).unwrap().unwrap();
        assert_eq!(entry.search_count, 2);
        assert_eq!(entry.created_at, 100);
        assert_eq!(entry.last_used_at, 200);
        assert_eq!(entry.extensions, Some(strings(&["xlsx"])));
        assert_eq!(entry.start_date.as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn list_boundaries_do_not_collide() {
        assert_ne!(
            entry_key(&strings(&["ab"]), &[]),
            entry_key(&strings(&["a", "b"]), &[])
        );
        assert_ne!(
            entry_key(&strings(&["a"]), &strings(&["b"])),
            entry_key(&strings(&["a", "b"]), &[])
        );
    }

    #[test]
    fn recent_orders_by_last_use_newest_first() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);
        history.record_at(&request(&["alpha"], &[]), 100).unwrap();
        history.record_at(&request(&["beta"], &[]), 200).unwrap();
        history.record_at(&request(&["gamma"], &[]), 150).unwrap();

        let entries = history.recent(None).unwrap();
        let order: Vec<&str> = entries
            .iter()
            .map(|entry| entry.keywords[0].as_str())
            .collect();
        assert_eq!(order, vec!["beta", "gamma", "alpha"]);

        // Re-running an old search moves it to the front.
        history.record_at(&request(&["alpha"], &[]), 300).unwrap();
        let entries = history.recent(Some(1)).unwrap();
        assert_eq!(entries[0].keywords[0], "alpha");
        assert_eq!(entries[0].search_count, 2);
    }

    #[test]
    fn cap_evicts_the_least_recently_used_entries() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);
        let mut ids = Vec::new();
        for index in 0..(MAX_HISTORY_ENTRIES + 2) {
            let id = history
                .record_at(&request(&[&format!("term{index}")], &[]), index as i64)
                .unwrap();
            ids.push(id);
        }

        let entries = history.recent(None).unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        // The two oldest stamps fell off.
        assert!(history.get(&ids[0]).unwrap().is_none());
        assert!(history.get(&ids[1]).unwrap().is_none());
        assert!(history.get(&ids[2]).unwrap().is_some());
    }

    #[test]
    fn get_and_delete_round_trip() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);
        let mut recorded = request(&["report"], &["/data"]);
        recorded.exclude_keywords = strings(&["temp"]);
        recorded.case_sensitive = true;
        let id = history.record(&recorded).unwrap();

        let entry = history.get(&id).unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.keywords, strings(&["report"]));
        assert_eq!(entry.folders, strings(&["/data"]));
        assert_eq!(entry.exclude_keywords, strings(&["temp"]));
        assert!(entry.case_sensitive);

        assert!(history.delete(&id).unwrap());
        assert!(!history.delete(&id).unwrap());
        assert!(history.get(&id).unwrap().is_none());
    }

    #[test]
    fn malformed_ids_are_not_found() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);
        assert!(history.get("not-hex").unwrap().is_none());
        assert!(!history.delete("not-hex").unwrap());
    }

    #[test]
    fn clear_reports_how_many_entries_dropped() {
        let temp = TempDir::new().unwrap();
        let history = open_history(&temp);
        history.record(&request(&["a"], &[])).unwrap();
        history.record(&request(&["b"], &[])).unwrap();

        assert_eq!(history.clear().unwrap(), 2);
        assert!(history.recent(None).unwrap().is_empty());
    }

    #[test]
    fn history_survives_a_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.redb");
        let id = {
            let history = SearchHistory::open(&path).unwrap();
            history.record(&request(&["kept"], &["/data"])).unwrap()
        };
        let reopened = SearchHistory::open(&path).unwrap();
        assert_eq!(reopened.get(&id).unwrap().unwrap().keywords[0], "kept");
    }
}
