//! Persistent per-folder listing cache.
//!
//! Cached listings live in a single-file redb store. Each scanned folder
//! owns one postcard-encoded row set plus a freshness stamp, and `replace`
//! swaps both inside one write transaction, so a reader never observes a
//! half-written listing. Rows for different folders never mix, and the
//! store survives process restarts.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{codec_error, store_error, Result};
use crate::query::{KeywordSet, SearchQuery};
use crate::types::{unix_now_secs, FileRecord, IndexStats};

/// Freshness window applied when none is configured.
pub const DEFAULT_TTL_SECS: i64 = 3600;

const FOLDER_META: TableDefinition<&str, &[u8]> = TableDefinition::new("folder_meta");
const FOLDER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("folder_files");

/// Per-folder stamp row. `file_count` mirrors the row set so statistics and
/// expiry never have to decode the listing itself.
#[derive(Debug, Serialize, Deserialize)]
struct FolderMeta {
    indexed_at: i64,
    file_count: u64,
}

/// Cached folder listings with TTL-based freshness.
pub struct FileIndex {
    db: Database,
    ttl_secs: i64,
}

impl FileIndex {
    /// Opens (or creates) the store at `path` with the default TTL.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_ttl(path, DEFAULT_TTL_SECS)
    }

    /// Opens (or creates) the store with an explicit freshness window.
    pub fn with_ttl(path: impl AsRef<Path>, ttl_secs: i64) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(store_error)?;
        // Both tables must exist before the first read transaction opens them.
        let init = db.begin_write().map_err(store_error)?;
        {
            init.open_table(FOLDER_META).map_err(store_error)?;
            init.open_table(FOLDER_FILES).map_err(store_error)?;
        }
        init.commit().map_err(store_error)?;
        Ok(Self { db, ttl_secs })
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Replaces a folder's cached rows with a fresh listing.
    ///
    /// Every stored row gets this folder and a single write stamp, whatever
    /// the input carried. An empty listing removes the folder entirely: no
    /// rows means no stamp, so the folder reads as stale afterwards.
    pub fn replace(&self, folder: &str, records: &[FileRecord]) -> Result<()> {
        self.replace_at(folder, records, unix_now_secs())
    }

    fn replace_at(&self, folder: &str, records: &[FileRecord], indexed_at: i64) -> Result<()> {
        let txn = self.db.begin_write().map_err(store_error)?;
        {
            let mut meta = txn.open_table(FOLDER_META).map_err(store_error)?;
            let mut files = txn.open_table(FOLDER_FILES).map_err(store_error)?;
            if records.is_empty() {
                meta.remove(folder).map_err(store_error)?;
                files.remove(folder).map_err(store_error)?;
            } else {
                let rows: Vec<FileRecord> = records
                    .iter()
                    .map(|record| {
                        let mut row = record.clone();
                        row.folder = folder.to_string();
                        row.indexed_at = indexed_at;
                        row
                    })
                    .collect();
                let listing = postcard::to_stdvec(&rows).map_err(codec_error)?;
                files
                    .insert(folder, listing.as_slice())
                    .map_err(store_error)?;
                let stamp = postcard::to_stdvec(&FolderMeta {
                    indexed_at,
                    file_count: rows.len() as u64,
                })
                .map_err(codec_error)?;
                meta.insert(folder, stamp.as_slice()).map_err(store_error)?;
            }
        }
        txn.commit().map_err(store_error)?;
        log::debug!("cache replace folder={folder} rows={}", records.len());
        Ok(())
    }

    /// True when the folder has a stamp younger than the TTL. An age exactly
    /// equal to the TTL counts as stale.
    pub fn is_fresh(&self, folder: &str) -> Result<bool> {
        let txn = self.db.begin_read().map_err(store_error)?;
        let table = txn.open_table(FOLDER_META).map_err(store_error)?;
        let Some(guard) = table.get(folder).map_err(store_error)? else {
            return Ok(false);
        };
        let meta: FolderMeta = decode(guard.value())?;
        Ok(unix_now_secs() - meta.indexed_at < self.ttl_secs)
    }

    /// Runs a query over one folder's cached rows, sorted by filename.
    ///
    /// Keyword matching here requires every term to appear in the filename
    /// and ignores case regardless of what the query asked for; the live
    /// walk is the any-term, case-honoring side. Exclusion keywords only
    /// ever apply to the walk.
    pub fn query(&self, folder: &str, query: &SearchQuery) -> Result<Vec<FileRecord>> {
        let txn = self.db.begin_read().map_err(store_error)?;
        let table = txn.open_table(FOLDER_FILES).map_err(store_error)?;
        let Some(guard) = table.get(folder).map_err(store_error)? else {
            return Ok(Vec::new());
        };
        let rows: Vec<FileRecord> = decode(guard.value())?;
        let keywords = KeywordSet::compile(&query.keywords, false);
        let mut matches: Vec<FileRecord> = rows
            .into_iter()
            .filter(|row| {
                keywords.matches_all(&row.filename)
                    && query.allows_extension(row.extension.as_deref())
                    && query.matches_date(row.modified_time)
            })
            .collect();
        matches.sort_by(|a, b| a.filename.cmp(&b.filename).then_with(|| a.path.cmp(&b.path)));
        Ok(matches)
    }

    /// Runs a query over several folders, concatenating each folder's
    /// sorted rows in the order the folders were given.
    pub fn query_many(&self, folders: &[String], query: &SearchQuery) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        for folder in folders {
            records.extend(self.query(folder, query)?);
        }
        Ok(records)
    }

    /// Drops every folder whose stamp is older than the TTL. Returns how
    /// many file rows went away.
    pub fn expire(&self) -> Result<u64> {
        let cutoff = unix_now_secs() - self.ttl_secs;
        let txn = self.db.begin_write().map_err(store_error)?;
        let mut removed_rows = 0u64;
        let removed_folders;
        {
            let mut meta = txn.open_table(FOLDER_META).map_err(store_error)?;
            let mut files = txn.open_table(FOLDER_FILES).map_err(store_error)?;
            let mut stale: Vec<String> = Vec::new();
            for entry in meta.iter().map_err(store_error)? {
                let (key, value) = entry.map_err(store_error)?;
                let folder_meta: FolderMeta = decode(value.value())?;
                if folder_meta.indexed_at < cutoff {
                    removed_rows += folder_meta.file_count;
                    stale.push(key.value().to_string());
                }
            }
            removed_folders = stale.len();
            for folder in &stale {
                meta.remove(folder.as_str()).map_err(store_error)?;
                files.remove(folder.as_str()).map_err(store_error)?;
            }
        }
        txn.commit().map_err(store_error)?;
        if removed_rows > 0 {
            log::info!("cache expiry removed rows={removed_rows} folders={removed_folders}");
        }
        Ok(removed_rows)
    }

    /// Drops one folder's rows and stamp, whatever their age. Returns how
    /// many file rows went away; zero for a folder that was never cached.
    pub fn clear_folder(&self, folder: &str) -> Result<u64> {
        let txn = self.db.begin_write().map_err(store_error)?;
        let removed_rows = {
            let mut meta = txn.open_table(FOLDER_META).map_err(store_error)?;
            let mut files = txn.open_table(FOLDER_FILES).map_err(store_error)?;
            let removed_rows = match meta.remove(folder).map_err(store_error)? {
                Some(guard) => decode::<FolderMeta>(guard.value())?.file_count,
                None => 0,
            };
            files.remove(folder).map_err(store_error)?;
            removed_rows
        };
        txn.commit().map_err(store_error)?;
        Ok(removed_rows)
    }

    /// Empties the store. Returns how many file rows were dropped.
    pub fn clear(&self) -> Result<u64> {
        let txn = self.db.begin_write().map_err(store_error)?;
        let mut removed_rows = 0u64;
        {
            let mut meta = txn.open_table(FOLDER_META).map_err(store_error)?;
            let mut files = txn.open_table(FOLDER_FILES).map_err(store_error)?;
            let mut folders: Vec<String> = Vec::new();
            for entry in meta.iter().map_err(store_error)? {
                let (key, value) = entry.map_err(store_error)?;
                let folder_meta: FolderMeta = decode(value.value())?;
                removed_rows += folder_meta.file_count;
                folders.push(key.value().to_string());
            }
            for folder in &folders {
                meta.remove(folder.as_str()).map_err(store_error)?;
                files.remove(folder.as_str()).map_err(store_error)?;
            }
        }
        txn.commit().map_err(store_error)?;
        Ok(removed_rows)
    }

    /// Row and stamp totals across the whole store.
    pub fn stats(&self) -> Result<IndexStats> {
        let txn = self.db.begin_read().map_err(store_error)?;
        let table = txn.open_table(FOLDER_META).map_err(store_error)?;
        let mut stats = IndexStats::default();
        for entry in table.iter().map_err(store_error)? {
            let (_, value) = entry.map_err(store_error)?;
            let meta: FolderMeta = decode(value.value())?;
            stats.total_files += meta.file_count;
            stats.total_folders += 1;
            stats.oldest_indexed_at = Some(match stats.oldest_indexed_at {
                Some(oldest) => oldest.min(meta.indexed_at),
                None => meta.indexed_at,
            });
            stats.newest_indexed_at = Some(match stats.newest_indexed_at {
                Some(newest) => newest.max(meta.indexed_at),
                None => meta.indexed_at,
            });
        }
        Ok(stats)
    }
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(codec_error)
}
