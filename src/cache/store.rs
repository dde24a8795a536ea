//! File-backed entry store with lazy TTL expiry
//!
//! Each entry lives in `<cache_dir>/<fingerprint>.json`. Expired entries are
//! never removed on read; [`CacheStore::cleanup`] is the only path that
//! reclaims them. Every operation reports to the shared [`StatsLedger`].

use crate::cache::{
    entry::CacheEntry,
    io::{is_temp_file, read_json, write_json_atomic},
    key::is_fingerprint,
    ledger::StatsLedger,
};
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "json";

/// Directory of JSON entry files
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,

    /// Stats updated on every operation
    ledger: Arc<StatsLedger>,

    /// USD credited to the ledger on every hit
    savings_per_hit: f64,
}

impl CacheStore {
    /// Open a store over an existing directory
    pub fn new(dir: impl Into<PathBuf>, ledger: Arc<StatsLedger>, savings_per_hit: f64) -> Self {
        Self {
            dir: dir.into(),
            ledger,
            savings_per_hit,
        }
    }

    /// Create `dir` if needed and check that it is a directory
    pub async fn prepare_dir(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| CacheError::io(dir, e))?;

        let metadata = fs::metadata(dir)
            .await
            .map_err(|e| CacheError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(CacheError::Config(format!("{:?} is not a directory", dir)));
        }

        Ok(())
    }

    /// The directory holding entry files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `key`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Look up a live entry.
    ///
    /// On a hit the entry's `hit_count` is incremented and written back. A
    /// missing or expired entry is a miss; the expired file stays on disk.
    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);

        let mut entry = match read_json::<CacheEntry>(&path).await {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                debug!("Cache miss: {}", key);
                self.ledger.record_miss().await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if entry.is_expired_at(now) {
            debug!("Cache entry expired: {}", key);
            self.ledger.record_miss().await;
            return Ok(None);
        }

        entry.mark_hit();
        write_json_atomic(&path, &entry).await?;
        self.ledger.record_hit(self.savings_per_hit).await;

        debug!("Cache hit: {} (hit_count={})", key, entry.hit_count);
        Ok(Some(entry))
    }

    /// Write an entry, replacing any existing one with the same key
    pub async fn set(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(&entry.key);
        write_json_atomic(&path, entry).await?;
        self.ledger.record_set(entry.created_at).await;

        debug!(
            "Cached response for {} (model={}, expires_at={})",
            entry.key, entry.model_used, entry.expires_at
        );
        Ok(())
    }

    /// Delete every entry file and zero the stats.
    ///
    /// Temp files left behind by interrupted writes are swept as well.
    /// `stats.json` itself is kept. Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut first_error = None;

        for path in self.paths_where(is_entry_file).await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove cache entry {:?}: {}", path, e);
                    first_error.get_or_insert(CacheError::io(&path, e));
                }
            }
        }

        for path in self.paths_where(is_temp_file).await? {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed stale temp file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove stale temp file {:?}: {}", path, e),
            }
        }

        self.ledger.reset().await;
        info!("Cleared {} entries from cache", removed);

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Remove every entry whose `expires_at` is before `now`.
    ///
    /// Unreadable entry files are skipped, not deleted.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;

        for path in self.paths_where(is_entry_file).await? {
            let entry = match read_json::<CacheEntry>(&path).await {
                Ok(entry) => entry,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!("Skipping unreadable cache entry {:?}: {}", path, e);
                    continue;
                }
            };

            if entry.expires_at >= now {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove expired entry {:?}: {}", path, e),
            }
        }

        self.ledger.record_removed(removed).await;
        debug!("Cleaned up {} expired entries", removed);

        Ok(removed)
    }

    /// Read every parseable entry in the directory
    pub async fn scan(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        for path in self.paths_where(is_entry_file).await? {
            match read_json::<CacheEntry>(&path).await {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Skipping unreadable cache entry {:?}: {}", path, e),
            }
        }

        Ok(entries)
    }

    /// Paths in the cache directory accepted by `filter`
    async fn paths_where(&self, filter: fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let mut paths = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let path = item.path();
            if filter(&path) {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

/// `<64 hex chars>.json`
fn is_entry_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == ENTRY_EXTENSION);

    has_extension
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(is_fingerprint)
}
