//! Persisted aggregate statistics
//!
//! The ledger keeps an in-memory mirror of [`CacheStats`] and rewrites
//! `stats.json` after every mutation. Mutations are serialized through a
//! mutex held across the update and the write, so callers sharing one ledger
//! never lose an increment. Separate processes pointed at the same directory
//! still race; the last writer wins.

use crate::cache::io::{read_json, write_json_atomic};
use crate::cache::types::{CacheStats, CacheStatsReport};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File name of the persisted stats inside the cache directory
pub const STATS_FILE_NAME: &str = "stats.json";

/// Stats mirror with write-through persistence
#[derive(Debug)]
pub struct StatsLedger {
    /// `None` when the cache is disabled: counters live in memory only
    path: Option<PathBuf>,

    stats: Mutex<CacheStats>,
}

impl StatsLedger {
    /// Open the ledger stored at `path`.
    ///
    /// A missing file starts a fresh ledger and persists it immediately; an
    /// unreadable one is logged and replaced by zeroed counters.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let (stats, fresh) = match read_json::<CacheStats>(&path).await {
            Ok(stats) => {
                debug!("Loaded cache stats from {:?}: {}", path, stats);
                (stats, false)
            }
            Err(e) if e.is_not_found() => {
                info!("No cache stats at {:?}, starting a new ledger", path);
                (CacheStats::default(), true)
            }
            Err(e) => {
                warn!("Failed to load cache stats from {:?}, resetting: {}", path, e);
                (CacheStats::default(), true)
            }
        };

        let ledger = Self {
            path: Some(path),
            stats: Mutex::new(stats),
        };

        if fresh {
            let stats = ledger.stats.lock().await;
            ledger.persist(&stats).await;
        }

        ledger
    }

    /// A ledger that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Location of `stats.json`, if persisted
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Count a hit and credit the per-hit savings
    pub async fn record_hit(&self, savings_usd: f64) {
        self.mutate(|stats| {
            stats.total_hits += 1;
            stats.estimated_cost_savings += savings_usd;
        })
        .await;
    }

    /// Count a miss
    pub async fn record_miss(&self) {
        self.mutate(|stats| stats.total_misses += 1).await;
    }

    /// Count a newly written entry
    pub async fn record_set(&self, created_at: DateTime<Utc>) {
        self.mutate(|stats| {
            stats.total_entries += 1;
            stats.total_saved += 1;
            stats.newest_entry = Some(created_at);
            if stats.oldest_entry.is_none() {
                stats.oldest_entry = Some(created_at);
            }
        })
        .await;
    }

    /// Subtract entries reclaimed by cleanup
    pub async fn record_removed(&self, count: usize) {
        self.mutate(|stats| {
            stats.total_entries = stats.total_entries.saturating_sub(count as u64);
        })
        .await;
    }

    /// Credit savings computed by the caller
    pub async fn record_savings(&self, usd: f64) {
        self.mutate(|stats| stats.estimated_cost_savings += usd).await;
    }

    /// Zero every counter
    pub async fn reset(&self) {
        self.mutate(|stats| *stats = CacheStats::default()).await;
    }

    /// Overwrite the entry-derived fields after a directory rescan
    pub async fn reconcile(
        &self,
        total_entries: u64,
        oldest_entry: Option<DateTime<Utc>>,
        newest_entry: Option<DateTime<Utc>>,
    ) {
        self.mutate(|stats| {
            stats.total_entries = total_entries;
            stats.oldest_entry = oldest_entry;
            stats.newest_entry = newest_entry;
        })
        .await;
    }

    /// Copy of the current counters
    pub async fn snapshot(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    /// Current counters with the derived hit rate
    pub async fn report(&self) -> CacheStatsReport {
        self.stats.lock().await.report()
    }

    async fn mutate<F>(&self, update: F)
    where
        F: FnOnce(&mut CacheStats),
    {
        let mut stats = self.stats.lock().await;
        update(&mut stats);
        self.persist(&stats).await;
    }

    async fn persist(&self, stats: &CacheStats) {
        let Some(path) = &self.path else {
            return;
        };

        if let Err(e) = write_json_atomic(path, stats).await {
            warn!("Failed to persist cache stats: {}", e);
        }
    }
}
