//! Core type definitions for the cache system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type: 64-char lowercase hex SHA-256 fingerprint
pub type CacheKey = String;

/// Request parameters that take part in the fingerprint
pub type CacheParams = serde_json::Map<String, serde_json::Value>;

/// Cached upstream response, stored opaquely
pub type CacheValue = serde_json::Value;

/// Aggregate counters persisted in `stats.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheStats {
    /// Entries written and not yet reclaimed by cleanup
    pub total_entries: u64,

    /// Total number of cache hits
    pub total_hits: u64,

    /// Total number of cache misses
    pub total_misses: u64,

    /// Number of responses saved to the cache
    pub total_saved: u64,

    /// Creation time of the first entry written since the last clear
    pub oldest_entry: Option<DateTime<Utc>>,

    /// Creation time of the most recent entry
    pub newest_entry: Option<DateTime<Utc>>,

    /// Estimated USD not spent upstream thanks to cache hits
    pub estimated_cost_savings: f64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            (self.total_hits as f64 / total as f64) * 100.0
        }
    }

    /// Total lookups served (hits plus misses)
    pub fn total_requests(&self) -> u64 {
        self.total_hits + self.total_misses
    }

    /// Snapshot with the derived hit rate attached
    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            stats: self.clone(),
            hit_rate: self.hit_rate(),
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ entries: {}, hits: {}, misses: {}, hit_rate: {:.2}%, saved: {}, est_savings: ${:.4} }}",
            self.total_entries,
            self.total_hits,
            self.total_misses,
            self.hit_rate(),
            self.total_saved,
            self.estimated_cost_savings
        )
    }
}

/// Stats as returned to callers: the persisted counters plus `hitRate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsReport {
    #[serde(flatten)]
    pub stats: CacheStats,

    /// `hits / (hits + misses) * 100`, or 0 with no traffic
    pub hit_rate: f64,
}
