//! Response cache facade
//!
//! [`ResponseCache`] is what the tool router talks to. It derives keys,
//! delegates to the [`CacheStore`], and absorbs every failure: a broken cache
//! costs an upstream call, never a failed request.

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    key::derive_key,
    ledger::StatsLedger,
    store::CacheStore,
    types::{CacheParams, CacheStatsReport, CacheValue},
};
use crate::error::{CacheError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Cost-aware response cache.
///
/// Construct one at startup and share it behind an `Arc`.
#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,

    /// `None` when the cache directory could not be initialized
    store: Option<CacheStore>,

    ledger: Arc<StatsLedger>,
}

impl ResponseCache {
    /// Create a cache over `config.cache_dir`.
    ///
    /// Never fails: if the directory cannot be prepared the error is logged
    /// and the cache runs disabled, answering every lookup with a miss.
    pub async fn new(config: CacheConfig) -> Self {
        info!(
            "Initializing response cache at {:?} (ttl={:.2}h)",
            config.cache_dir,
            config.ttl_hours()
        );

        if let Err(e) = config.validate() {
            error!("Invalid cache configuration, caching disabled: {}", e);
            return Self::disabled(config);
        }

        if let Err(e) = CacheStore::prepare_dir(&config.cache_dir).await {
            error!("Failed to initialize cache directory, caching disabled: {}", e);
            return Self::disabled(config);
        }

        let ledger = Arc::new(StatsLedger::open(config.stats_path()).await);
        let store = CacheStore::new(&config.cache_dir, Arc::clone(&ledger), config.savings_per_hit);

        Self {
            config,
            store: Some(store),
            ledger,
        }
    }

    fn disabled(config: CacheConfig) -> Self {
        Self {
            config,
            store: None,
            ledger: Arc::new(StatsLedger::in_memory()),
        }
    }

    /// Whether entries are being persisted
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached response. Any failure counts as a miss.
    pub async fn get(&self, query: &str, params: &CacheParams) -> Option<CacheValue> {
        let Some(store) = &self.store else {
            self.ledger.record_miss().await;
            return None;
        };

        let key = derive_key(query, params);
        match store.get(&key, Utc::now()).await {
            Ok(hit) => hit.map(|entry| entry.response),
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
                self.ledger.record_miss().await;
                None
            }
        }
    }

    /// Store a response after a successful upstream call.
    ///
    /// Overwrites any existing entry for the same query and params.
    pub async fn set(
        &self,
        query: &str,
        params: &CacheParams,
        response: CacheValue,
        model_used: &str,
        processing_time_ms: f64,
    ) {
        let Some(store) = &self.store else {
            return;
        };

        let entry = CacheEntry::new(
            query,
            params.clone(),
            response,
            model_used,
            processing_time_ms,
            Utc::now(),
            self.config.ttl,
        );

        if let Err(e) = store.set(&entry).await {
            warn!("Failed to cache response for {}: {}", entry.key, e);
        }
    }

    /// Remove all entries and zero the stats
    pub async fn clear(&self) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = store.clear().await {
            warn!("Cache clear did not complete: {}", e);
        }
    }

    /// Remove expired entries, returning how many were deleted
    pub async fn cleanup(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };

        match store.cleanup(Utc::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    info!("Removed {} expired cache entries", removed);
                }
                removed
            }
            Err(e) => {
                warn!("Cache cleanup failed: {}", e);
                0
            }
        }
    }

    /// Current stats with the derived hit rate
    pub async fn stats(&self) -> CacheStatsReport {
        self.ledger.report().await
    }

    /// Credit savings the caller computed with the cost estimator
    pub async fn record_cost_savings(&self, usd: f64) {
        if !usd.is_finite() || usd < 0.0 {
            warn!("Ignoring invalid cost savings amount: {}", usd);
            return;
        }
        self.ledger.record_savings(usd).await;
    }

    /// Recompute entry-derived stats from the files on disk.
    ///
    /// Hit, miss, and savings counters are left as they are.
    pub async fn rebuild_stats(&self) -> Result<CacheStatsReport> {
        let store = self.store.as_ref().ok_or(CacheError::Disabled)?;

        let entries = store.scan().await?;
        let oldest = entries.iter().map(|e| e.created_at).min();
        let newest = entries.iter().map(|e| e.created_at).max();

        self.ledger
            .reconcile(entries.len() as u64, oldest, newest)
            .await;

        debug!("Rebuilt cache stats from {} entries", entries.len());
        Ok(self.ledger.report().await)
    }
}

/// Run `cleanup()` every `interval` until the task is dropped or aborted.
///
/// The cache never schedules cleanup on its own; spawn this if the process
/// should reclaim expired entries periodically.
pub async fn run_periodic_cleanup(cache: Arc<ResponseCache>, interval: Duration) {
    info!("Starting periodic cache cleanup (interval: {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = cache.cleanup().await;
        debug!("Periodic cleanup removed {} entries", removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn cache_in(tmp: &TempDir) -> ResponseCache {
        let config = CacheConfig::builder()
            .cache_dir(tmp.path())
            .ttl(Duration::from_secs(3600))
            .build();
        ResponseCache::new(config).await
    }

    fn params() -> CacheParams {
        let mut p = CacheParams::new();
        p.insert("model".into(), json!("sonar"));
        p
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp).await;
        assert!(cache.is_enabled());

        let response = json!({"choices": [{"message": {"content": "42"}}]});
        cache.set("meaning of life", &params(), response.clone(), "sonar", 812.0).await;

        assert_eq!(cache.get("meaning of life", &params()).await, Some(response));

        let stats = cache.stats().await;
        assert_eq!(stats.stats.total_hits, 1);
        assert_eq!(stats.hit_rate, 100.0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_fails_open() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp).await;

        let key = derive_key("q", &params());
        std::fs::write(tmp.path().join(format!("{}.json", key)), "not json").unwrap();

        assert!(cache.get("q", &params()).await.is_none());
        assert_eq!(cache.stats().await.stats.total_misses, 1);
    }

    #[tokio::test]
    async fn test_disabled_when_dir_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, "x").unwrap();

        let cache = ResponseCache::new(CacheConfig::builder().cache_dir(&file).build()).await;
        assert!(!cache.is_enabled());

        cache.set("q", &params(), json!("r"), "sonar", 1.0).await;
        assert!(cache.get("q", &params()).await.is_none());
        assert_eq!(cache.cleanup().await, 0);
        cache.clear().await;
        assert!(matches!(cache.rebuild_stats().await, Err(CacheError::Disabled)));
        assert_eq!(cache.stats().await.stats.total_misses, 1);
    }

    #[tokio::test]
    async fn test_record_cost_savings() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp).await;

        cache.record_cost_savings(0.25).await;
        cache.record_cost_savings(-1.0).await;
        cache.record_cost_savings(f64::NAN).await;

        let savings = cache.stats().await.stats.estimated_cost_savings;
        assert!((savings - 0.25).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_periodic_cleanup_runs() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(cache_in(&tmp).await);

        // already past its expiry when written
        let stale = CacheEntry::new(
            "q",
            params(),
            json!("r"),
            "sonar",
            1.0,
            Utc::now() - chrono::Duration::hours(2),
            Duration::from_secs(3600),
        );
        let store = cache.store.as_ref().unwrap();
        store.set(&stale).await.unwrap();
        let path = store.entry_path(&stale.key);

        let handle = tokio::spawn(run_periodic_cleanup(
            Arc::clone(&cache),
            Duration::from_millis(10),
        ));
        let swept = tokio::time::timeout(Duration::from_secs(5), async {
            while cache.stats().await.stats.total_entries > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await;
        handle.abort();

        assert!(swept.is_ok(), "expired entry was never cleaned up");
        assert!(!path.exists());
    }
}
