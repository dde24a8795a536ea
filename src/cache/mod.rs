//! # Response Cache
//!
//! A local, file-backed cache for upstream search/research responses.
//!
//! ## Features
//!
//! - **Stable fingerprints**: SHA-256 over a canonical `{query, params}` document,
//!   independent of parameter insertion order
//! - **TTL expiry**: entries expire `ttl` after creation; expired files are kept
//!   until [`ResponseCache::cleanup`] runs
//! - **Durable stats**: hits, misses and estimated savings persisted in `stats.json`
//! - **Fail-open**: cache errors are logged and turn into misses or no-ops
//!
//! ## Example
//!
//! ```rust,no_run
//! use perplexity_cache::cache::{CacheConfig, CacheParams, ResponseCache};
//! use serde_json::json;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .cache_dir("/tmp/perplexity-cache")
//!     .ttl_hours(24.0)
//!     .build();
//!
//! let cache = ResponseCache::new(config).await;
//!
//! let mut params = CacheParams::new();
//! params.insert("model".into(), json!("sonar"));
//!
//! if cache.get("rust 2024 edition", &params).await.is_none() {
//!     let response = json!({"content": "..."});
//!     cache.set("rust 2024 edition", &params, response, "sonar", 930.0).await;
//! }
//!
//! println!("hit rate: {:.1}%", cache.stats().await.hit_rate);
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod facade;
mod io;
pub mod key;
pub mod ledger;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder, DEFAULT_SAVINGS_PER_HIT};
pub use entry::CacheEntry;
pub use facade::{run_periodic_cleanup, ResponseCache};
pub use key::derive_key;
pub use ledger::{StatsLedger, STATS_FILE_NAME};
pub use store::CacheStore;
pub use types::{CacheKey, CacheParams, CacheStats, CacheStatsReport, CacheValue};
