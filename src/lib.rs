//! # perplexity-cache
//!
//! Cost-aware response cache for an MCP server that exposes the Perplexity
//! search API as tools.
//!
//! ## Features
//!
//! - File-backed cache, one pretty-printed JSON file per response
//! - Order-independent SHA-256 fingerprints of `(query, params)`
//! - TTL expiry with explicit, externally scheduled cleanup
//! - Durable hit/miss/savings statistics in `stats.json`
//! - Fail-open: cache problems never fail the request they sit in front of
//! - Multi-tier cost estimation for the sonar model family
//!
//! ## Caching a tool call
//!
//! ```no_run
//! use perplexity_cache::{CacheConfig, CacheParams, ResponseCache};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = Arc::new(ResponseCache::new(CacheConfig::from_env()?).await);
//!
//!     let mut params = CacheParams::new();
//!     params.insert("model".into(), json!("sonar-pro"));
//!     params.insert("search_recency_filter".into(), json!("week"));
//!
//!     let query = "What changed in the latest tokio release?";
//!     let response = match cache.get(query, &params).await {
//!         Some(cached) => cached,
//!         None => {
//!             let fresh = json!({"content": "..."}); // upstream call goes here
//!             cache.set(query, &params, fresh.clone(), "sonar-pro", 1840.0).await;
//!             fresh
//!         }
//!     };
//!
//!     println!("{}", response);
//!     Ok(())
//! }
//! ```
//!
//! ## Estimating cost
//!
//! ```
//! use perplexity_cache::{calculate_perplexity_cost, PerplexityUsage};
//!
//! let usage = PerplexityUsage::new(1_000_000, 0);
//! let cost = calculate_perplexity_cost("sonar", &usage, Some("low"));
//! assert_eq!(cost, Some(1.005));
//!
//! assert_eq!(calculate_perplexity_cost("not-a-model", &usage, Some("low")), None);
//! ```

pub mod cache;
pub mod error;
pub mod pricing;

// Re-export main types for convenience
pub use cache::{
    run_periodic_cleanup, CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey, CacheParams,
    CacheStats, CacheStatsReport, CacheValue, ResponseCache,
};
pub use error::{CacheError, Result};
pub use pricing::{
    calculate_perplexity_cost, CostBreakdown, CostEstimator, CostTier, PerplexityUsage,
    PricingRow, PricingTable, RequestFees,
};
