//! Configuration for the response cache

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Fixed USD amount credited to `estimatedCostSavings` on every cache hit.
///
/// Equal to one sonar low-tier request fee ($5 per 1000 requests). Not derived
/// from the pricing of the model that produced the cached response.
pub const DEFAULT_SAVINGS_PER_HIT: f64 = 0.005;

/// Default time-to-live: 24 hours
pub const DEFAULT_TTL_HOURS: f64 = 24.0;

/// Environment variable overriding the cache directory
pub const ENV_CACHE_DIR: &str = "PERPLEXITY_CACHE_DIR";

/// Environment variable overriding the TTL, in hours
pub const ENV_CACHE_TTL_HOURS: &str = "PERPLEXITY_CACHE_TTL_HOURS";

/// Environment variable overriding the per-hit savings increment
pub const ENV_SAVINGS_PER_HIT: &str = "PERPLEXITY_CACHE_SAVINGS_PER_HIT";

/// Configuration for the response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one JSON file per entry plus `stats.json`.
    /// Created on startup if absent.
    pub cache_dir: PathBuf,

    /// Time-to-live for every entry (`expiresAt = createdAt + ttl`)
    pub ttl: Duration,

    /// USD credited to the stats ledger per cache hit
    pub savings_per_hit: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            ttl: Duration::from_secs(DEFAULT_TTL_HOURS as u64 * 3600),
            savings_per_hit: DEFAULT_SAVINGS_PER_HIT,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load configuration from the environment, reading `.env` first if present.
    ///
    /// Unset variables fall back to defaults; malformed values are an error.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = CacheConfig::builder();

        if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
            if !dir.trim().is_empty() {
                builder = builder.cache_dir(dir.trim());
            }
        }

        if let Ok(raw) = std::env::var(ENV_CACHE_TTL_HOURS) {
            let ttl_hours: f64 = raw.trim().parse().map_err(|_| {
                CacheError::Config(format!(
                    "{} must be a number, got {:?}",
                    ENV_CACHE_TTL_HOURS, raw
                ))
            })?;
            builder = builder.ttl_hours(ttl_hours);
        }

        if let Ok(raw) = std::env::var(ENV_SAVINGS_PER_HIT) {
            let savings: f64 = raw.trim().parse().map_err(|_| {
                CacheError::Config(format!(
                    "{} must be a number, got {:?}",
                    ENV_SAVINGS_PER_HIT, raw
                ))
            })?;
            builder = builder.savings_per_hit(savings);
        }

        let config = builder.try_build()?;
        debug!("Loaded cache config from environment: {:?}", config);
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::Config("ttl must be greater than 0".to_string()));
        }

        if !self.savings_per_hit.is_finite() || self.savings_per_hit < 0.0 {
            return Err(CacheError::Config(
                "savings_per_hit must be a finite, non-negative amount".to_string(),
            ));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(CacheError::Config("cache_dir must not be empty".to_string()));
        }

        Ok(())
    }

    /// TTL expressed in hours
    pub fn ttl_hours(&self) -> f64 {
        self.ttl.as_secs_f64() / 3600.0
    }

    /// Path of the persisted stats file
    pub fn stats_path(&self) -> PathBuf {
        self.cache_dir.join(crate::cache::ledger::STATS_FILE_NAME)
    }
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    cache_dir: Option<PathBuf>,
    ttl: Option<Duration>,
    ttl_hours: Option<f64>,
    savings_per_hit: Option<f64>,
}

impl CacheConfigBuilder {
    /// Set the cache directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the TTL directly
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self.ttl_hours = None;
        self
    }

    /// Set the TTL in (possibly fractional) hours
    pub fn ttl_hours(mut self, hours: f64) -> Self {
        self.ttl_hours = Some(hours);
        self.ttl = None;
        self
    }

    /// Set the per-hit savings increment in USD
    pub fn savings_per_hit(mut self, usd: f64) -> Self {
        self.savings_per_hit = Some(usd);
        self
    }

    /// Build the cache configuration, substituting defaults for invalid values
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        let ttl = match (self.ttl, self.ttl_hours) {
            (Some(ttl), _) => ttl,
            (None, Some(h)) => hours(h).unwrap_or(defaults.ttl),
            (None, None) => defaults.ttl,
        };

        CacheConfig {
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            ttl,
            savings_per_hit: self.savings_per_hit.unwrap_or(defaults.savings_per_hit),
        }
    }

    /// Build and validate, rejecting out-of-range values instead of defaulting
    pub fn try_build(self) -> Result<CacheConfig> {
        if let Some(h) = self.ttl_hours {
            if hours(h).is_none() {
                return Err(CacheError::Config(format!(
                    "ttl_hours must be a positive number, got {}",
                    h
                )));
            }
        }

        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

/// Convert hours to a `Duration`; `None` for non-positive or unrepresentable values
fn hours(h: f64) -> Option<Duration> {
    if !h.is_finite() || h <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(h * 3600.0).ok()
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("perplexity-mcp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.ttl_hours(), 24.0);
        assert_eq!(config.savings_per_hit, DEFAULT_SAVINGS_PER_HIT);
        assert!(config.cache_dir.ends_with("perplexity-mcp"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid_config = CacheConfig::default();
        invalid_config.ttl = Duration::ZERO;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.savings_per_hit = -1.0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.savings_per_hit = f64::NAN;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.cache_dir = PathBuf::new();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .cache_dir("/tmp/perplexity-test")
            .ttl_hours(1.5)
            .savings_per_hit(0.01)
            .build();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/perplexity-test"));
        assert_eq!(config.ttl, Duration::from_secs(5400));
        assert_eq!(config.savings_per_hit, 0.01);
        assert_eq!(config.stats_path(), PathBuf::from("/tmp/perplexity-test/stats.json"));
    }

    #[test]
    fn test_builder_last_ttl_wins() {
        let config = CacheConfig::builder()
            .ttl_hours(2.0)
            .ttl(Duration::from_secs(60))
            .build();
        assert_eq!(config.ttl, Duration::from_secs(60));

        let config = CacheConfig::builder()
            .ttl(Duration::from_secs(60))
            .ttl_hours(2.0)
            .build();
        assert_eq!(config.ttl, Duration::from_secs(7200));
    }

    #[test]
    fn test_builder_rejects_bad_ttl() {
        assert!(CacheConfig::builder().ttl_hours(0.0).try_build().is_err());
        assert!(CacheConfig::builder().ttl_hours(-3.0).try_build().is_err());
        assert!(CacheConfig::builder().ttl_hours(f64::INFINITY).try_build().is_err());

        // build() falls back to the default instead
        let config = CacheConfig::builder().ttl_hours(-3.0).build();
        assert_eq!(config.ttl_hours(), DEFAULT_TTL_HOURS);
    }
}
