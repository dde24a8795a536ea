//! Cache entry with TTL support
//!
//! One entry is stored per file, serialized with camelCase field names.

use crate::cache::key::derive_key;
use crate::cache::types::{CacheKey, CacheParams, CacheValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached upstream response and its bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Fingerprint of `(query, params)`; also the file stem
    pub key: CacheKey,

    /// The original query text
    pub query: String,

    /// Request parameters that were fingerprinted with the query
    pub params: CacheParams,

    /// The cached response payload
    pub response: CacheValue,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// `created_at + ttl`
    pub expires_at: DateTime<Utc>,

    /// Number of hits served from this entry
    pub hit_count: u64,

    /// Upstream model that produced the response
    pub model_used: String,

    /// Upstream latency of the original call
    pub processing_time_ms: f64,
}

impl CacheEntry {
    /// Create a new entry expiring `ttl` after `created_at`.
    ///
    /// The key is derived from `query` and `params`.
    pub fn new(
        query: impl Into<String>,
        params: CacheParams,
        response: CacheValue,
        model_used: impl Into<String>,
        processing_time_ms: f64,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        // Durations beyond chrono's range saturate to the latest representable instant
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let query = query.into();
        Self {
            key: derive_key(&query, &params),
            query,
            params,
            response,
            created_at,
            expires_at,
            hit_count: 0,
            model_used: model_used.into(),
            processing_time_ms,
        }
    }

    /// Check if the entry has expired at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Record a hit
    pub fn mark_hit(&mut self) {
        self.hit_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with_ttl(ttl: Duration) -> CacheEntry {
        CacheEntry::new(
            "what is the capital of france",
            CacheParams::new(),
            json!({"answer": "Paris"}),
            "sonar",
            412.5,
            Utc::now(),
            ttl,
        )
    }

    #[test]
    fn test_cache_entry_creation() {
        let entry = entry_with_ttl(Duration::from_secs(3600));

        assert_eq!(entry.hit_count, 0);
        assert_eq!(entry.key, derive_key(&entry.query, &entry.params));
        assert_eq!(entry.model_used, "sonar");
        assert_eq!(entry.expires_at - entry.created_at, chrono::Duration::hours(1));
        assert!(!entry.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_entry_expiration_boundary() {
        let entry = entry_with_ttl(Duration::from_secs(60));

        assert!(!entry.is_expired_at(entry.expires_at));
        assert!(entry.is_expired_at(entry.expires_at + chrono::Duration::milliseconds(1)));
        assert!(!entry.is_expired_at(entry.created_at));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = entry_with_ttl(Duration::from_secs(u64::MAX));
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!entry.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_mark_hit() {
        let mut entry = entry_with_ttl(Duration::from_secs(3600));
        entry.mark_hit();
        entry.mark_hit();
        assert_eq!(entry.hit_count, 2);
    }

    #[test]
    fn test_on_disk_field_names() {
        let entry = entry_with_ttl(Duration::from_secs(3600));
        let value = serde_json::to_value(&entry).unwrap();

        for field in [
            "key",
            "query",
            "params",
            "response",
            "createdAt",
            "expiresAt",
            "hitCount",
            "modelUsed",
            "processingTimeMs",
        ] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }
}
