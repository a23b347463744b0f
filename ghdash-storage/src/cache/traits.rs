//! Cache store trait.
//!
//! The stale-while-revalidate policy only needs a small key/value contract
//! per domain: get, upsert, staleness check, enumerate, clear. Stores own
//! the timestamps; callers never supply `updated_at`.

use std::time::Duration;

use async_trait::async_trait;
use ghdash_core::{CacheDomain, CacheEntry, Clock, ResourceKey, StorageError};
use serde_json::Value;

use super::freshness::is_stale_at;

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that found an entry
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Successful saves
    pub saves: u64,
    /// Entries currently stored, across all domains
    pub entry_count: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in `[0.0, 1.0]`; zero when nothing was read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Persistent per-domain key/value store for cached payloads.
///
/// Implementations must commit each `save` atomically so concurrent saves
/// for the same key never interleave; the last committed save wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Return the stored entry verbatim, without any TTL check.
    async fn get(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
    ) -> Result<Option<CacheEntry>, StorageError>;

    /// Upsert the payload and set `updated_at` to the store's current time.
    ///
    /// `updated_at` never moves backwards for a key, even if the clock does.
    async fn save(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
        payload: Value,
    ) -> Result<CacheEntry, StorageError>;

    /// Every key with an entry in `domain`.
    async fn list_keys(&self, domain: CacheDomain) -> Result<Vec<ResourceKey>, StorageError>;

    /// Drop every entry of `domain`, returning how many were removed.
    async fn clear(&self, domain: CacheDomain) -> Result<u64, StorageError>;

    /// Store statistics.
    async fn stats(&self) -> Result<CacheStats, StorageError>;

    /// The clock used for timestamps and staleness.
    fn clock(&self) -> &dyn Clock;

    /// True when no entry exists, or when `now - updated_at > ttl`.
    async fn is_stale(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let entry = self.get(domain, key).await?;
        let now = self.clock().now();
        Ok(entry.map_or(true, |entry| is_stale_at(entry.updated_at, now, ttl)))
    }
}
