//! In-memory cache store for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ghdash_core::{CacheDomain, CacheEntry, Clock, ResourceKey, StorageError, SystemClock};
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{CacheStats, CacheStore};

/// [`CacheStore`] backed by a `HashMap`; nothing survives the process.
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<(CacheDomain, ResourceKey), CacheEntry>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    saves: AtomicU64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            saves: AtomicU64::new(0),
        }
    }

    /// Insert an entry with an explicit timestamp, bypassing the clock.
    pub async fn seed(&self, entry: CacheEntry) {
        self.entries
            .write()
            .await
            .insert((entry.domain, entry.key.clone()), entry);
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let entry = self.entries.read().await.get(&(domain, key.clone())).cloned();
        let counter = if entry.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(entry)
    }

    async fn save(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
        payload: Value,
    ) -> Result<CacheEntry, StorageError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let updated_at = entries
            .get(&(domain, key.clone()))
            .map_or(now, |previous| previous.updated_at.max(now));
        let entry = CacheEntry::new(domain, key.clone(), payload, updated_at);
        entries.insert((domain, key.clone()), entry.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(entry)
    }

    async fn list_keys(&self, domain: CacheDomain) -> Result<Vec<ResourceKey>, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|(d, _)| *d == domain)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn clear(&self, domain: CacheDomain) -> Result<u64, StorageError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(d, _), _| *d != domain);
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self) -> Result<CacheStats, StorageError> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            entry_count: self.entries.read().await.len() as u64,
        })
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
