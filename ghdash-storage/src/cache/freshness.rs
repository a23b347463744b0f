//! Staleness rules for cached entries.
//!
//! Staleness is TTL-only: an entry is stale once its age strictly exceeds the
//! domain's TTL. An age exactly equal to the TTL is still fresh.

use std::collections::BTreeMap;
use std::time::Duration;

use ghdash_core::{CacheDomain, CacheEntry, Timestamp};

/// True when `now - updated_at > ttl`.
///
/// Entries timestamped in the future count as fresh.
pub fn is_stale_at(updated_at: Timestamp, now: Timestamp, ttl: Duration) -> bool {
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
        // A TTL too large to represent never expires.
        return false;
    };
    now - updated_at > ttl
}

/// State of a key at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    NoCache,
    CachedFresh,
    CachedStale,
}

impl CacheState {
    pub fn classify(entry: Option<&CacheEntry>, now: Timestamp, ttl: Duration) -> Self {
        match entry {
            None => Self::NoCache,
            Some(entry) if is_stale_at(entry.updated_at, now, ttl) => Self::CachedStale,
            Some(_) => Self::CachedFresh,
        }
    }
}

/// Per-domain TTLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessPolicy {
    ttls: BTreeMap<CacheDomain, Duration>,
}

impl StalenessPolicy {
    /// Policy using each domain's default TTL.
    pub fn new() -> Self {
        Self {
            ttls: CacheDomain::ALL
                .into_iter()
                .map(|domain| (domain, domain.default_ttl()))
                .collect(),
        }
    }

    pub fn with_ttl(mut self, domain: CacheDomain, ttl: Duration) -> Self {
        self.ttls.insert(domain, ttl);
        self
    }

    pub fn ttl(&self, domain: CacheDomain) -> Duration {
        self.ttls
            .get(&domain)
            .copied()
            .unwrap_or_else(|| domain.default_ttl())
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new()
    }
}
