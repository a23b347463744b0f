//! Cache entries

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CacheDomain, ResourceKey, Timestamp};

/// One cached payload for a (domain, key) pair.
///
/// At most one entry exists per (domain, key). Saving replaces `payload`
/// wholesale; entries are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub domain: CacheDomain,
    pub key: ResourceKey,
    pub payload: Value,
    pub updated_at: Timestamp,
}

impl CacheEntry {
    pub fn new(domain: CacheDomain, key: ResourceKey, payload: Value, updated_at: Timestamp) -> Self {
        Self {
            domain,
            key,
            payload,
            updated_at,
        }
    }

    /// Age of the entry relative to `now`. Negative ages clamp to zero.
    pub fn age_at(&self, now: Timestamp) -> std::time::Duration {
        (now - self.updated_at).to_std().unwrap_or_default()
    }
}
