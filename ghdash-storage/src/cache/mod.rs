//! Persistent cache for upstream payloads.
//!
//! Entries are keyed by (domain, resource key) and carry the time they were
//! last saved. Staleness is purely TTL-based: nothing invalidates an entry
//! early, and nothing but a successful fetch rewrites it.
//!
//! # Example
//!
//! ```ignore
//! let store = LmdbCacheStore::open("./data/cache", 512)?;
//! let key: ResourceKey = "acme/widgets".parse()?;
//!
//! if store.is_stale(CacheDomain::Workflow, &key, ttl).await? {
//!     // schedule a refresh
//! }
//! ```

pub mod domain_key;
pub mod freshness;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use domain_key::DomainKey;
pub use freshness::{is_stale_at, CacheState, StalenessPolicy};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::MemoryCacheStore;
pub use traits::{CacheStats, CacheStore};
