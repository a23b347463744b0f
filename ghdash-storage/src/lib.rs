//! ghdash Storage - Cache Store, Refresh Pool and SWR Policy
//!
//! Owns everything between an HTTP handler and an upstream fetcher: the
//! persistent per-domain cache, single-flight refresh tickets, the bounded
//! background refresh pool and the stale-while-revalidate decision table.

pub mod cache;
pub mod observer;
pub mod refresh;
pub mod swr;
pub mod testing;

// Re-export cache types for API integration
pub use cache::{
    is_stale_at, CacheState, CacheStats, CacheStore, DomainKey, LmdbCacheError, LmdbCacheStore,
    MemoryCacheStore, StalenessPolicy,
};

pub use observer::{NoopObserver, RefreshObserver, ServeOutcome};

pub use refresh::{
    RefreshCoordinator, RefreshJob, RefreshPool, RefreshPoolConfig, RefreshPoolSnapshot,
    RefreshResult, RefreshTicket, SubmitError, DEFAULT_REFRESH_QUEUE_CAPACITY,
    DEFAULT_REFRESH_TIMEOUT_SECS, DEFAULT_REFRESH_WORKERS,
};

pub use swr::{CacheMeta, ScheduleOutcome, Served, SwrError, SwrPolicy};
