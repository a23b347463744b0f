//! Stale-while-revalidate policy.
//!
//! [`SwrPolicy::serve`] decides, per request, whether to answer from cache,
//! fetch synchronously, or answer from cache while a background refresh runs:
//!
//! | state        | force | action                                        |
//! |--------------|-------|-----------------------------------------------|
//! | any          | yes   | fetch now, save on data                       |
//! | no cache     | no    | fetch now, save on data                       |
//! | cached fresh | no    | serve cached                                  |
//! | cached stale | no    | serve cached, queue one background refresh    |
//!
//! Empty results are served but never replace an existing entry. The one
//! exception to "only data is saved" is a forced fetch on a key that was
//! never cached, which stores the domain's empty payload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ghdash_core::{
    empty_payload, CacheDomain, CacheEntry, DomainFetcher, FetchError, FetchOutcome, ResourceKey,
    StorageError, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::{is_stale_at, CacheState, CacheStore, StalenessPolicy};
use crate::observer::{NoopObserver, RefreshObserver, ServeOutcome};
use crate::refresh::{RefreshCoordinator, RefreshJob, RefreshPool, SubmitError};

/// Errors surfaced to the caller of [`SwrPolicy::serve`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwrError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache store failed: {0}")]
    Storage(#[from] StorageError),
}

/// Cache metadata attached to every served payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
    /// Served from an existing entry rather than a fetch made for this request
    pub cached: bool,
    /// The served entry is past its TTL
    pub stale: bool,
    /// A background refresh for this key is queued or running
    pub refreshing: bool,
    /// Timestamp of the served entry; `None` when nothing was stored
    pub last_updated: Option<Timestamp>,
}

impl CacheMeta {
    fn fetched(last_updated: Option<Timestamp>) -> Self {
        Self {
            cached: false,
            stale: false,
            refreshing: false,
            last_updated,
        }
    }

    fn cached(entry: &CacheEntry, stale: bool, refreshing: bool) -> Self {
        Self {
            cached: true,
            stale,
            refreshing,
            last_updated: Some(entry.updated_at),
        }
    }
}

/// A payload plus the metadata describing how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub payload: Value,
    pub meta: CacheMeta,
}

impl Served {
    fn from_entry(entry: CacheEntry, stale: bool, refreshing: bool) -> Self {
        let meta = CacheMeta::cached(&entry, stale, refreshing);
        Self {
            payload: entry.payload,
            meta,
        }
    }
}

/// What happened when a background refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Ticket acquired and job queued.
    Scheduled,
    /// Another refresh for the key holds the ticket.
    AlreadyRunning,
    /// The pool queue was full; the ticket was released.
    QueueFull,
    /// The pool has shut down; the ticket was released.
    PoolClosed,
    /// No fetcher is registered for the domain.
    NoFetcher,
}

impl ScheduleOutcome {
    /// Whether a refresh for the key is now pending.
    pub fn is_refreshing(&self) -> bool {
        matches!(self, Self::Scheduled | Self::AlreadyRunning)
    }
}

/// Orchestrates cache reads, synchronous fetches and background refreshes.
pub struct SwrPolicy {
    store: Arc<dyn CacheStore>,
    coordinator: RefreshCoordinator,
    pool: RefreshPool,
    fetchers: HashMap<CacheDomain, Arc<dyn DomainFetcher>>,
    staleness: StalenessPolicy,
    observer: Arc<dyn RefreshObserver>,
}

impl fmt::Debug for SwrPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut domains: Vec<_> = self.fetchers.keys().copied().collect();
        domains.sort();
        f.debug_struct("SwrPolicy")
            .field("fetchers", &domains)
            .field("staleness", &self.staleness)
            .field("in_flight", &self.coordinator.in_flight())
            .finish_non_exhaustive()
    }
}

impl SwrPolicy {
    pub fn new(
        store: Arc<dyn CacheStore>,
        coordinator: RefreshCoordinator,
        pool: RefreshPool,
    ) -> Self {
        Self {
            store,
            coordinator,
            pool,
            fetchers: HashMap::new(),
            staleness: StalenessPolicy::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Register the fetcher for its domain, replacing any previous one.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn DomainFetcher>) -> Self {
        self.fetchers.insert(fetcher.domain(), fetcher);
        self
    }

    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn pool(&self) -> &RefreshPool {
        &self.pool
    }

    pub fn ttl(&self, domain: CacheDomain) -> Duration {
        self.staleness.ttl(domain)
    }

    /// Serve `(domain, key)` according to the stale-while-revalidate table.
    pub async fn serve(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
        force_refresh: bool,
    ) -> Result<Served, SwrError> {
        let ttl = self.ttl(domain);

        if force_refresh {
            self.observer.request_served(domain, ServeOutcome::Forced);
            return self.serve_forced(domain, key).await;
        }

        let entry = self.store.get(domain, key).await?;
        let now = self.store.clock().now();

        match (CacheState::classify(entry.as_ref(), now, ttl), entry) {
            (CacheState::CachedFresh, Some(entry)) => {
                self.observer.request_served(domain, ServeOutcome::Fresh);
                tracing::debug!(%domain, %key, "Serving fresh cache entry");
                Ok(Served::from_entry(entry, false, false))
            }
            (CacheState::CachedStale, Some(entry)) => {
                self.observer.request_served(domain, ServeOutcome::Stale);
                let outcome = self.schedule_refresh(domain, key);
                tracing::debug!(
                    %domain,
                    %key,
                    outcome = ?outcome,
                    "Serving stale cache entry"
                );
                Ok(Served::from_entry(entry, true, outcome.is_refreshing()))
            }
            _ => {
                self.observer.request_served(domain, ServeOutcome::Miss);
                self.serve_uncached(domain, key).await
            }
        }
    }

    /// Claim the key and queue a background refresh for it.
    ///
    /// Never blocks: a full queue or a closed pool drops the ticket so a
    /// later request can try again.
    pub fn schedule_refresh(&self, domain: CacheDomain, key: &ResourceKey) -> ScheduleOutcome {
        let Some(fetcher) = self.fetchers.get(&domain) else {
            tracing::warn!(%domain, %key, "No fetcher registered, skipping refresh");
            return ScheduleOutcome::NoFetcher;
        };
        let Some(ticket) = self.coordinator.try_acquire(domain, key) else {
            return ScheduleOutcome::AlreadyRunning;
        };

        let job = RefreshJob::new(ticket, Arc::clone(fetcher), Arc::clone(&self.store));
        match self.pool.submit(job) {
            Ok(()) => ScheduleOutcome::Scheduled,
            Err(SubmitError::QueueFull) => ScheduleOutcome::QueueFull,
            Err(SubmitError::Closed) => ScheduleOutcome::PoolClosed,
        }
    }

    /// Schedule a refresh only if the stored entry is past its TTL.
    ///
    /// Returns `None` for fresh or missing entries; missing keys are left to
    /// the next request, which fetches synchronously.
    pub async fn refresh_if_stale(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
    ) -> Result<Option<ScheduleOutcome>, StorageError> {
        let Some(entry) = self.store.get(domain, key).await? else {
            return Ok(None);
        };
        let now = self.store.clock().now();
        if !is_stale_at(entry.updated_at, now, self.ttl(domain)) {
            return Ok(None);
        }
        Ok(Some(self.schedule_refresh(domain, key)))
    }

    /// Drop every cached entry in every domain.
    pub async fn clear_all(&self) -> Result<Vec<(CacheDomain, u64)>, StorageError> {
        let mut cleared = Vec::with_capacity(CacheDomain::ALL.len());
        for domain in CacheDomain::ALL {
            let removed = self.store.clear(domain).await?;
            tracing::info!(%domain, removed, "Cleared cache domain");
            cleared.push((domain, removed));
        }
        Ok(cleared)
    }

    fn fetcher(&self, domain: CacheDomain) -> Result<&Arc<dyn DomainFetcher>, FetchError> {
        self.fetchers
            .get(&domain)
            .ok_or(FetchError::NoFetcher { domain })
    }

    async fn serve_uncached(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
    ) -> Result<Served, SwrError> {
        match self.fetcher(domain)?.fetch(key).await? {
            FetchOutcome::Data(payload) => {
                let entry = self.store.save(domain, key, payload).await?;
                tracing::info!(%domain, %key, "Fetched and cached");
                Ok(Served {
                    meta: CacheMeta::fetched(Some(entry.updated_at)),
                    payload: entry.payload,
                })
            }
            FetchOutcome::NoData => {
                // Not saved, so the next request fetches again.
                tracing::info!(%domain, %key, "Upstream returned no data, serving empty payload");
                Ok(Served {
                    payload: empty_payload(domain),
                    meta: CacheMeta::fetched(None),
                })
            }
        }
    }

    async fn serve_forced(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
    ) -> Result<Served, SwrError> {
        match self.fetcher(domain)?.fetch(key).await? {
            FetchOutcome::Data(payload) => {
                let entry = self.store.save(domain, key, payload).await?;
                tracing::info!(%domain, %key, "Force refresh saved");
                Ok(Served {
                    meta: CacheMeta::fetched(Some(entry.updated_at)),
                    payload: entry.payload,
                })
            }
            FetchOutcome::NoData => match self.store.get(domain, key).await? {
                Some(prior) => {
                    // The prior entry stays stored; the answer is still this fetch's.
                    tracing::warn!(%domain, %key, "Force refresh returned no data, keeping cached entry");
                    Ok(Served {
                        payload: empty_payload(domain),
                        meta: CacheMeta::fetched(Some(prior.updated_at)),
                    })
                }
                None => {
                    let entry = self.store.save(domain, key, empty_payload(domain)).await?;
                    tracing::info!(%domain, %key, "Force refresh returned no data, cached empty payload");
                    Ok(Served {
                        meta: CacheMeta::fetched(Some(entry.updated_at)),
                        payload: entry.payload,
                    })
                }
            },
        }
    }
}
