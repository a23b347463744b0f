//! Single-flight coordination for background refreshes.
//!
//! One coordinator serves every domain. A (domain, key) pair can hold at most
//! one [`RefreshTicket`] at a time; the ticket is released when it is
//! dropped, so every exit path of a refresh (success, error, panic, timeout)
//! gives the key back exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ghdash_core::{CacheDomain, ResourceKey};

type TicketKey = (CacheDomain, ResourceKey);

#[derive(Debug, Clone, Copy)]
struct TicketInfo {
    id: u64,
    acquired_at: Instant,
}

#[derive(Debug, Default)]
struct Shared {
    in_flight: DashMap<TicketKey, TicketInfo>,
    next_id: AtomicU64,
}

/// Guarded set of in-flight refreshes.
#[derive(Debug, Clone, Default)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the refresh slot for (domain, key).
    ///
    /// Returns `None` when another refresh for the same pair is in flight.
    /// Check and insert happen under the map's shard lock, so two racing
    /// callers can never both succeed.
    pub fn try_acquire(&self, domain: CacheDomain, key: &ResourceKey) -> Option<RefreshTicket> {
        match self.shared.in_flight.entry((domain, key.clone())) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(TicketInfo {
                    id,
                    acquired_at: Instant::now(),
                });
                Some(RefreshTicket {
                    shared: Arc::clone(&self.shared),
                    domain,
                    key: key.clone(),
                    id,
                })
            }
        }
    }

    pub fn is_refreshing(&self, domain: CacheDomain, key: &ResourceKey) -> bool {
        self.shared.in_flight.contains_key(&(domain, key.clone()))
    }

    /// Number of refreshes currently holding a ticket.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.len()
    }

    /// How long the current ticket for (domain, key) has been held.
    pub fn held_for(&self, domain: CacheDomain, key: &ResourceKey) -> Option<Duration> {
        self.shared
            .in_flight
            .get(&(domain, key.clone()))
            .map(|info| info.acquired_at.elapsed())
    }
}

/// Proof of an exclusive refresh slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct RefreshTicket {
    shared: Arc<Shared>,
    domain: CacheDomain,
    key: ResourceKey,
    id: u64,
}

impl RefreshTicket {
    pub fn domain(&self) -> CacheDomain {
        self.domain
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        // Only remove our own ticket; the id guards against removing a newer one.
        self.shared
            .in_flight
            .remove_if(&(self.domain, self.key.clone()), |_, info| info.id == self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn key(s: &str) -> ResourceKey {
        s.parse().expect("test key should parse")
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let coordinator = RefreshCoordinator::new();
        let k = key("acme/widgets");

        let ticket = coordinator.try_acquire(CacheDomain::Workflow, &k);
        assert!(ticket.is_some());
        assert!(coordinator.try_acquire(CacheDomain::Workflow, &k).is_none());
        assert!(coordinator.is_refreshing(CacheDomain::Workflow, &k));
        assert_eq!(coordinator.in_flight(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let coordinator = RefreshCoordinator::new();
        let k = key("acme/widgets");

        drop(coordinator.try_acquire(CacheDomain::Workflow, &k));
        assert!(!coordinator.is_refreshing(CacheDomain::Workflow, &k));
        assert!(coordinator.try_acquire(CacheDomain::Workflow, &k).is_some());
    }

    #[test]
    fn test_domains_and_keys_are_independent() {
        let coordinator = RefreshCoordinator::new();
        let k = key("acme/widgets");

        let _a = coordinator.try_acquire(CacheDomain::Workflow, &k);
        assert!(coordinator.try_acquire(CacheDomain::DevStats, &k).is_some());
        assert!(coordinator
            .try_acquire(CacheDomain::Workflow, &key("acme/gadgets"))
            .is_some());
    }

    #[test]
    fn test_release_on_panic() {
        let coordinator = RefreshCoordinator::new();
        let k = key("acme/widgets");

        let inner = coordinator.clone();
        let inner_key = k.clone();
        let result = std::thread::spawn(move || {
            let _ticket = inner.try_acquire(CacheDomain::Lifecycle, &inner_key);
            panic!("refresh blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(coordinator.try_acquire(CacheDomain::Lifecycle, &k).is_some());
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let coordinator = RefreshCoordinator::new();
        let k = key("acme/widgets");
        let threads = 16;
        let start = Arc::new(Barrier::new(threads));
        let attempted = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let coordinator = coordinator.clone();
                let start = Arc::clone(&start);
                let attempted = Arc::clone(&attempted);
                let k = k.clone();
                std::thread::spawn(move || {
                    start.wait();
                    let ticket = coordinator.try_acquire(CacheDomain::Workflow, &k);
                    // Hold the winner's ticket until everyone has tried.
                    attempted.wait();
                    ticket.is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
