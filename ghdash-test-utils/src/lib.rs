//! ghdash Test Utilities
//!
//! Centralized test infrastructure for the ghdash workspace:
//! - A ready-wired SWR harness over an in-memory store and a manual clock
//! - Proptest generators for keys and domains
//! - Fixture payloads shaped like the real fetcher output
//! - Assertions over cache metadata

use std::sync::Arc;
use std::time::Duration;

// Re-export test doubles from their source crates
pub use ghdash_github::testing::{InstantSleeper, ScriptedTransport};
pub use ghdash_storage::testing::{wait_for_idle, wait_until, Gate, StubFetcher};
pub use ghdash_storage::MemoryCacheStore;

// Re-export core types for convenience
pub use ghdash_core::{
    CacheDomain, CacheEntry, Clock, DomainFetcher, FetchError, FetchOutcome, ManualClock,
    ResourceKey, Timestamp, TransportError,
};

use ghdash_storage::{
    CacheMeta, CacheStore, NoopObserver, RefreshCoordinator, RefreshObserver, RefreshPool,
    RefreshPoolConfig, StalenessPolicy, SwrPolicy,
};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ============================================================================
// SWR HARNESS
// ============================================================================

/// A running [`SwrPolicy`] over a [`MemoryCacheStore`] and a [`ManualClock`].
///
/// Must be built inside a tokio runtime since it starts the refresh pool.
pub struct SwrHarness {
    pub policy: Arc<SwrPolicy>,
    pub store: Arc<MemoryCacheStore>,
    pub clock: Arc<ManualClock>,
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
}

impl SwrHarness {
    pub fn builder() -> SwrHarnessBuilder {
        SwrHarnessBuilder::default()
    }

    /// Seed an entry `age` old relative to the harness clock.
    pub async fn seed(&self, domain: CacheDomain, key: &ResourceKey, payload: Value, age: Duration) {
        let age = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let updated_at = self.clock.now() - age;
        self.store
            .seed(CacheEntry::new(domain, key.clone(), payload, updated_at))
            .await;
    }

    /// The stored entry; panics if the store fails.
    pub async fn stored(&self, domain: CacheDomain, key: &ResourceKey) -> Option<CacheEntry> {
        match self.store.get(domain, key).await {
            Ok(entry) => entry,
            Err(e) => panic!("cache read failed: {}", e),
        }
    }

    /// Wait until no refresh holds a ticket.
    pub async fn wait_for_idle(&self) -> bool {
        wait_for_idle(self.policy.coordinator(), Duration::from_secs(5)).await
    }

    /// Signal the pool to stop and wait for the dispatcher to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.dispatcher.await;
    }
}

/// Builder for [`SwrHarness`].
pub struct SwrHarnessBuilder {
    fetchers: Vec<Arc<dyn DomainFetcher>>,
    staleness: StalenessPolicy,
    pool: RefreshPoolConfig,
    observer: Arc<dyn RefreshObserver>,
}

impl Default for SwrHarnessBuilder {
    fn default() -> Self {
        Self {
            fetchers: Vec::new(),
            staleness: StalenessPolicy::new(),
            pool: RefreshPoolConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }
}

impl SwrHarnessBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn DomainFetcher>) -> Self {
        self.fetchers.push(fetcher);
        self
    }

    pub fn ttl(mut self, domain: CacheDomain, ttl: Duration) -> Self {
        self.staleness = self.staleness.with_ttl(domain, ttl);
        self
    }

    pub fn pool(mut self, pool: RefreshPoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> SwrHarness {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryCacheStore::with_clock(clock.clone()));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (pool, dispatcher) = RefreshPool::start(self.pool, Arc::clone(&self.observer), shutdown_rx);

        let mut policy = SwrPolicy::new(store.clone(), RefreshCoordinator::new(), pool)
            .with_staleness(self.staleness)
            .with_observer(self.observer);
        for fetcher in self.fetchers {
            policy = policy.with_fetcher(fetcher);
        }

        SwrHarness {
            policy: Arc::new(policy),
            store,
            clock,
            shutdown,
            dispatcher,
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_domain() -> impl Strategy<Value = CacheDomain> {
        proptest::sample::select(CacheDomain::ALL.to_vec())
    }

    pub fn arb_resource_key() -> impl Strategy<Value = ResourceKey> {
        ("[A-Za-z0-9_.-]{1,20}", "[A-Za-z0-9_.-]{1,40}").prop_filter_map(
            "segments are always valid",
            |(owner, repo)| ResourceKey::new(&owner, &repo).ok(),
        )
    }

    /// Strings that are never valid keys: no separator, or a bad character.
    pub fn arb_invalid_key() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z0-9]{1,20}",
            "[A-Za-z0-9]{1,10} [A-Za-z0-9]{1,10}/[A-Za-z0-9]{1,10}",
            "[A-Za-z0-9]{1,10}/[A-Za-z0-9]{1,10}/[A-Za-z0-9]{1,10}",
        ]
    }

    /// TTLs between one minute and one day, in whole minutes.
    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        (1u64..=1440).prop_map(|minutes| Duration::from_secs(minutes * 60))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn test_key() -> ResourceKey {
        match ResourceKey::new("acme", "widgets") {
            Ok(key) => key,
            Err(e) => panic!("fixture key rejected: {}", e),
        }
    }

    /// A workflow payload with `n` completed runs.
    pub fn workflow_payload(n: usize) -> Value {
        let runs: Vec<Value> = (0..n)
            .map(|i| {
                json!({
                    "id": 1000 + i,
                    "name": "CI",
                    "workflow_id": 7,
                    "status": "completed",
                    "conclusion": if i % 5 == 0 { "failure" } else { "success" },
                    "event": "push",
                    "head_branch": "main",
                    "run_number": i + 1,
                    "run_attempt": 1,
                    "created_at": "2024-03-01T12:00:00Z",
                    "updated_at": "2024-03-01T12:05:00Z",
                    "run_started_at": "2024-03-01T12:00:10Z",
                    "html_url": null,
                    "actor_login": "octocat",
                    "duration_seconds": 300,
                })
            })
            .collect();
        json!({
            "runs": runs,
            "workflows": [{ "id": 7, "name": "CI", "path": ".github/workflows/ci.yml", "state": "active" }],
            "all_time_total": n,
        })
    }

    /// A code activity payload covering `weeks` consecutive weeks.
    pub fn code_activity_payload(weeks: usize) -> Value {
        let code_changes: Vec<Value> = (0..weeks)
            .map(|i| json!({ "week": format!("w{:02}", i), "additions": i * 10, "deletions": i }))
            .collect();
        let weekly_commits: Vec<Value> = (0..weeks)
            .map(|i| json!({ "week": format!("w{:02}", i), "total": i, "days": [0, i, 0, 0, 0, 0, 0] }))
            .collect();
        json!({
            "code_changes": code_changes,
            "weekly_commits": weekly_commits,
            "owner_commits": vec![1; weeks],
            "community_commits": vec![2; weeks],
        })
    }

    /// One merged pull request reviewed two hours after creation, and one
    /// open pull request with no reviews.
    pub fn lifecycle_payload() -> Value {
        json!([
            {
                "number": 1,
                "title": "Add caching",
                "state": "merged",
                "author": "octocat",
                "created_at": "2024-03-01T10:00:00Z",
                "merged_at": "2024-03-01T15:00:00Z",
                "closed_at": "2024-03-01T15:00:00Z",
                "updated_at": "2024-03-01T15:00:00Z",
                "all_reviews": [
                    { "login": "hubot", "submitted_at": "2024-03-01T12:00:00Z", "state": "APPROVED" }
                ],
                "first_review_at": "2024-03-01T12:00:00Z",
                "first_reviewer": "hubot",
            },
            {
                "number": 2,
                "title": "Fix flaky test",
                "state": "open",
                "author": "monalisa",
                "created_at": "2024-03-02T10:00:00Z",
                "merged_at": null,
                "closed_at": null,
                "updated_at": "2024-03-02T10:00:00Z",
                "all_reviews": [],
                "first_review_at": null,
                "first_reviewer": null,
            }
        ])
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    /// Produced by a fetch made for this request.
    pub fn assert_fetched(meta: &CacheMeta) {
        assert!(!meta.cached, "expected a fetch, got cached: {:?}", meta);
        assert!(!meta.stale, "a fetched payload is never stale: {:?}", meta);
    }

    /// Served from a fresh entry without scheduling anything.
    pub fn assert_fresh_hit(meta: &CacheMeta) {
        assert!(meta.cached, "expected a cache hit: {:?}", meta);
        assert!(!meta.stale, "expected fresh: {:?}", meta);
        assert!(!meta.refreshing, "fresh hits never refresh: {:?}", meta);
    }

    /// Served from a stale entry with a refresh pending.
    pub fn assert_stale_refreshing(meta: &CacheMeta) {
        assert!(meta.cached, "expected a cache hit: {:?}", meta);
        assert!(meta.stale, "expected stale: {:?}", meta);
        assert!(meta.refreshing, "expected a pending refresh: {:?}", meta);
    }
}
