//! Bounded worker pool for background refreshes.
//!
//! Jobs go through a bounded queue to a single dispatcher, which runs at
//! most `workers` of them at once. A full queue rejects new jobs instead of
//! growing; the rejected job's ticket is released on drop, so the key is
//! simply retried by a later request.
//!
//! # Usage
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let (pool, dispatcher) = RefreshPool::start(RefreshPoolConfig::default(), observer, shutdown_rx);
//!
//! pool.submit(job)?;
//!
//! // On shutdown: running jobs finish, queued jobs are dropped.
//! let _ = shutdown_tx.send(true);
//! dispatcher.await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use super::job::{RefreshJob, RefreshResult};
use crate::observer::RefreshObserver;

/// Default number of refreshes running at once.
pub const DEFAULT_REFRESH_WORKERS: usize = 4;

/// Default number of refreshes waiting for a worker.
pub const DEFAULT_REFRESH_QUEUE_CAPACITY: usize = 64;

/// Default limit on a single background refresh.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPoolConfig {
    /// Maximum refreshes running at once
    pub workers: usize,
    /// Maximum refreshes waiting for a worker
    pub queue_capacity: usize,
    /// Hard limit per refresh; `None` lets a refresh run forever
    pub refresh_timeout: Option<Duration>,
}

impl Default for RefreshPoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_REFRESH_WORKERS,
            queue_capacity: DEFAULT_REFRESH_QUEUE_CAPACITY,
            refresh_timeout: Some(Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS)),
        }
    }
}

impl RefreshPoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for pool activity since startup.
#[derive(Debug, Default)]
pub struct RefreshPoolMetrics {
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub saved: AtomicU64,
    pub no_data: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub panicked: AtomicU64,
}

impl RefreshPoolMetrics {
    pub fn snapshot(&self) -> RefreshPoolSnapshot {
        RefreshPoolSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            no_data: self.no_data.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }

    fn record(&self, result: &RefreshResult) {
        let counter = match result {
            RefreshResult::Saved { .. } => &self.saved,
            RefreshResult::NoData => &self.no_data,
            RefreshResult::Failed { .. } => &self.failed,
            RefreshResult::TimedOut => &self.timed_out,
            RefreshResult::Panicked => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshPoolSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub saved: u64,
    pub no_data: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
}

impl RefreshPoolSnapshot {
    /// Refreshes that ran to an outcome.
    pub fn completed(&self) -> u64 {
        self.saved + self.no_data + self.failed + self.timed_out + self.panicked
    }
}

// ============================================================================
// POOL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Refresh queue is full")]
    QueueFull,
    #[error("Refresh pool has shut down")]
    Closed,
}

/// Handle for submitting refresh jobs. Cheap to clone.
#[derive(Clone)]
pub struct RefreshPool {
    sender: mpsc::Sender<RefreshJob>,
    metrics: Arc<RefreshPoolMetrics>,
    observer: Arc<dyn RefreshObserver>,
}

impl RefreshPool {
    /// Spawn the dispatcher and return the submit handle plus the
    /// dispatcher's join handle, which resolves after shutdown has drained
    /// every running job.
    pub fn start(
        config: RefreshPoolConfig,
        observer: Arc<dyn RefreshObserver>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let metrics = Arc::new(RefreshPoolMetrics::default());

        let dispatcher = tokio::spawn(dispatch_loop(
            receiver,
            config,
            Arc::clone(&observer),
            Arc::clone(&metrics),
            shutdown_rx,
        ));

        (
            Self {
                sender,
                metrics,
                observer,
            },
            dispatcher,
        )
    }

    /// Queue a job without waiting. On error the job is dropped, which
    /// releases its ticket.
    pub fn submit(&self, job: RefreshJob) -> Result<(), SubmitError> {
        let domain = job.domain();
        match self.sender.try_send(job) {
            Ok(()) => {
                self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
                self.observer.refresh_scheduled(domain);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                self.observer.refresh_rejected(domain);
                tracing::warn!(%domain, key = %job.key(), "Refresh queue full, dropping refresh");
                Err(SubmitError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.observer.refresh_rejected(domain);
                Err(SubmitError::Closed)
            }
        }
    }

    pub fn metrics(&self) -> RefreshPoolSnapshot {
        self.metrics.snapshot()
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

async fn shutdown_signalled(shutdown_rx: &mut watch::Receiver<bool>) {
    if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
        // Sender gone without signalling: run until the queue closes.
        std::future::pending::<()>().await;
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::Receiver<RefreshJob>,
    config: RefreshPoolConfig,
    observer: Arc<dyn RefreshObserver>,
    metrics: Arc<RefreshPoolMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let workers = config.workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));

    tracing::info!(
        workers,
        queue_capacity = config.queue_capacity,
        timeout_secs = config.refresh_timeout.map(|t| t.as_secs()),
        "Refresh pool started"
    );

    loop {
        let permit = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown_rx) => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown_rx) => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        spawn_worker(
            job,
            permit,
            config.refresh_timeout,
            Arc::clone(&observer),
            Arc::clone(&metrics),
        );
    }

    // Queued jobs are dropped here, releasing their tickets.
    receiver.close();
    while receiver.try_recv().is_ok() {}

    // Wait for running jobs: each holds a permit until it finishes.
    let _all = semaphore.acquire_many(workers as u32).await;

    let snapshot = metrics.snapshot();
    tracing::info!(
        submitted = snapshot.submitted,
        saved = snapshot.saved,
        no_data = snapshot.no_data,
        failed = snapshot.failed,
        timed_out = snapshot.timed_out,
        rejected = snapshot.rejected,
        "Refresh pool stopped"
    );
}

fn spawn_worker(
    job: RefreshJob,
    permit: OwnedSemaphorePermit,
    timeout: Option<Duration>,
    observer: Arc<dyn RefreshObserver>,
    metrics: Arc<RefreshPoolMetrics>,
) {
    let domain = job.domain();
    let key = job.key().clone();

    tokio::spawn(async move {
        let _permit = permit;
        observer.refresh_started(domain);

        // Run in its own task so a panic is observed here instead of
        // silently taking the permit bookkeeping down with it.
        let result = match tokio::spawn(job.run(timeout)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%domain, %key, error = %e, "Background refresh panicked");
                RefreshResult::Panicked
            }
        };

        metrics.record(&result);
        observer.refresh_finished(domain, &result);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore};
    use crate::refresh::RefreshCoordinator;
    use crate::testing::{wait_for_idle, wait_until, StubFetcher};
    use ghdash_core::{CacheDomain, DomainFetcher, FetchOutcome, ResourceKey};
    use serde_json::json;

    fn key(s: &str) -> ResourceKey {
        s.parse().expect("test key should parse")
    }

    fn start_pool(config: RefreshPoolConfig) -> (RefreshPool, JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (pool, handle) =
            RefreshPool::start(config, Arc::new(crate::observer::NoopObserver), shutdown_rx);
        (pool, handle, shutdown_tx)
    }

    #[test]
    fn test_config_defaults() {
        let config = RefreshPoolConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.refresh_timeout, Some(Duration::from_secs(300)));
        assert_eq!(RefreshPoolConfig::default().with_workers(0).workers, 1);
    }

    #[tokio::test]
    async fn test_job_saves_and_releases_ticket() {
        let (pool, _handle, _shutdown) = start_pool(RefreshPoolConfig::default());
        let coordinator = RefreshCoordinator::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let fetcher: Arc<dyn DomainFetcher> =
            Arc::new(StubFetcher::returning(CacheDomain::Workflow, json!({"runs": [1]})));
        let k = key("acme/widgets");

        let ticket = coordinator
            .try_acquire(CacheDomain::Workflow, &k)
            .expect("slot should be free");
        pool.submit(RefreshJob::new(ticket, fetcher, Arc::clone(&store)))
            .expect("submit should succeed");

        assert!(wait_for_idle(&coordinator, Duration::from_secs(5)).await);
        let entry = store
            .get(CacheDomain::Workflow, &k)
            .await
            .expect("get should succeed")
            .expect("refresh should have saved");
        assert_eq!(entry.payload, json!({"runs": [1]}));
        assert_eq!(pool.metrics().submitted, 1);
    }

    #[tokio::test]
    async fn test_timeout_releases_ticket_and_keeps_cache() {
        let config = RefreshPoolConfig::default().with_refresh_timeout(Some(Duration::from_millis(50)));
        let (pool, _handle, _shutdown) = start_pool(config);
        let coordinator = RefreshCoordinator::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let k = key("acme/widgets");
        store
            .save(CacheDomain::DevStats, &k, json!(["old"]))
            .await
            .expect("seed should succeed");

        let (stub, _gate) = StubFetcher::returning(CacheDomain::DevStats, json!(["new"])).gated();
        let fetcher: Arc<dyn DomainFetcher> = Arc::new(stub);
        let ticket = coordinator
            .try_acquire(CacheDomain::DevStats, &k)
            .expect("slot should be free");
        pool.submit(RefreshJob::new(ticket, fetcher, Arc::clone(&store)))
            .expect("submit should succeed");

        assert!(wait_for_idle(&coordinator, Duration::from_secs(5)).await);
        assert!(coordinator.try_acquire(CacheDomain::DevStats, &k).is_some());
        let entry = store
            .get(CacheDomain::DevStats, &k)
            .await
            .expect("get should succeed")
            .expect("entry should remain");
        assert_eq!(entry.payload, json!(["old"]));

        // The worker records the outcome just after the ticket drops.
        assert!(wait_until(Duration::from_secs(5), || pool.metrics().timed_out == 1).await);
        assert_eq!(pool.metrics().completed(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_releases() {
        let config = RefreshPoolConfig::default()
            .with_workers(1)
            .with_queue_capacity(1)
            .with_refresh_timeout(None);
        let (pool, _handle, _shutdown) = start_pool(config);
        let coordinator = RefreshCoordinator::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let (stub, gate) = StubFetcher::returning(CacheDomain::Lifecycle, json!([])).gated();
        let fetcher: Arc<dyn DomainFetcher> = Arc::new(stub);

        let mut results = Vec::new();
        for name in ["a/one", "a/two", "a/three", "a/four"] {
            let k = key(name);
            let ticket = coordinator
                .try_acquire(CacheDomain::Lifecycle, &k)
                .expect("distinct keys should be free");
            results.push(pool.submit(RefreshJob::new(
                ticket,
                Arc::clone(&fetcher),
                Arc::clone(&store),
            )));
            if results.len() == 1 {
                // The dispatcher holds the first job before more are queued.
                assert!(wait_until(Duration::from_secs(5), || pool.queued() == 0).await);
            }
        }

        assert!(results.iter().any(|r| *r == Err(SubmitError::QueueFull)));
        let rejected: Vec<_> = ["a/one", "a/two", "a/three", "a/four"]
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.is_err())
            .map(|(name, _)| key(name))
            .collect();
        for k in &rejected {
            assert!(!coordinator.is_refreshing(CacheDomain::Lifecycle, k));
        }

        gate.open();
        assert!(wait_for_idle(&coordinator, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_shutdown_drains_running_and_closes_queue() {
        let (pool, handle, shutdown) = start_pool(RefreshPoolConfig::default());
        let coordinator = RefreshCoordinator::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let fetcher: Arc<dyn DomainFetcher> = Arc::new(
            StubFetcher::new(CacheDomain::CodeActivity, Ok(FetchOutcome::NoData))
                .with_delay(Duration::from_millis(50)),
        );
        let k = key("acme/widgets");
        let ticket = coordinator
            .try_acquire(CacheDomain::CodeActivity, &k)
            .expect("slot should be free");
        pool.submit(RefreshJob::new(ticket, fetcher, store))
            .expect("submit should succeed");
        assert!(wait_until(Duration::from_secs(5), || pool.queued() == 0).await);

        let _ = shutdown.send(true);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher should stop")
            .expect("dispatcher should not panic");

        assert_eq!(coordinator.in_flight(), 0);
        assert_eq!(pool.metrics().no_data, 1);

        let other = key("acme/gadgets");
        let ticket = coordinator
            .try_acquire(CacheDomain::CodeActivity, &other)
            .expect("slot should be free");
        let job = RefreshJob::new(
            ticket,
            Arc::new(StubFetcher::new(CacheDomain::CodeActivity, Ok(FetchOutcome::NoData))),
            Arc::new(MemoryCacheStore::new()),
        );
        assert_eq!(pool.submit(job), Err(SubmitError::Closed));
        assert!(!coordinator.is_refreshing(CacheDomain::CodeActivity, &other));
    }
}
