//! Test doubles for the refresh machinery.
//!
//! Lives in the source crate so unit tests here and integration tests in
//! dependent crates share one implementation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ghdash_core::{CacheDomain, DomainFetcher, FetchError, FetchOutcome, ResourceKey};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::refresh::RefreshCoordinator;

type Scripted = Result<FetchOutcome, FetchError>;

/// Fetcher with scripted outcomes.
///
/// Queued outcomes are returned in order; once the queue is empty every call
/// returns the fallback.
pub struct StubFetcher {
    domain: CacheDomain,
    queued: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    calls: AtomicUsize,
    keys: Mutex<Vec<ResourceKey>>,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
}

impl StubFetcher {
    pub fn new(domain: CacheDomain, fallback: Scripted) -> Self {
        Self {
            domain,
            queued: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
            gate: None,
            delay: None,
        }
    }

    pub fn returning(domain: CacheDomain, payload: Value) -> Self {
        Self::new(domain, Ok(FetchOutcome::Data(payload)))
    }

    pub fn no_data(domain: CacheDomain) -> Self {
        Self::new(domain, Ok(FetchOutcome::NoData))
    }

    pub fn failing(domain: CacheDomain, error: FetchError) -> Self {
        Self::new(domain, Err(error))
    }

    /// Return `outcome` for the next call before falling back.
    pub fn then(self, outcome: Scripted) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block every call until the returned gate is opened.
    pub fn gated(mut self) -> (Self, Gate) {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&semaphore));
        (self, Gate { semaphore })
    }

    /// Number of `fetch` calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys passed to `fetch`, in call order.
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl DomainFetcher for StubFetcher {
    fn domain(&self) -> CacheDomain {
        self.domain
    }

    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(key.clone());

        if let Some(gate) = &self.gate {
            // Closed only when the gate is dropped along with the fetcher.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Releases calls blocked in a gated [`StubFetcher`].
#[derive(Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
}

impl Gate {
    /// Let every current and future call through.
    pub fn open(&self) {
        self.semaphore.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Let exactly one call through.
    pub fn release_one(&self) {
        self.semaphore.add_permits(1);
    }
}

/// Poll until no refresh holds a ticket. Returns false on timeout.
pub async fn wait_for_idle(coordinator: &RefreshCoordinator, timeout: Duration) -> bool {
    wait_until(timeout, || coordinator.in_flight() == 0).await
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
