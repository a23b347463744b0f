//! Hooks for recording cache and refresh activity.
//!
//! The storage crate stays free of any metrics backend; the API layer
//! implements [`RefreshObserver`] on top of its Prometheus registry.

use ghdash_core::CacheDomain;

use crate::refresh::RefreshResult;

/// Which branch of the stale-while-revalidate policy served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Cached and within TTL
    Fresh,
    /// Cached but past TTL; served while a refresh runs
    Stale,
    /// Nothing cached; fetched synchronously
    Miss,
    /// Force refresh; fetched synchronously
    Forced,
}

impl ServeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServeOutcome::Fresh => "fresh",
            ServeOutcome::Stale => "stale",
            ServeOutcome::Miss => "miss",
            ServeOutcome::Forced => "force",
        }
    }
}

/// Receives cache and refresh events. Every method defaults to a no-op.
pub trait RefreshObserver: Send + Sync {
    fn request_served(&self, _domain: CacheDomain, _outcome: ServeOutcome) {}

    /// A background refresh was accepted by the pool.
    fn refresh_scheduled(&self, _domain: CacheDomain) {}

    /// A background refresh could not be queued.
    fn refresh_rejected(&self, _domain: CacheDomain) {}

    /// A worker started running a refresh.
    fn refresh_started(&self, _domain: CacheDomain) {}

    /// A refresh ended; its ticket has been released.
    fn refresh_finished(&self, _domain: CacheDomain, _result: &RefreshResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RefreshObserver for NoopObserver {}
