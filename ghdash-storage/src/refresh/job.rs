//! One background refresh of one (domain, key).

use std::sync::Arc;
use std::time::Duration;

use ghdash_core::{CacheDomain, DomainFetcher, FetchOutcome, ResourceKey, Timestamp};

use super::coordinator::RefreshTicket;
use crate::cache::CacheStore;

/// How a background refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshResult {
    /// Fetched data and saved it.
    Saved { updated_at: Timestamp },
    /// Upstream had nothing; the existing entry was left untouched.
    NoData,
    /// Fetch or save failed; the existing entry was left untouched.
    Failed { error: String },
    /// Exceeded the refresh timeout; the existing entry was left untouched.
    TimedOut,
    /// The refresh task panicked.
    Panicked,
}

impl RefreshResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshResult::Saved { .. } => "saved",
            RefreshResult::NoData => "no_data",
            RefreshResult::Failed { .. } => "failed",
            RefreshResult::TimedOut => "timeout",
            RefreshResult::Panicked => "panicked",
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, RefreshResult::Saved { .. })
    }
}

/// A refresh ready to run. Owns the ticket for its (domain, key), so the
/// slot stays claimed while the job waits in the queue and is released
/// however the job ends, including being dropped unrun.
pub struct RefreshJob {
    ticket: RefreshTicket,
    fetcher: Arc<dyn DomainFetcher>,
    store: Arc<dyn CacheStore>,
}

impl RefreshJob {
    pub fn new(
        ticket: RefreshTicket,
        fetcher: Arc<dyn DomainFetcher>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            ticket,
            fetcher,
            store,
        }
    }

    pub fn domain(&self) -> CacheDomain {
        self.ticket.domain()
    }

    pub fn key(&self) -> &ResourceKey {
        self.ticket.key()
    }

    /// Fetch and, only on real data, save. Never overwrites an entry with
    /// an empty or failed result.
    pub async fn run(self, timeout: Option<Duration>) -> RefreshResult {
        let domain = self.domain();
        let key = self.key().clone();

        let attempt = refresh_once(self.fetcher.as_ref(), self.store.as_ref(), domain, &key);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or(RefreshResult::TimedOut),
            None => attempt.await,
        };

        match &result {
            RefreshResult::Saved { updated_at } => {
                tracing::info!(%domain, %key, %updated_at, "Background refresh saved");
            }
            RefreshResult::NoData => {
                tracing::warn!(%domain, %key, "Background refresh returned no data, keeping cached entry");
            }
            RefreshResult::Failed { error } => {
                tracing::error!(%domain, %key, error = %error, "Background refresh failed, keeping cached entry");
            }
            RefreshResult::TimedOut => {
                tracing::warn!(
                    %domain,
                    %key,
                    timeout_secs = timeout.map(|t| t.as_secs()).unwrap_or_default(),
                    "Background refresh timed out, releasing ticket"
                );
            }
            RefreshResult::Panicked => {}
        }

        drop(self.ticket);
        result
    }
}

async fn refresh_once(
    fetcher: &dyn DomainFetcher,
    store: &dyn CacheStore,
    domain: CacheDomain,
    key: &ResourceKey,
) -> RefreshResult {
    match fetcher.fetch(key).await {
        Ok(FetchOutcome::Data(payload)) => match store.save(domain, key, payload).await {
            Ok(entry) => RefreshResult::Saved {
                updated_at: entry.updated_at,
            },
            Err(e) => RefreshResult::Failed {
                error: e.to_string(),
            },
        },
        Ok(FetchOutcome::NoData) => RefreshResult::NoData,
        Err(e) => RefreshResult::Failed {
            error: e.to_string(),
        },
    }
}
