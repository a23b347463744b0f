//! Startup cache warmer.
//!
//! Walks every cached key once and queues a background refresh for each
//! stale one, exactly as a request hitting that key would. Missing keys are
//! left alone; the first request for them fetches synchronously.

use ghdash_core::CacheDomain;
use ghdash_storage::{ScheduleOutcome, SwrPolicy};
use serde::Serialize;

/// Counts from one warmup pass. Only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    /// Keys enumerated across all domains
    pub scanned: u64,
    /// Keys found past their TTL
    pub stale: u64,
    /// Stale keys with a refresh queued by this pass
    pub scheduled: u64,
    /// Stale keys not queued: already refreshing, queue full, no fetcher,
    /// or unreadable
    pub skipped: u64,
}

/// Run one warmup pass over every domain.
///
/// Never fails: a domain whose keys cannot be listed is logged and skipped.
pub async fn run_warmup(swr: &SwrPolicy) -> WarmupReport {
    let mut report = WarmupReport::default();

    for domain in CacheDomain::ALL {
        let keys = match swr.store().list_keys(domain).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(%domain, error = %e, "Warmup could not list keys");
                continue;
            }
        };

        for key in keys {
            report.scanned += 1;
            match swr.refresh_if_stale(domain, &key).await {
                Ok(None) => {}
                Ok(Some(ScheduleOutcome::Scheduled)) => {
                    report.stale += 1;
                    report.scheduled += 1;
                }
                Ok(Some(outcome)) => {
                    report.stale += 1;
                    report.skipped += 1;
                    tracing::debug!(%domain, %key, ?outcome, "Warmup skipped stale key");
                }
                Err(e) => {
                    report.skipped += 1;
                    tracing::warn!(%domain, %key, error = %e, "Warmup could not read entry");
                }
            }
        }
    }

    tracing::info!(
        scanned = report.scanned,
        stale = report.stale,
        scheduled = report.scheduled,
        skipped = report.skipped,
        "Cache warmup finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ghdash_test_utils::fixtures::{test_key, workflow_payload};
    use ghdash_test_utils::{ResourceKey, StubFetcher, SwrHarness};
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_warmup_schedules_only_stale_keys() {
        let fetcher = Arc::new(StubFetcher::returning(CacheDomain::Workflow, workflow_payload(5)));
        let harness = SwrHarness::builder()
            .fetcher(fetcher.clone())
            .ttl(CacheDomain::Workflow, HOUR)
            .build();

        let fresh: ResourceKey = "acme/fresh".parse().expect("valid key");
        harness.seed(CacheDomain::Workflow, &test_key(), workflow_payload(1), 2 * HOUR).await;
        harness.seed(CacheDomain::Workflow, &fresh, workflow_payload(1), HOUR / 2).await;

        let report = run_warmup(&harness.policy).await;
        assert_eq!(
            report,
            WarmupReport { scanned: 2, stale: 1, scheduled: 1, skipped: 0 }
        );

        assert!(harness.wait_for_idle().await);
        assert_eq!(fetcher.keys(), vec![test_key()]);
        let refreshed = harness.stored(CacheDomain::Workflow, &test_key()).await.expect("entry kept");
        assert_eq!(refreshed.payload["all_time_total"], 5);

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_warmup_skips_keys_already_refreshing_or_unfetchable() {
        let fetcher = Arc::new(StubFetcher::returning(CacheDomain::Workflow, json!({})));
        let harness = SwrHarness::builder()
            .fetcher(fetcher.clone())
            .ttl(CacheDomain::Workflow, HOUR)
            .ttl(CacheDomain::DevStats, HOUR)
            .build();

        harness.seed(CacheDomain::Workflow, &test_key(), json!({}), 2 * HOUR).await;
        // No fetcher is registered for dev stats.
        harness.seed(CacheDomain::DevStats, &test_key(), json!([]), 2 * HOUR).await;

        let held = harness
            .policy
            .coordinator()
            .try_acquire(CacheDomain::Workflow, &test_key())
            .expect("ticket should be free");

        let report = run_warmup(&harness.policy).await;
        assert_eq!(
            report,
            WarmupReport { scanned: 2, stale: 2, scheduled: 0, skipped: 2 }
        );
        assert_eq!(fetcher.calls(), 0);

        drop(held);
        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_warmup_on_empty_store() {
        let harness = SwrHarness::builder().build();
        assert_eq!(run_warmup(&harness.policy).await, WarmupReport::default());
        harness.shutdown().await;
    }
}
