//! Derived views over cached payloads.
//!
//! The cache stores what the fetchers produced; these pure functions turn
//! a payload into what a dashboard panel shows. They run on every request,
//! so filters and windows never fragment the cache.

use ghdash_core::Timestamp;

pub mod activity;
pub mod lifecycle;
pub mod responsiveness;
pub mod workflow;

pub use activity::{summarize_activity, ActivitySummary, CodeActivityView};
pub use lifecycle::{
    lifecycle_metrics, LifecycleMetrics, MergeTimeDistribution, PullRequestRow, StalePullRequest,
};
pub use responsiveness::{
    review_responsiveness, ReviewBottleneck, ReviewResponsiveness, ReviewerResponsiveness,
};
pub use workflow::{filter_runs, WorkflowFilter, WorkflowRunCount, WorkflowStats, WorkflowView};

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub(crate) fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    })
}

/// Percentage of `part` in `whole`, one decimal; zero when `whole` is zero.
pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}
