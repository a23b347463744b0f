//! Pull request lifecycle metrics: time to merge, time to first review,
//! merge-time distribution and open pull requests gone quiet.

use ghdash_core::{PullRequestLifecycle, Timestamp};
use serde::{Deserialize, Serialize};

use super::{hours_between, mean, median, round_to};
use crate::constants::STALE_PULL_REQUEST_DAYS;

/// Merged pull requests bucketed by hours from creation to merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeTimeDistribution {
    #[serde(rename = "<1h")]
    pub under_1h: u32,
    #[serde(rename = "1-4h")]
    pub from_1h_to_4h: u32,
    #[serde(rename = "4-24h")]
    pub from_4h_to_1d: u32,
    #[serde(rename = "1-3d")]
    pub from_1d_to_3d: u32,
    #[serde(rename = "3-7d")]
    pub from_3d_to_7d: u32,
    #[serde(rename = ">7d")]
    pub over_7d: u32,
}

impl MergeTimeDistribution {
    fn record(&mut self, hours: f64) {
        let bucket = match hours {
            h if h < 1.0 => &mut self.under_1h,
            h if h < 4.0 => &mut self.from_1h_to_4h,
            h if h < 24.0 => &mut self.from_4h_to_1d,
            h if h < 72.0 => &mut self.from_1d_to_3d,
            h if h < 168.0 => &mut self.from_3d_to_7d,
            _ => &mut self.over_7d,
        };
        *bucket += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StalePullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    /// Days since the last update, one decimal
    pub age_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRow {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: Option<Timestamp>,
    pub state: String,
    pub time_to_first_review_hours: Option<f64>,
    pub time_to_merge_hours: Option<f64>,
    pub first_reviewer: Option<String>,
}

/// Hours are rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleMetrics {
    pub median_time_to_merge: Option<f64>,
    pub avg_time_to_merge: Option<f64>,
    pub median_time_to_first_review: Option<f64>,
    pub avg_time_to_first_review: Option<f64>,
    pub stale_prs: Vec<StalePullRequest>,
    pub stale_count: usize,
    pub distribution: MergeTimeDistribution,
    /// One row per pull request, in payload order
    pub pr_table: Vec<PullRequestRow>,
}

fn author(pull: &PullRequestLifecycle) -> String {
    pull.author.clone().unwrap_or_else(|| "unknown".to_string())
}

/// Compute lifecycle metrics for `pulls` as of `now`.
///
/// Pull requests without a creation time still get a table row but feed
/// no timing.
pub fn lifecycle_metrics(pulls: &[PullRequestLifecycle], now: Timestamp) -> LifecycleMetrics {
    let mut merge_hours = Vec::new();
    let mut review_hours = Vec::new();
    let mut metrics = LifecycleMetrics::default();

    for pull in pulls {
        let mut time_to_merge = None;
        let mut time_to_first_review = None;

        if let Some(created_at) = pull.created_at {
            if let Some(merged_at) = pull.merged_at {
                let hours = hours_between(created_at, merged_at);
                metrics.distribution.record(hours);
                merge_hours.push(hours);
                time_to_merge = Some(hours);
            }
            if let Some(first_review_at) = pull.first_review_at {
                let hours = hours_between(created_at, first_review_at);
                review_hours.push(hours);
                time_to_first_review = Some(hours);
            }
            let idle_days = pull
                .updated_at
                .filter(|_| pull.state == "open")
                .map(|updated_at| hours_between(updated_at, now) / 24.0);
            if let Some(age_days) = idle_days.filter(|days| *days > STALE_PULL_REQUEST_DAYS as f64) {
                metrics.stale_prs.push(StalePullRequest {
                    number: pull.number,
                    title: pull.title.clone(),
                    author: author(pull),
                    age_days: round_to(age_days, 1),
                });
            }
        }

        metrics.pr_table.push(PullRequestRow {
            number: pull.number,
            title: pull.title.clone(),
            author: author(pull),
            created_at: pull.created_at,
            state: pull.state.clone(),
            time_to_first_review_hours: time_to_first_review.map(|h| round_to(h, 2)),
            time_to_merge_hours: time_to_merge.map(|h| round_to(h, 2)),
            first_reviewer: pull.first_reviewer.clone(),
        });
    }

    let two_places = |h: f64| round_to(h, 2);
    metrics.median_time_to_merge = median(&merge_hours).map(two_places);
    metrics.avg_time_to_merge = mean(&merge_hours).map(two_places);
    metrics.median_time_to_first_review = median(&review_hours).map(two_places);
    metrics.avg_time_to_first_review = mean(&review_hours).map(two_places);
    metrics.stale_count = metrics.stale_prs.len();
    metrics
}
