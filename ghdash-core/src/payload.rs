//! Domain payload types
//!
//! These are the shapes fetchers produce and the cache stores (as JSON).
//! Every payload has an empty-but-valid form, served when nothing was cached
//! and upstream had nothing to report.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CacheDomain, Timestamp};

// ============================================================================
// WORKFLOW RUNS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPayload {
    pub runs: Vec<WorkflowRun>,
    pub workflows: Vec<Workflow>,
    /// Total run count reported upstream, which may exceed `runs.len()`.
    pub all_time_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub workflow_id: u64,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub event: Option<String>,
    pub head_branch: Option<String>,
    pub run_number: u64,
    pub run_attempt: u32,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub run_started_at: Option<Timestamp>,
    pub html_url: Option<String>,
    pub actor_login: Option<String>,
    /// `updated_at - created_at` in seconds, never negative.
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub state: String,
}

// ============================================================================
// DEVELOPER STATS
// ============================================================================

pub type DevStatsPayload = Vec<DeveloperStats>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperStats {
    pub login: String,
    pub avatar_url: Option<String>,
    pub commits: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub prs_authored: u64,
    pub prs_merged: u64,
    pub prs_closed: u64,
    pub prs_open: u64,
    pub reviews_given: u64,
    pub approvals: u64,
    pub changes_requested: u64,
    pub comments: u64,
}

impl DeveloperStats {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// CONTRIBUTOR SERIES
// ============================================================================

pub type ContributorSeriesPayload = Vec<ContributorSeries>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorSeries {
    pub login: String,
    pub avatar_url: Option<String>,
    pub total: u64,
    pub weeks: Vec<WeekPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekPoint {
    /// Week start as `YYYY-MM-DD`.
    pub week: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

// ============================================================================
// CODE ACTIVITY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeActivityPayload {
    pub code_changes: Vec<CodeChangeWeek>,
    pub weekly_commits: Vec<CommitWeek>,
    /// Weekly commit counts by the repository owner, oldest first.
    pub owner_commits: Vec<u32>,
    /// Weekly commit counts by everyone else, oldest first.
    pub community_commits: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChangeWeek {
    pub week: String,
    pub additions: u64,
    /// Stored as an absolute value; upstream reports deletions as negative.
    pub deletions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitWeek {
    pub week: String,
    pub total: u32,
    /// Sunday first.
    pub days: [u32; 7],
}

impl CodeActivityPayload {
    /// Keep only the most recent `weeks` entries of every series.
    pub fn trim_to_weeks(&mut self, weeks: usize) {
        fn keep_last<T>(series: &mut Vec<T>, n: usize) {
            if series.len() > n {
                series.drain(..series.len() - n);
            }
        }
        keep_last(&mut self.code_changes, weeks);
        keep_last(&mut self.weekly_commits, weeks);
        keep_last(&mut self.owner_commits, weeks);
        keep_last(&mut self.community_commits, weeks);
    }
}

// ============================================================================
// PULL REQUEST LIFECYCLE
// ============================================================================

pub type LifecyclePayload = Vec<PullRequestLifecycle>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestLifecycle {
    pub number: u64,
    pub title: String,
    /// `open`, `closed` or `merged`.
    pub state: String,
    pub author: Option<String>,
    pub created_at: Option<Timestamp>,
    pub merged_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub all_reviews: Vec<Review>,
    pub first_review_at: Option<Timestamp>,
    pub first_reviewer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub login: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub state: String,
}

// ============================================================================
// EMPTY PAYLOADS
// ============================================================================

/// The empty-but-valid payload of a domain.
pub fn empty_payload(domain: CacheDomain) -> Value {
    match domain {
        CacheDomain::Workflow => serde_json::json!({
            "runs": [],
            "workflows": [],
            "all_time_total": 0,
        }),
        CacheDomain::CodeActivity => serde_json::json!({
            "code_changes": [],
            "weekly_commits": [],
            "owner_commits": [],
            "community_commits": [],
        }),
        CacheDomain::DevStats | CacheDomain::ContributorSeries | CacheDomain::Lifecycle => {
            Value::Array(Vec::new())
        }
    }
}
