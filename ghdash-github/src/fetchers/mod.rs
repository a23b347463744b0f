//! Per-domain fetchers
//!
//! Each fetcher assembles one cache domain's payload from one or more
//! upstream calls. Sub-calls that come back empty are replaced by empty
//! defaults; a fetcher reports [`FetchOutcome::NoData`] only when every
//! sub-call came back empty.
//!
//! [`FetchOutcome::NoData`]: ghdash_core::FetchOutcome::NoData

pub mod code_activity;
pub mod contributor_series;
pub mod dev_stats;
pub mod lifecycle;
pub mod workflow;

use std::sync::Arc;

use chrono::DateTime;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use ghdash_core::{CacheDomain, DomainFetcher, FetchError, ResourceKey, Timestamp, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::GithubClient;
use crate::transport::Endpoint;

pub use code_activity::CodeActivityFetcher;
pub use contributor_series::ContributorSeriesFetcher;
pub use dev_stats::DevStatsFetcher;
pub use lifecycle::LifecycleFetcher;
pub use workflow::WorkflowFetcher;

/// Default cap on workflow runs per repository.
pub const DEFAULT_WORKFLOW_MAX_RUNS: usize = 1000;

/// Default number of pull requests sampled for lifecycle metrics.
pub const DEFAULT_REVIEW_SAMPLE_LIMIT: usize = 250;

/// Concurrent review lookups per fetch.
pub const REVIEW_CONCURRENCY: usize = 10;

const PULLS_PER_PAGE: usize = 100;

/// Tunables shared by the fetchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub workflow_max_runs: usize,
    pub review_sample_limit: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            workflow_max_runs: DEFAULT_WORKFLOW_MAX_RUNS,
            review_sample_limit: DEFAULT_REVIEW_SAMPLE_LIMIT,
        }
    }
}

/// Builds the full set of domain fetchers over one client.
#[derive(Debug, Clone)]
pub struct GithubFetchers {
    client: GithubClient,
    settings: FetchSettings,
}

impl GithubFetchers {
    pub fn new(client: GithubClient, settings: FetchSettings) -> Self {
        Self { client, settings }
    }

    /// One fetcher per [`CacheDomain`].
    pub fn all(&self) -> Vec<Arc<dyn DomainFetcher>> {
        vec![
            Arc::new(WorkflowFetcher::new(
                self.client.clone(),
                self.settings.workflow_max_runs,
            )),
            Arc::new(DevStatsFetcher::new(self.client.clone())),
            Arc::new(ContributorSeriesFetcher::new(self.client.clone())),
            Arc::new(CodeActivityFetcher::new(self.client.clone())),
            Arc::new(LifecycleFetcher::new(
                self.client.clone(),
                self.settings.review_sample_limit,
            )),
        ]
    }
}

// ============================================================================
// SHARED UPSTREAM SHAPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawUser {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPull {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub closed_at: Option<Timestamp>,
    #[serde(default)]
    pub merged_at: Option<Timestamp>,
}

impl RawPull {
    /// `merged`, `closed` or `open`. The REST API reports merged pull
    /// requests as closed with a merge timestamp.
    pub fn lifecycle_state(&self) -> &'static str {
        if self.merged_at.is_some() {
            "merged"
        } else if self.state.eq_ignore_ascii_case("closed") {
            "closed"
        } else {
            "open"
        }
    }

    pub fn author(&self) -> Option<&RawUser> {
        self.user.as_ref().filter(|u| u.login.is_some())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawReview {
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub submitted_at: Option<Timestamp>,
    #[serde(default)]
    pub state: String,
}

/// `stats/contributors` entry.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawContributor {
    #[serde(default)]
    pub author: Option<RawUser>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub weeks: Vec<RawContributorWeek>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawContributorWeek {
    pub w: i64,
    pub a: u64,
    pub d: u64,
    pub c: u64,
}

// ============================================================================
// SHARED CALLS
// ============================================================================

/// Up to `limit` pull requests in any state, newest first.
///
/// `None` when the first page could not be fetched at all.
pub(crate) async fn list_pulls(
    client: &GithubClient,
    key: &ResourceKey,
    limit: usize,
) -> Result<Option<Vec<RawPull>>, TransportError> {
    let per_page = limit.clamp(1, PULLS_PER_PAGE);
    let pages = limit.div_ceil(per_page).max(1);
    let mut pulls = Vec::new();

    for page in 1..=pages {
        let endpoint = Endpoint::repo(
            key,
            &format!("pulls?state=all&per_page={}&page={}", per_page, page),
        );
        let Some(batch) = client.get_as::<Vec<RawPull>>(&endpoint).await? else {
            if page == 1 {
                return Ok(None);
            }
            break;
        };
        let short = batch.len() < per_page;
        pulls.extend(batch);
        if short {
            break;
        }
    }

    pulls.truncate(limit);
    Ok(Some(pulls))
}

/// Reviews of each pull request, in input order, `concurrency` at a time.
///
/// A pull request whose reviews cannot be fetched gets an empty list.
pub(crate) async fn reviews_for(
    client: &GithubClient,
    key: &ResourceKey,
    numbers: impl IntoIterator<Item = u64>,
    concurrency: usize,
) -> Result<Vec<Vec<RawReview>>, TransportError> {
    stream::iter(numbers)
        .map(|number| async move {
            let endpoint = Endpoint::repo(key, &format!("pulls/{}/reviews?per_page=100", number));
            Ok::<_, TransportError>(
                client
                    .get_as::<Vec<RawReview>>(&endpoint)
                    .await?
                    .unwrap_or_default(),
            )
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Unix seconds to `YYYY-MM-DD` (UTC).
pub(crate) fn week_label(unix_seconds: i64) -> String {
    DateTime::from_timestamp(unix_seconds, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub(crate) fn to_payload<T: Serialize>(domain: CacheDomain, payload: &T) -> Result<Value, FetchError> {
    serde_json::to_value(payload).map_err(|e| FetchError::Decode {
        domain,
        reason: e.to_string(),
    })
}
