//! Workflow runs fetcher.
//!
//! Runs are paged 100 at a time in three concurrent batches (pages 1-3,
//! 4-8, 9-10). The workflow list and the all-time total ride along with
//! the first batch. Paging stops at the first short page.

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::join;
use ghdash_core::{
    CacheDomain, DomainFetcher, FetchError, FetchOutcome, ResourceKey, Timestamp, TransportError,
    Workflow, WorkflowPayload, WorkflowRun,
};
use serde::Deserialize;

use super::{to_payload, RawUser};
use crate::client::GithubClient;
use crate::transport::Endpoint;

const RUNS_PER_PAGE: usize = 100;

/// Inclusive page ranges fetched together.
const PAGE_BATCHES: [(usize, usize); 3] = [(1, 3), (4, 8), (9, 10)];

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    workflow_runs: Vec<RawRun>,
}

#[derive(Debug, Deserialize)]
struct RawRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    workflow_id: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(default)]
    run_number: u64,
    #[serde(default)]
    run_attempt: Option<u32>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    updated_at: Option<Timestamp>,
    #[serde(default)]
    run_started_at: Option<Timestamp>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    actor: Option<RawUser>,
}

impl From<RawRun> for WorkflowRun {
    fn from(raw: RawRun) -> Self {
        let duration_seconds = match (raw.created_at, raw.updated_at) {
            (Some(created), Some(updated)) => (updated - created).num_seconds().max(0),
            _ => 0,
        };
        WorkflowRun {
            id: raw.id,
            name: raw.name,
            workflow_id: raw.workflow_id,
            status: raw.status,
            conclusion: raw.conclusion,
            event: raw.event,
            head_branch: raw.head_branch,
            run_number: raw.run_number,
            run_attempt: raw.run_attempt.unwrap_or(1),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            run_started_at: raw.run_started_at,
            html_url: raw.html_url,
            actor_login: raw.actor.and_then(|a| a.login),
            duration_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowList {
    #[serde(default)]
    workflows: Vec<Workflow>,
}

#[derive(Debug, Deserialize)]
struct RunCount {
    #[serde(default)]
    total_count: u64,
}

pub struct WorkflowFetcher {
    client: GithubClient,
    max_runs: usize,
}

impl WorkflowFetcher {
    pub fn new(client: GithubClient, max_runs: usize) -> Self {
        Self {
            client,
            max_runs: max_runs.max(1),
        }
    }

    fn max_pages(&self) -> usize {
        let last_page = PAGE_BATCHES[PAGE_BATCHES.len() - 1].1;
        self.max_runs.div_ceil(RUNS_PER_PAGE).clamp(1, last_page)
    }

    async fn page(
        &self,
        key: &ResourceKey,
        page: usize,
    ) -> Result<Option<Vec<WorkflowRun>>, TransportError> {
        let endpoint = Endpoint::repo(
            key,
            &format!("actions/runs?per_page={}&page={}", RUNS_PER_PAGE, page),
        );
        Ok(self
            .client
            .get_as::<RunsPage>(&endpoint)
            .await?
            .map(|page| page.workflow_runs.into_iter().map(WorkflowRun::from).collect()))
    }

    async fn pages(
        &self,
        key: &ResourceKey,
        first: usize,
        last: usize,
    ) -> Result<Vec<Option<Vec<WorkflowRun>>>, TransportError> {
        join_all((first..=last).map(|page| self.page(key, page)))
            .await
            .into_iter()
            .collect()
    }

    async fn workflows(&self, key: &ResourceKey) -> Result<Option<Vec<Workflow>>, TransportError> {
        let endpoint = Endpoint::repo(key, "actions/workflows");
        Ok(self
            .client
            .get_as::<WorkflowList>(&endpoint)
            .await?
            .map(|list| list.workflows))
    }

    async fn total_count(&self, key: &ResourceKey) -> Result<Option<u64>, TransportError> {
        let endpoint = Endpoint::repo(key, "actions/runs?per_page=1&page=1");
        Ok(self
            .client
            .get_as::<RunCount>(&endpoint)
            .await?
            .map(|count| count.total_count))
    }
}

/// Append a batch in page order. Returns whether the next batch is needed.
fn absorb(
    runs: &mut Vec<WorkflowRun>,
    answered: &mut bool,
    batch: Vec<Option<Vec<WorkflowRun>>>,
) -> bool {
    for page in batch {
        let page = match page {
            Some(page) => {
                *answered = true;
                page
            }
            None => Vec::new(),
        };
        let full = page.len() >= RUNS_PER_PAGE;
        runs.extend(page);
        if !full {
            return false;
        }
    }
    true
}

#[async_trait]
impl DomainFetcher for WorkflowFetcher {
    fn domain(&self) -> CacheDomain {
        CacheDomain::Workflow
    }

    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError> {
        let max_pages = self.max_pages();
        let (first, last) = PAGE_BATCHES[0];

        let (workflows, total, batch) = join!(
            self.workflows(key),
            self.total_count(key),
            self.pages(key, first, last.min(max_pages)),
        );
        let (workflows, total, batch) = (workflows?, total?, batch?);

        let mut answered = workflows.is_some() || total.is_some();
        let mut runs = Vec::new();
        let mut more = absorb(&mut runs, &mut answered, batch);

        for &(first, last) in &PAGE_BATCHES[1..] {
            if !more || first > max_pages {
                break;
            }
            let batch = self.pages(key, first, last.min(max_pages)).await?;
            more = absorb(&mut runs, &mut answered, batch);
        }

        if !answered {
            tracing::warn!(%key, "No workflow data from upstream");
            return Ok(FetchOutcome::NoData);
        }

        runs.truncate(self.max_runs);
        tracing::debug!(%key, runs = runs.len(), "Fetched workflow runs");
        let payload = WorkflowPayload {
            runs,
            workflows: workflows.unwrap_or_default(),
            all_time_total: total.unwrap_or_default(),
        };
        Ok(FetchOutcome::Data(to_payload(CacheDomain::Workflow, &payload)?))
    }
}
