//! Repository data routes.
//!
//! Every route serves one cache domain through [`SwrPolicy::serve`] and
//! wraps the payload in the cache metadata envelope:
//!
//! ```json
//! { "data": ..., "cached": true, "stale": true, "refreshing": true,
//!   "lastUpdated": "2024-03-01T12:00:00Z" }
//! ```
//!
//! `?refresh=true` forces a synchronous fetch. Workflow runs, code activity,
//! lifecycle metrics and review responsiveness serve a derived view of the
//! cached payload; the other routes serve it as stored.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use ghdash_core::{
    CacheDomain, CodeActivityPayload, LifecyclePayload, ResourceKey, WorkflowPayload,
};
use ghdash_storage::{CacheMeta, Served, SwrPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    DEFAULT_CODE_ACTIVITY_WEEKS, MAX_CODE_ACTIVITY_WEEKS, MIN_CODE_ACTIVITY_WEEKS,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::{
    self, CodeActivityView, LifecycleMetrics, ReviewResponsiveness, WorkflowFilter, WorkflowView,
};

// ============================================================================
// TYPES
// ============================================================================

/// Payload plus the metadata describing which cache branch produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwrResponse<T> {
    pub data: T,
    #[serde(flatten)]
    pub meta: CacheMeta,
}

impl<T> SwrResponse<T> {
    fn new(data: T, meta: CacheMeta) -> Self {
        Self { data, meta }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub refresh: Option<String>,
}

impl RefreshQuery {
    fn force(&self) -> bool {
        is_truthy(self.refresh.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowRunsQuery {
    pub refresh: Option<String>,
    pub workflow_id: Option<String>,
    pub branch: Option<String>,
    pub event: Option<String>,
    pub conclusion: Option<String>,
    pub status: Option<String>,
}

impl WorkflowRunsQuery {
    fn into_parts(self) -> (bool, WorkflowFilter) {
        let force = is_truthy(self.refresh.as_deref());
        let filter = WorkflowFilter {
            workflow_id: self.workflow_id,
            branch: self.branch,
            event: self.event,
            conclusion: self.conclusion,
            status: self.status,
        };
        (force, filter)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CodeActivityQuery {
    pub refresh: Option<String>,
    pub weeks: Option<String>,
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

/// Parse `weeks`, clamping to the supported window.
fn parse_weeks(raw: Option<&str>) -> ApiResult<usize> {
    let weeks = match raw.map(str::trim).filter(|w| !w.is_empty()) {
        None => i64::from(DEFAULT_CODE_ACTIVITY_WEEKS),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| {
                ApiError::invalid_input("weeks must be an integer")
                    .with_details(serde_json::json!({ "field": "weeks", "value": raw }))
            })?,
    };
    let clamped = weeks.clamp(
        i64::from(MIN_CODE_ACTIVITY_WEEKS),
        i64::from(MAX_CODE_ACTIVITY_WEEKS),
    );
    Ok(clamped as usize)
}

// ============================================================================
// HELPERS
// ============================================================================

async fn serve(
    swr: &SwrPolicy,
    domain: CacheDomain,
    owner: &str,
    repo: &str,
    force: bool,
) -> ApiResult<Served> {
    let key = ResourceKey::new(owner, repo)?;
    let served = swr.serve(domain, &key, force).await?;
    tracing::info!(
        %domain,
        %key,
        force,
        cached = served.meta.cached,
        stale = served.meta.stale,
        refreshing = served.meta.refreshing,
        "Served"
    );
    Ok(served)
}

async fn serve_raw(
    state: &AppState,
    domain: CacheDomain,
    (owner, repo): (String, String),
    force: bool,
) -> ApiResult<Json<SwrResponse<Value>>> {
    let served = serve(&state.swr, domain, &owner, &repo, force).await?;
    Ok(Json(SwrResponse::new(served.payload, served.meta)))
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/repos/:owner/:repo/workflow-runs
///
/// Accepts `workflow_id`, `branch`, `event`, `conclusion` and `status`
/// filters. The cache always holds the unfiltered runs.
pub async fn workflow_runs(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<WorkflowRunsQuery>,
) -> ApiResult<Json<SwrResponse<WorkflowView>>> {
    let (force, filter) = query.into_parts();
    let served = serve(&state.swr, CacheDomain::Workflow, &owner, &repo, force).await?;
    let payload: WorkflowPayload = serde_json::from_value(served.payload)?;

    Ok(Json(SwrResponse::new(views::filter_runs(payload, &filter), served.meta)))
}

/// GET /api/repos/:owner/:repo/stats
pub async fn dev_stats(
    State(state): State<AppState>,
    Path(path): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<SwrResponse<Value>>> {
    serve_raw(&state, CacheDomain::DevStats, path, query.force()).await
}

/// GET /api/repos/:owner/:repo/contributor-timeseries
pub async fn contributor_timeseries(
    State(state): State<AppState>,
    Path(path): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<SwrResponse<Value>>> {
    serve_raw(&state, CacheDomain::ContributorSeries, path, query.force()).await
}

/// GET /api/repos/:owner/:repo/lifecycle-metrics
pub async fn lifecycle_metrics(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<SwrResponse<LifecycleMetrics>>> {
    let served = serve(&state.swr, CacheDomain::Lifecycle, &owner, &repo, query.force()).await?;
    let pulls: LifecyclePayload = serde_json::from_value(served.payload)?;
    let metrics = views::lifecycle_metrics(&pulls, state.clock.now());

    Ok(Json(SwrResponse::new(metrics, served.meta)))
}

/// GET /api/repos/:owner/:repo/code-activity
///
/// The cache holds the full series; only the last `weeks` are returned,
/// with a summary of that window.
pub async fn code_activity(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<CodeActivityQuery>,
) -> ApiResult<Json<SwrResponse<CodeActivityView>>> {
    let weeks = parse_weeks(query.weeks.as_deref())?;
    let force = is_truthy(query.refresh.as_deref());

    let served = serve(&state.swr, CacheDomain::CodeActivity, &owner, &repo, force).await?;
    let payload: CodeActivityPayload = serde_json::from_value(served.payload)?;

    Ok(Json(SwrResponse::new(
        CodeActivityView::last_weeks(payload, weeks),
        served.meta,
    )))
}

/// GET /api/repos/:owner/:repo/review-responsiveness
///
/// Computed from the lifecycle entry; shares its cache and refreshes.
pub async fn review_responsiveness(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<SwrResponse<ReviewResponsiveness>>> {
    let served = serve(&state.swr, CacheDomain::Lifecycle, &owner, &repo, query.force()).await?;
    let pulls: LifecyclePayload = serde_json::from_value(served.payload)?;
    let report = views::review_responsiveness(&pulls, state.clock.now());

    Ok(Json(SwrResponse::new(report, served.meta)))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:owner/:repo/workflow-runs", get(workflow_runs))
        .route("/:owner/:repo/stats", get(dev_stats))
        .route("/:owner/:repo/contributor-timeseries", get(contributor_timeseries))
        .route("/:owner/:repo/code-activity", get(code_activity))
        .route("/:owner/:repo/lifecycle-metrics", get(lifecycle_metrics))
        .route("/:owner/:repo/review-responsiveness", get(review_responsiveness))
}
