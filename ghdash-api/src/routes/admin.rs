//! Administrative routes.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use ghdash_storage::SwrPolicy;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    /// Domains that were cleared, by name
    pub cleared: Vec<String>,
    /// Entries removed across all domains
    pub entries_removed: u64,
}

/// POST /api/clear-cache - drop every cached entry in every domain.
///
/// Refreshes already running are not cancelled and may write again.
pub async fn clear_cache(State(swr): State<Arc<SwrPolicy>>) -> ApiResult<Json<ClearCacheResponse>> {
    let cleared = swr.clear_all().await?;
    let entries_removed = cleared.iter().map(|(_, n)| n).sum();
    tracing::info!(entries_removed, "Cache cleared");

    Ok(Json(ClearCacheResponse {
        cleared: cleared
            .into_iter()
            .map(|(domain, _)| domain.as_str().to_string())
            .collect(),
        entries_removed,
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/clear-cache", post(clear_cache))
}
