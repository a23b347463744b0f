//! Axum middleware recording per-request metrics.
//!
//! Requests are labelled by their route template (`/api/repos/:owner/:repo/stats`)
//! rather than the concrete path, so each repository does not become its
//! own Prometheus series.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};

use super::metrics::METRICS;

/// Label for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());
    let path = request.uri().path().to_string();

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %route,
        http.target = %path,
    );

    let response = next.run(request).instrument(span).await;

    let status = response.status().as_u16();
    let elapsed = start.elapsed().as_secs_f64();
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method.as_str(), &route, status, elapsed);
    }
    tracing::debug!(
        method = %method,
        route = %route,
        status,
        duration_ms = elapsed * 1000.0,
        "Request completed"
    );

    response
}
