//! Prometheus Metrics Definitions
//!
//! Defines all ghdash metrics with their labels and exposes them at
//! `/metrics` for Prometheus scraping. [`MetricsObserver`] bridges the
//! storage and upstream crates' observer hooks onto these metrics.

use axum::{http::StatusCode, response::IntoResponse};
use ghdash_core::CacheDomain;
use ghdash_github::{CallResult, Endpoint, UpstreamObserver};
use ghdash_storage::{RefreshObserver, RefreshResult, ServeOutcome};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds). Synchronous fetches of large
/// repositories take tens of seconds, hence the long tail.
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<GhdashMetrics>> = Lazy::new(GhdashMetrics::new);

/// Container for all ghdash metrics.
#[derive(Clone)]
pub struct GhdashMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Served requests by policy branch - labels: domain, outcome
    pub cache_requests_total: CounterVec,

    /// Finished background refreshes - labels: domain, result
    pub refresh_total: CounterVec,

    /// Background refreshes currently running
    pub refresh_in_flight: Gauge,

    /// Upstream calls - labels: result
    pub upstream_calls_total: CounterVec,
}

fn register_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl GhdashMetrics {
    /// Create and register all metrics with the default Prometheus registry.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "ghdash_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| register_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "ghdash_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_error("http_request_duration_seconds", e))?,

            cache_requests_total: register_counter_vec!(
                "ghdash_cache_requests_total",
                "Requests served by the cache policy, by branch taken",
                &["domain", "outcome"]
            )
            .map_err(|e| register_error("cache_requests_total", e))?,

            refresh_total: register_counter_vec!(
                "ghdash_refresh_total",
                "Background refreshes, by how they ended",
                &["domain", "result"]
            )
            .map_err(|e| register_error("refresh_total", e))?,

            refresh_in_flight: register_gauge!(
                "ghdash_refresh_in_flight",
                "Background refreshes currently running"
            )
            .map_err(|e| register_error("refresh_in_flight", e))?,

            upstream_calls_total: register_counter_vec!(
                "ghdash_upstream_calls_total",
                "Calls made to the upstream source, by result",
                &["result"]
            )
            .map_err(|e| register_error("upstream_calls_total", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_cache_request(&self, domain: CacheDomain, outcome: ServeOutcome) {
        self.cache_requests_total
            .with_label_values(&[domain.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn record_refresh(&self, domain: CacheDomain, result: &str) {
        self.refresh_total
            .with_label_values(&[domain.as_str(), result])
            .inc();
    }

    pub fn record_upstream_call(&self, result: CallResult) {
        self.upstream_calls_total
            .with_label_values(&[result.as_str()])
            .inc();
    }
}

// ============================================================================
// OBSERVER BRIDGE
// ============================================================================

/// Feeds storage and upstream events into [`METRICS`]. Does nothing if the
/// metrics failed to register.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    fn with_metrics(f: impl FnOnce(&GhdashMetrics)) {
        if let Ok(metrics) = METRICS.as_ref() {
            f(metrics);
        }
    }
}

impl RefreshObserver for MetricsObserver {
    fn request_served(&self, domain: CacheDomain, outcome: ServeOutcome) {
        Self::with_metrics(|m| m.record_cache_request(domain, outcome));
    }

    fn refresh_rejected(&self, domain: CacheDomain) {
        Self::with_metrics(|m| m.record_refresh(domain, "rejected"));
    }

    fn refresh_started(&self, _domain: CacheDomain) {
        Self::with_metrics(|m| m.refresh_in_flight.inc());
    }

    fn refresh_finished(&self, domain: CacheDomain, result: &RefreshResult) {
        Self::with_metrics(|m| {
            m.refresh_in_flight.dec();
            m.record_refresh(domain, result.as_str());
        });
    }
}

impl UpstreamObserver for MetricsObserver {
    fn call_finished(&self, _endpoint: &Endpoint, result: CallResult) {
        Self::with_metrics(|m| m.record_upstream_call(result));
    }
}

/// Handler for GET /metrics. Returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Result<&'static GhdashMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_observer_counts_cache_requests() -> Result<(), String> {
        let m = metrics()?;
        let counter = m
            .cache_requests_total
            .with_label_values(&["code_activity", "stale"]);
        let before = counter.get();

        MetricsObserver.request_served(CacheDomain::CodeActivity, ServeOutcome::Stale);
        assert!(counter.get() >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_observer_counts_refresh_results() -> Result<(), String> {
        let m = metrics()?;
        let counter = m.refresh_total.with_label_values(&["lifecycle", "no_data"]);
        let before = counter.get();

        MetricsObserver.refresh_started(CacheDomain::Lifecycle);
        MetricsObserver.refresh_finished(CacheDomain::Lifecycle, &RefreshResult::NoData);
        assert!(counter.get() >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_observer_counts_upstream_calls() -> Result<(), String> {
        let m = metrics()?;
        let counter = m.upstream_calls_total.with_label_values(&["pending"]);
        let before = counter.get();

        MetricsObserver.call_finished(&Endpoint::new("repos/a/b/stats/contributors"), CallResult::Pending);
        assert!(counter.get() >= before + 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_handler_exposes_names() -> Result<(), String> {
        metrics()?.record_http_request("GET", "/health/ping", 200, 0.001);

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("ghdash_http_requests_total"));
        Ok(())
    }
}
