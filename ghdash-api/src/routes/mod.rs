//! REST API Routes Module
//!
//! - /api/repos/:owner/:repo/* - cached GitHub data, one route per domain
//! - /api/clear-cache - drop every cached entry
//! - /health/* - liveness and readiness
//! - /metrics - Prometheus exposition
//!
//! CORS is open in development (no configured origins) and restricted to
//! the configured list otherwise.

pub mod admin;
pub mod health;
pub mod repos;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::GhdashConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use admin::create_router as admin_router;
pub use health::create_router as health_router;
pub use repos::create_router as repos_router;

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from the server config.
///
/// The dashboard only reads data and triggers cache clears, so GET and POST
/// are the only methods allowed.
fn build_cors_layer(config: &GhdashConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(origins)
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("No route for this path")
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. HTTP tracing
/// 3. Observability - per-route metrics and request span
pub fn create_router(state: AppState, config: &GhdashConfig) -> Router {
    let api_routes = Router::new()
        .nest("/repos", repos::create_router())
        .merge(admin::create_router());

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let config = GhdashConfig {
            cors_origins: vec!["https://dash.example.com".to_string(), "not a header\n".to_string()],
            ..GhdashConfig::default()
        };
        // Invalid origins are skipped rather than failing startup.
        let _layer = build_cors_layer(&config);
    }

    #[tokio::test]
    async fn test_fallback_is_json_not_found() {
        use axum::response::IntoResponse;

        let response = not_found().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
