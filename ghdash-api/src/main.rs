//! ghdash Server Entry Point
//!
//! Loads configuration, opens the cache, starts the refresh pool and the
//! optional startup warmer, then serves the Axum router until Ctrl-C.
//!
//! `--ephemeral` swaps the LMDB store for an in-memory one.

use std::sync::Arc;
use std::time::Duration;

use ghdash_api::constants::DEFAULT_UPSTREAM_CALL_TIMEOUT_SECS;
use ghdash_api::telemetry::{init_tracer, MetricsObserver, TelemetryConfig};
use ghdash_api::{create_router, run_warmup, ApiError, ApiResult, AppState, GhdashConfig, TransportKind};
use ghdash_core::StorageError;
use ghdash_github::{
    GhCliTransport, GithubClient, GithubFetchers, HttpTransport, ObservedTransport, Transport,
};
use ghdash_storage::{
    CacheStore, LmdbCacheStore, MemoryCacheStore, RefreshCoordinator, RefreshPool, SwrPolicy,
};
use tokio::sync::watch;

const EPHEMERAL_FLAG: &str = "--ephemeral";

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let config = GhdashConfig::load()?;
    tracing::info!(?config, "Configuration loaded");

    let store = open_store(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let observer = Arc::new(MetricsObserver);
    let (pool, dispatcher) = RefreshPool::start(config.refresh_pool(), observer.clone(), shutdown_rx);

    let transport = build_transport(&config)?;
    let transport: Arc<dyn Transport> = Arc::new(ObservedTransport::new(transport, observer.clone()));
    let client = GithubClient::new(transport).with_retry(config.retry_policy());

    let mut swr = SwrPolicy::new(store, RefreshCoordinator::new(), pool)
        .with_staleness(config.staleness())
        .with_observer(observer);
    for fetcher in GithubFetchers::new(client, config.fetch_settings()).all() {
        swr = swr.with_fetcher(fetcher);
    }
    let swr = Arc::new(swr);

    if config.warm_on_startup {
        let swr = Arc::clone(&swr);
        tokio::spawn(async move {
            run_warmup(&swr).await;
        });
    } else {
        tracing::info!("Startup warmup disabled");
    }

    let app = create_router(AppState::new(Arc::clone(&swr)), &config);

    let addr = config.bind_addr()?;
    tracing::info!(
        %addr,
        service = %telemetry_config.service_name,
        version = %telemetry_config.service_version,
        "Starting ghdash server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Queued refreshes are dropped; running ones finish before exit.
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "Refresh dispatcher exited abnormally");
    }
    tracing::info!("ghdash server stopped");
    Ok(())
}

fn open_store(config: &GhdashConfig) -> ApiResult<Arc<dyn CacheStore>> {
    if std::env::args().skip(1).any(|arg| arg == EPHEMERAL_FLAG) {
        tracing::warn!("Ephemeral mode: cache lives in memory only");
        return Ok(Arc::new(MemoryCacheStore::new()));
    }

    let store = LmdbCacheStore::open(&config.cache_path, config.cache_max_size_mb)
        .map_err(StorageError::from)?;
    tracing::info!(
        path = %config.cache_path.display(),
        max_size_mb = config.cache_max_size_mb,
        "Cache store opened"
    );
    Ok(Arc::new(store))
}

fn build_transport(config: &GhdashConfig) -> ApiResult<Arc<dyn Transport>> {
    let call_timeout = Duration::from_secs(DEFAULT_UPSTREAM_CALL_TIMEOUT_SECS);
    match config.transport {
        TransportKind::Gh => {
            tracing::info!("Using gh CLI transport");
            Ok(Arc::new(GhCliTransport::new().with_timeout(call_timeout)))
        }
        TransportKind::Http => {
            if config.github_token.is_none() {
                tracing::warn!("GITHUB_TOKEN not set, HTTP transport is unauthenticated");
            }
            let transport = HttpTransport::new(config.github_token.clone(), call_timeout)
                .map_err(|e| ApiError::upstream_unavailable(format!("HTTP transport: {}", e)))?;
            tracing::info!("Using HTTP transport");
            Ok(Arc::new(transport))
        }
    }
}
