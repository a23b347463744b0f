//! ghdash API - HTTP Surface for the Cache Orchestrator
//!
//! Serves cached GitHub repository data to the dashboard. Every data route
//! goes through the stale-while-revalidate policy in `ghdash-storage`, and
//! every response carries the cache metadata describing how it was produced.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod views;

// Re-export commonly used types
pub use config::{GhdashConfig, TransportKind};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{run_warmup, WarmupReport};
pub use routes::create_router;
pub use state::AppState;
