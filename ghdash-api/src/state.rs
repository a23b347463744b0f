//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use ghdash_core::{Clock, SystemClock};
use ghdash_storage::SwrPolicy;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Cache policy every data route goes through.
    pub swr: Arc<SwrPolicy>,
    /// Wall clock for derived metrics such as review wait times.
    pub clock: Arc<dyn Clock>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(swr: Arc<SwrPolicy>) -> Self {
        Self {
            swr,
            clock: Arc::new(SystemClock),
            start_time: Instant::now(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl FromRef<AppState> for Arc<SwrPolicy> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.swr)
    }
}
