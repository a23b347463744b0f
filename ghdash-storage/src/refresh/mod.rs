//! Background refresh machinery: single-flight tickets, refresh jobs and the
//! bounded pool that runs them.

pub mod coordinator;
pub mod job;
pub mod pool;

pub use coordinator::{RefreshCoordinator, RefreshTicket};
pub use job::{RefreshJob, RefreshResult};
pub use pool::{
    RefreshPool, RefreshPoolConfig, RefreshPoolMetrics, RefreshPoolSnapshot, SubmitError,
    DEFAULT_REFRESH_QUEUE_CAPACITY, DEFAULT_REFRESH_TIMEOUT_SECS, DEFAULT_REFRESH_WORKERS,
};
