//! Constants for the ghdash API
//!
//! Defaults for every configuration key, plus request-level limits.

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const DEFAULT_PORT: u16 = 5050;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "GHDASH_CONFIG";

// ============================================================================
// CACHE
// ============================================================================

pub const DEFAULT_CACHE_PATH: &str = "./data/cache";

pub const DEFAULT_CACHE_MAX_SIZE_MB: usize = 512;

pub const DEFAULT_WORKFLOW_TTL_MINUTES: u64 = 60;
pub const DEFAULT_DEV_STATS_TTL_MINUTES: u64 = 240;
pub const DEFAULT_CONTRIBUTOR_SERIES_TTL_MINUTES: u64 = 1440;
pub const DEFAULT_CODE_ACTIVITY_TTL_MINUTES: u64 = 1440;
pub const DEFAULT_LIFECYCLE_TTL_MINUTES: u64 = 120;

// ============================================================================
// UPSTREAM
// ============================================================================

/// Per-call timeout for upstream requests, in seconds.
pub const DEFAULT_UPSTREAM_CALL_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// ROUTES
// ============================================================================

/// Weeks of code activity served when the request does not say.
pub const DEFAULT_CODE_ACTIVITY_WEEKS: u32 = 52;

pub const MIN_CODE_ACTIVITY_WEEKS: u32 = 1;
pub const MAX_CODE_ACTIVITY_WEEKS: u32 = 52;

/// Longest-waiting unreviewed pull requests listed by review responsiveness.
pub const MAX_REVIEW_BOTTLENECKS: usize = 10;

/// Open pull requests idle longer than this are reported as stale.
pub const STALE_PULL_REQUEST_DAYS: u64 = 14;
