//! ghdash Core - Shared Types
//!
//! Data types shared by the cache, the upstream adapters and the API layer:
//! cache domains, resource keys, cache entries, domain payloads, the fetcher
//! contract and the error taxonomy. No I/O lives here.

use chrono::{DateTime, Utc};

pub mod clock;
pub mod domain;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod key;
pub mod payload;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::CacheDomain;
pub use entry::CacheEntry;
pub use error::{
    ConfigError, FetchError, GhdashError, GhdashResult, KeyError, StorageError, TransportError,
};
pub use fetch::{DomainFetcher, FetchOutcome};
pub use key::ResourceKey;
pub use payload::{
    empty_payload, CodeActivityPayload, CodeChangeWeek, CommitWeek, ContributorSeries,
    ContributorSeriesPayload, DevStatsPayload, DeveloperStats, LifecyclePayload,
    PullRequestLifecycle, Review, WeekPoint, Workflow, WorkflowPayload, WorkflowRun,
};
