//! ghdash GitHub - Upstream Adapter and Domain Fetchers
//!
//! Everything that talks to GitHub: the [`Transport`] implementations (the
//! `gh` CLI or plain HTTPS), the retry-on-pending adapter for statistics
//! endpoints, and one [`DomainFetcher`](ghdash_core::DomainFetcher) per
//! cache domain.
//!
//! # Example
//!
//! ```ignore
//! let transport = Arc::new(GhCliTransport::new());
//! let client = GithubClient::new(transport).with_retry(RetryPolicy::new(3, Duration::from_secs(2)));
//! let fetchers = GithubFetchers::new(client, FetchSettings::default()).all();
//! ```

pub mod client;
pub mod fetchers;
pub mod retry;
pub mod testing;
pub mod transport;

pub use client::GithubClient;
pub use fetchers::{
    CodeActivityFetcher, ContributorSeriesFetcher, DevStatsFetcher, FetchSettings,
    GithubFetchers, LifecycleFetcher, WorkflowFetcher, DEFAULT_REVIEW_SAMPLE_LIMIT,
    DEFAULT_WORKFLOW_MAX_RUNS,
};
pub use retry::{fetch_with_retry, parse_body, RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{
    CallResult, Endpoint, GhCliTransport, HttpTransport, ObservedTransport, RawResponse,
    ResponseStatus, Transport, UpstreamObserver,
};

// Shared with the storage crate through ghdash-core.
pub use ghdash_core::{FetchError, TransportError};
