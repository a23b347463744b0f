//! Domain fetcher contract
//!
//! Fetchers are pure data producers: they know how to assemble one domain's
//! payload from upstream calls and nothing about caching.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::{CacheDomain, ResourceKey};

/// Result of a successful fetch.
///
/// `NoData` is the sentinel for "every upstream sub-call came back empty".
/// It is distinct from a `Data` payload that is empty by upstream truth
/// (e.g. a repository with zero workflow runs).
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Data(Value),
    NoData,
}

impl FetchOutcome {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::NoData => None,
        }
    }
}

/// Produces the payload of one cache domain for a resource key.
#[async_trait]
pub trait DomainFetcher: Send + Sync {
    /// The domain this fetcher produces payloads for.
    fn domain(&self) -> CacheDomain;

    /// Fetch a fresh payload.
    ///
    /// Sub-calls that come back empty are replaced with safe defaults;
    /// `FetchOutcome::NoData` is returned only when all of them were empty.
    /// Errors are reserved for a broken transport or undecodable data.
    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError>;
}
