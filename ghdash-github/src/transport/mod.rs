//! Upstream transports
//!
//! A [`Transport`] performs exactly one call against one GitHub REST path and
//! reports what came back, without interpreting it. Retrying, decoding and
//! "pending" handling live above this layer.

pub mod gh_cli;
pub mod http;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ghdash_core::{ResourceKey, TransportError};

pub use gh_cli::GhCliTransport;
pub use http::HttpTransport;

/// A GitHub REST path, relative to the API root (no leading slash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: String,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: path.trim_start_matches('/').to_string(),
        }
    }

    /// `repos/{owner}/{repo}/{suffix}`
    pub fn repo(key: &ResourceKey, suffix: &str) -> Self {
        Self::new(format!(
            "repos/{}/{}/{}",
            key.owner(),
            key.repo(),
            suffix.trim_start_matches('/')
        ))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// How an upstream status code is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// 202: upstream is still computing the result.
    Pending,
    /// Any other 2xx.
    Success,
    /// Everything else.
    Failure(u16),
}

/// A single upstream response, body unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn classify(&self) -> ResponseStatus {
        match self.status {
            202 => ResponseStatus::Pending,
            200..=299 => ResponseStatus::Success,
            other => ResponseStatus::Failure(other),
        }
    }
}

/// One-shot access to the GitHub REST API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call. A non-2xx status is a successful call returning a
    /// [`ResponseStatus::Failure`] response, not an error.
    async fn call(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError>;
}

// ============================================================================
// OBSERVATION
// ============================================================================

/// Classification of a single upstream call, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResult {
    Ok,
    Pending,
    Failed,
    Unavailable,
}

impl CallResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallResult::Ok => "ok",
            CallResult::Pending => "pending",
            CallResult::Failed => "failed",
            CallResult::Unavailable => "unavailable",
        }
    }

    fn of(result: &Result<RawResponse, TransportError>) -> Self {
        match result {
            Ok(response) => match response.classify() {
                ResponseStatus::Success => CallResult::Ok,
                ResponseStatus::Pending => CallResult::Pending,
                ResponseStatus::Failure(_) => CallResult::Failed,
            },
            Err(e) if e.is_fatal() => CallResult::Unavailable,
            Err(_) => CallResult::Failed,
        }
    }
}

/// Receives one event per upstream call.
pub trait UpstreamObserver: Send + Sync {
    fn call_finished(&self, endpoint: &Endpoint, result: CallResult);
}

/// Transport wrapper that reports every call to an [`UpstreamObserver`].
pub struct ObservedTransport {
    inner: Arc<dyn Transport>,
    observer: Arc<dyn UpstreamObserver>,
}

impl ObservedTransport {
    pub fn new(inner: Arc<dyn Transport>, observer: Arc<dyn UpstreamObserver>) -> Self {
        Self { inner, observer }
    }
}

#[async_trait]
impl Transport for ObservedTransport {
    async fn call(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError> {
        let result = self.inner.call(endpoint).await;
        self.observer.call_finished(endpoint, CallResult::of(&result));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use std::sync::Mutex;

    #[test]
    fn test_endpoint_for_repo() {
        let key: ResourceKey = "acme/widgets".parse().expect("key");
        let endpoint = Endpoint::repo(&key, "/stats/contributors");
        assert_eq!(endpoint.path(), "repos/acme/widgets/stats/contributors");
        assert_eq!(Endpoint::new("/rate_limit").to_string(), "rate_limit");
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(RawResponse::new(202, "").classify(), ResponseStatus::Pending);
        assert_eq!(RawResponse::new(200, "[]").classify(), ResponseStatus::Success);
        assert_eq!(RawResponse::new(204, "").classify(), ResponseStatus::Success);
        assert_eq!(
            RawResponse::new(404, "").classify(),
            ResponseStatus::Failure(404)
        );
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CallResult>>);

    impl UpstreamObserver for Recorder {
        fn call_finished(&self, _endpoint: &Endpoint, result: CallResult) {
            self.0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(result);
        }
    }

    #[tokio::test]
    async fn test_observed_transport_classifies_calls() {
        let scripted = Arc::new(ScriptedTransport::new());
        scripted.push_pending("a");
        scripted.push_json("a", serde_json::json!([1]));
        scripted.push_error(
            "b",
            TransportError::Unavailable {
                reason: "missing".to_string(),
            },
        );
        let recorder = Arc::new(Recorder::default());
        let observed = ObservedTransport::new(scripted, recorder.clone());

        let _ = observed.call(&Endpoint::new("a")).await;
        let _ = observed.call(&Endpoint::new("a")).await;
        let _ = observed.call(&Endpoint::new("b")).await;
        let _ = observed.call(&Endpoint::new("c")).await;

        let seen = recorder.0.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![
                CallResult::Pending,
                CallResult::Ok,
                CallResult::Unavailable,
                CallResult::Failed
            ]
        );
    }
}
