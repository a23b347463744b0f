//! Shared upstream client used by every fetcher.

use std::sync::Arc;

use ghdash_core::TransportError;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::retry::{fetch_with_retry, RetryPolicy, Sleeper, TokioSleeper};
use crate::transport::{Endpoint, ResponseStatus, Transport};

/// Transport plus retry settings. Cheap to clone.
#[derive(Clone)]
pub struct GithubClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
}

impl GithubClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Statistics endpoint with the default retry policy.
    pub async fn stats(&self, endpoint: &Endpoint) -> Result<Option<Value>, TransportError> {
        self.stats_with(endpoint, self.retry).await
    }

    /// Statistics endpoint with an explicit retry policy.
    pub async fn stats_with(
        &self,
        endpoint: &Endpoint,
        policy: RetryPolicy,
    ) -> Result<Option<Value>, TransportError> {
        fetch_with_retry(self.transport.as_ref(), self.sleeper.as_ref(), endpoint, policy).await
    }

    /// Single attempt at a listing endpoint.
    ///
    /// Unlike [`stats`](Self::stats), an empty list is a real answer and is
    /// returned as `Some`. Pending, failed or unparseable answers are `None`.
    pub async fn get(&self, endpoint: &Endpoint) -> Result<Option<Value>, TransportError> {
        match self.transport.call(endpoint).await {
            Ok(response) => match response.classify() {
                ResponseStatus::Success => {
                    let body = response.body.trim();
                    if body.is_empty() {
                        return Ok(None);
                    }
                    Ok(serde_json::from_str(body).ok())
                }
                ResponseStatus::Pending => Ok(None),
                ResponseStatus::Failure(status) => {
                    tracing::warn!(%endpoint, status, "Upstream call failed");
                    Ok(None)
                }
            },
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(%endpoint, error = %e, "Upstream call failed");
                Ok(None)
            }
        }
    }

    /// [`get`](Self::get), decoded into `T`. A body that does not decode is
    /// treated like a failed call.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Option<T>, TransportError> {
        Ok(self.get(endpoint).await?.and_then(|value| decode(endpoint, value)))
    }

    /// [`stats`](Self::stats) or [`stats_with`](Self::stats_with), decoded into `T`.
    pub async fn stats_as<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        policy: Option<RetryPolicy>,
    ) -> Result<Option<T>, TransportError> {
        let policy = policy.unwrap_or(self.retry);
        Ok(self
            .stats_with(endpoint, policy)
            .await?
            .and_then(|value| decode(endpoint, value)))
    }
}

fn decode<T: DeserializeOwned>(endpoint: &Endpoint, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(%endpoint, error = %e, "Unexpected upstream response shape");
            None
        }
    }
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InstantSleeper, ScriptedTransport};
    use crate::transport::RawResponse;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_keeps_empty_list() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json("repos/acme/widgets/pulls/1/reviews", json!([]));
        let client = GithubClient::new(transport.clone()).with_sleeper(Arc::new(InstantSleeper::new()));

        let value = client
            .get(&Endpoint::new("repos/acme/widgets/pulls/1/reviews"))
            .await
            .expect("should succeed");
        assert_eq!(value, Some(json!([])));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_get_does_not_retry_failures() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("x", Ok(RawResponse::new(502, "bad gateway")));
        let client = GithubClient::new(transport.clone());

        assert_eq!(client.get(&Endpoint::new("x")).await, Ok(None));
        assert_eq!(transport.calls_to("x"), 1);
    }

    #[tokio::test]
    async fn test_get_as_treats_bad_shape_as_missing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json("x", json!({"unexpected": true}));
        let client = GithubClient::new(transport);

        let decoded: Option<Vec<u64>> = client
            .get_as(&Endpoint::new("x"))
            .await
            .expect("should succeed");
        assert_eq!(decoded, None);
    }
}
