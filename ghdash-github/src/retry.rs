//! Retry-on-pending adapter
//!
//! GitHub's statistics endpoints answer 202 while they compute, then 200
//! with the data. [`fetch_with_retry`] hides that: it retries pending,
//! failed and empty answers a bounded number of times and reports "nothing
//! yet" as `Ok(None)`. Only a transport that can never work is an error.

use std::time::Duration;

use async_trait::async_trait;
use ghdash_core::TransportError;
use serde_json::Value;

use crate::transport::{Endpoint, ResponseStatus, Transport};

/// Default attempts per call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Waits between attempts. Injected so tests never really sleep.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// `stats/contributors` is the slowest endpoint to warm up upstream.
    pub fn contributors() -> Self {
        Self::new(5, Duration::from_secs(3))
    }

    /// Upper bound on time spent sleeping for one call.
    pub fn max_total_delay(&self) -> Duration {
        self.retry_delay * self.max_retries.saturating_sub(1)
    }
}

/// Parse a response body, treating anything that carries no data as `None`.
///
/// Empty text, invalid JSON, `null`, `{}` and `[]` all count as nothing.
pub fn parse_body(body: &str) -> Option<Value> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Null) => None,
        Ok(Value::Array(items)) if items.is_empty() => None,
        Ok(Value::Object(fields)) if fields.is_empty() => None,
        Ok(value) => Some(value),
        Err(_) => None,
    }
}

/// Call `endpoint` until it yields data or `policy.max_retries` attempts are
/// used up.
///
/// Returns `Ok(None)` when every attempt was pending, failed or empty.
/// Returns `Err` only for [`TransportError::Unavailable`], without retrying.
/// Sleeps `retry_delay` between attempts and never after the last one.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    sleeper: &dyn Sleeper,
    endpoint: &Endpoint,
    policy: RetryPolicy,
) -> Result<Option<Value>, TransportError> {
    let attempts = policy.max_retries.max(1);

    for attempt in 1..=attempts {
        let reason = match transport.call(endpoint).await {
            Ok(response) => match response.classify() {
                ResponseStatus::Success => match parse_body(&response.body) {
                    Some(value) => return Ok(Some(value)),
                    None => "empty",
                },
                ResponseStatus::Pending => "pending",
                ResponseStatus::Failure(status) => {
                    tracing::debug!(%endpoint, status, attempt, "Upstream returned failure status");
                    "failure"
                }
            },
            Err(e) if e.is_fatal() => {
                tracing::error!(%endpoint, error = %e, "Upstream transport unavailable");
                return Err(e);
            }
            Err(e) => {
                tracing::debug!(%endpoint, error = %e, attempt, "Upstream call failed");
                "error"
            }
        };

        if attempt < attempts {
            tracing::debug!(
                %endpoint,
                attempt,
                max_retries = attempts,
                reason,
                delay_ms = policy.retry_delay.as_millis() as u64,
                "Upstream not ready, retrying"
            );
            sleeper.sleep(policy.retry_delay).await;
        }
    }

    tracing::warn!(%endpoint, attempts, "Upstream gave no data after all attempts");
    Ok(None)
}
