//! Test doubles for transports and retry sleeps.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ghdash_core::TransportError;
use serde_json::Value;

use crate::retry::Sleeper;
use crate::transport::{Endpoint, RawResponse, Transport};

type Scripted = Result<RawResponse, TransportError>;

/// Transport answering from per-path scripts.
///
/// Responses queued for a path are returned in order; the last one repeats
/// once the queue runs dry. Paths with no script answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: &str, response: Scripted) {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(path.trim_start_matches('/').to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_json(&self, path: &str, body: Value) {
        self.push(path, Ok(RawResponse::new(200, body.to_string())));
    }

    pub fn push_pending(&self, path: &str) {
        self.push(path, Ok(RawResponse::new(202, "{}")));
    }

    pub fn push_error(&self, path: &str, error: TransportError) {
        self.push(path, Err(error));
    }

    /// Every path called, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let path = path.trim_start_matches('/');
        self.calls().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(endpoint.path().to_string());

        let mut scripts = self
            .scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match scripts.get_mut(endpoint.path()) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(RawResponse::new(404, ""))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(RawResponse::new(404, ""))),
            None => Ok(RawResponse::new(404, "{\"message\":\"Not Found\"}")),
        }
    }
}

/// Sleeper that returns at once and records what it was asked to wait.
#[derive(Debug, Default)]
pub struct InstantSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
    }
}
