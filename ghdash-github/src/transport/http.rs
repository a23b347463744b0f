//! Transport over the GitHub REST API with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use ghdash_core::TransportError;
use reqwest::Client;

use super::{Endpoint, RawResponse, Transport};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Direct HTTPS transport, optionally authenticated with a token.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a transport against `api.github.com`.
    ///
    /// # Arguments
    /// * `token` - Personal access token, usually from `GITHUB_TOKEN`
    /// * `call_timeout` - Limit on a single request, body included
    pub fn new(token: Option<String>, call_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(call_timeout)
            .user_agent(concat!("ghdash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Unavailable {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: GITHUB_API_URL.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| classify(endpoint, e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(endpoint, e))?;
        Ok(RawResponse::new(status, body))
    }
}

fn classify(endpoint: &Endpoint, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        TransportError::Io {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
