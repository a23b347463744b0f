//! Transport over the GitHub CLI (`gh api <path> -i`).
//!
//! `-i` makes `gh` print the status line and headers before the body, which
//! is the only way to see a 202 through the CLI. `gh` exits non-zero on any
//! non-2xx status but still prints the response, so the status line wins
//! over the exit code whenever it is present.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use ghdash_core::TransportError;
use tokio::process::Command;

use super::{Endpoint, RawResponse, Transport};

/// Default limit on a single `gh` invocation.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GhCliTransport {
    binary: String,
    call_timeout: Duration,
}

impl Default for GhCliTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GhCliTransport {
    pub fn new() -> Self {
        Self {
            binary: "gh".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for GhCliTransport {
    async fn call(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError> {
        let child = Command::new(&self.binary)
            .arg("api")
            .arg(endpoint.path())
            .arg("-i")
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.call_timeout, child).await {
            Err(_) => {
                return Err(TransportError::Timeout {
                    endpoint: endpoint.to_string(),
                })
            }
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Err(TransportError::Unavailable {
                    reason: format!("cannot run {}: {}", self.binary, e),
                })
            }
            Ok(Err(e)) => {
                return Err(TransportError::Io {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(response) = parse_included_response(&stdout) {
            return Ok(response);
        }

        if output.status.success() {
            return Err(TransportError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "missing HTTP status line".to_string(),
            });
        }
        Err(TransportError::Io {
            endpoint: endpoint.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Split `gh api -i` output into status and body.
///
/// ```text
/// HTTP/2.0 202 Accepted
/// Content-Type: application/json
///
/// {}
/// ```
fn parse_included_response(output: &str) -> Option<RawResponse> {
    let output = output.trim_start();
    let (status_line, rest) = output.split_once('\n')?;
    let status = parse_status_line(status_line.trim_end_matches('\r'))?;

    let body = rest
        .split_once("\r\n\r\n")
        .or_else(|| rest.split_once("\n\n"))
        .map(|(_, body)| body)
        .unwrap_or("");
    Some(RawResponse::new(status, body.trim()))
}

/// `HTTP/2.0 202 Accepted` -> 202
fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pending() {
        let output = "HTTP/2.0 202 Accepted\nContent-Length: 2\nX-Github-Request-Id: A\n\n{}\n";
        let response = parse_included_response(output).expect("should parse");
        assert_eq!(response.status, 202);
        assert_eq!(response.body, "{}");
    }

    #[test]
    fn test_parse_crlf_body() {
        let output = "HTTP/2.0 200 OK\r\nContent-Type: application/json\r\n\r\n[{\"total\": 3}]\r\n";
        let response = parse_included_response(output).expect("should parse");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "[{\"total\": 3}]");
    }

    #[test]
    fn test_parse_headers_only() {
        let response =
            parse_included_response("HTTP/1.1 204 No Content\nServer: GitHub.com\n").expect("parse");
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_parse_rejects_plain_output() {
        assert!(parse_included_response("").is_none());
        assert!(parse_included_response("[1, 2, 3]").is_none());
        assert!(parse_included_response("gh: Not Found (HTTP 404)\n").is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let transport = GhCliTransport::new().with_binary("ghdash-definitely-not-installed");
        let err = transport
            .call(&Endpoint::new("rate_limit"))
            .await
            .expect_err("binary does not exist");
        assert!(err.is_fatal());
    }
}
