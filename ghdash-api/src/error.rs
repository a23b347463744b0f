//! Error Types for the ghdash API
//!
//! Every failure leaving a handler is an [`ApiError`]: a machine-readable
//! [`ErrorCode`], a message and optional details, serialized as JSON with
//! the status code the error code maps to.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ghdash_core::{ConfigError, FetchError, KeyError, StorageError, TransportError};
use ghdash_storage::SwrError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No route or resource matches the request
    NotFound,

    // ========================================================================
    // Upstream Errors (502, 504)
    // ========================================================================
    /// The upstream source failed and nothing cached could be served
    UpstreamUnavailable,

    /// The upstream source did not answer in time
    UpstreamTimeout,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Cache store operation failed
    StorageError,

    /// Configuration is invalid
    ConfigInvalid,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::StorageError | ErrorCode::ConfigInvalid | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::NotFound => "Not found",
            ErrorCode::UpstreamUnavailable => "Upstream source unavailable",
            ErrorCode::UpstreamTimeout => "Upstream source timed out",
            ErrorCode::StorageError => "Cache store operation failed",
            ErrorCode::ConfigInvalid => "Invalid configuration",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Cache store error");
        ApiError::from_code(ErrorCode::StorageError)
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        tracing::warn!(error = %err, "Upstream fetch failed");
        match &err {
            FetchError::Transport(TransportError::Timeout { endpoint }) => ApiError::new(
                ErrorCode::UpstreamTimeout,
                format!("Upstream call to {} timed out", endpoint),
            ),
            FetchError::NoFetcher { domain } => {
                ApiError::internal_error(format!("No data source configured for {}", domain))
            }
            _ => ApiError::upstream_unavailable(err.to_string()),
        }
    }
}

impl From<SwrError> for ApiError {
    fn from(err: SwrError) -> Self {
        match err {
            SwrError::Fetch(e) => e.into(),
            SwrError::Storage(e) => e.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigInvalid, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!(error = %err, "Cached payload did not decode");
        ApiError::internal_error(format!("Cached payload did not decode: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ghdash_core::CacheDomain;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::UpstreamUnavailable.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::UpstreamTimeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ErrorCode::StorageError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::upstream_unavailable("gh CLI not found");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UPSTREAM_UNAVAILABLE"));
        assert!(json.contains("gh CLI not found"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_key_error_is_invalid_input() {
        let err: ApiError = KeyError::Malformed {
            key: "acme".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_swr_errors_map_by_cause() {
        let unavailable: ApiError = SwrError::Fetch(FetchError::Transport(
            TransportError::Unavailable {
                reason: "gh not found".to_string(),
            },
        ))
        .into();
        assert_eq!(unavailable.code, ErrorCode::UpstreamUnavailable);

        let timeout: ApiError = SwrError::Fetch(FetchError::Transport(TransportError::Timeout {
            endpoint: "repos/acme/widgets/actions/runs".to_string(),
        }))
        .into();
        assert_eq!(timeout.code, ErrorCode::UpstreamTimeout);

        let storage: ApiError = SwrError::Storage(StorageError::TransactionFailed {
            reason: "map full".to_string(),
        })
        .into();
        assert_eq!(storage.code, ErrorCode::StorageError);
        assert!(!storage.message.contains("map full"));

        let missing: ApiError = SwrError::Fetch(FetchError::NoFetcher {
            domain: CacheDomain::Lifecycle,
        })
        .into();
        assert_eq!(missing.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::from_code(ErrorCode::UpstreamTimeout);
        let display = err.to_string();
        assert!(display.contains("UpstreamTimeout"));
        assert!(display.contains("timed out"));
    }
}
