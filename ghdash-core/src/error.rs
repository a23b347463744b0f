//! Error types for ghdash operations

use crate::CacheDomain;
use thiserror::Error;

/// Resource key validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Resource key is empty")]
    Empty,

    #[error("Resource key must have the form owner/repo, got {key:?}")]
    Malformed { key: String },

    #[error("Invalid character in {part} of resource key {key:?}")]
    InvalidCharacter { part: &'static str, key: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to open cache environment: {reason}")]
    EnvOpen { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed for {domain}: {reason}")]
    Serialization { domain: CacheDomain, reason: String },

    #[error("Corrupt cache entry in {domain}: {reason}")]
    Corrupt { domain: CacheDomain, reason: String },

    #[error("I/O error: {reason}")]
    Io { reason: String },
}

/// Failures of the upstream transport itself.
///
/// "Not ready yet" is never represented here; pending responses are retried
/// by the adapter and surface as an empty result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Upstream tool unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Upstream call to {endpoint} failed: {reason}")]
    Io { endpoint: String, reason: String },

    #[error("Upstream call to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl TransportError {
    /// Whether the transport can never succeed in this process
    /// (e.g. binary missing), as opposed to a single failed call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Domain fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to decode {domain} payload: {reason}")]
    Decode { domain: CacheDomain, reason: String },

    #[error("No fetcher registered for {domain}")]
    NoFetcher { domain: CacheDomain },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all ghdash errors.
#[derive(Debug, Clone, Error)]
pub enum GhdashError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<TransportError> for GhdashError {
    fn from(err: TransportError) -> Self {
        Self::Fetch(FetchError::Transport(err))
    }
}

/// Result type alias for ghdash operations.
pub type GhdashResult<T> = Result<T, GhdashError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_error_display() {
        let err = KeyError::Malformed {
            key: "acme".to_string(),
        };
        assert!(err.to_string().contains("owner/repo"));
        assert!(err.to_string().contains("acme"));
    }

    #[test]
    fn test_storage_error_display_mentions_domain() {
        let err = StorageError::Corrupt {
            domain: CacheDomain::Workflow,
            reason: "short value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("workflow"));
        assert!(msg.contains("short value"));
    }

    #[test]
    fn test_transport_error_fatality() {
        assert!(TransportError::Unavailable {
            reason: "gh not found".to_string()
        }
        .is_fatal());
        assert!(!TransportError::Timeout {
            endpoint: "stats/contributors".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_master_error_from_transport() {
        let err: GhdashError = TransportError::Unavailable {
            reason: "gh CLI not found".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            GhdashError::Fetch(FetchError::Transport(TransportError::Unavailable { .. }))
        ));
        assert!(err.to_string().contains("gh CLI not found"));
    }
}
