//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB). One environment is opened at
//! startup and shared for the life of the process; each save is a single
//! write transaction, so concurrent saves to the same key are serialized by
//! LMDB's writer lock and never interleave.
//!
//! # Value Format
//!
//! `[updated_at: i64 millis, little endian][payload JSON]`

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghdash_core::{
    CacheDomain, CacheEntry, Clock, ResourceKey, StorageError, SystemClock, Timestamp,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde_json::Value;

use super::domain_key::DomainKey;
use super::traits::{CacheStats, CacheStore};

const TIMESTAMP_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for StorageError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::EnvOpen(reason) | LmdbCacheError::DbOpen(reason) => {
                StorageError::EnvOpen { reason }
            }
            LmdbCacheError::Transaction(reason) => StorageError::TransactionFailed { reason },
            LmdbCacheError::Io(e) => StorageError::Io {
                reason: e.to_string(),
            },
        }
    }
}

fn txn_error(e: heed::Error) -> StorageError {
    LmdbCacheError::Transaction(e.to_string()).into()
}

/// LMDB-backed [`CacheStore`].
///
/// # Example
///
/// ```ignore
/// use ghdash_storage::cache::{CacheStore, LmdbCacheStore};
///
/// let store = LmdbCacheStore::open("./data/cache", 512)?;
/// store.save(CacheDomain::Workflow, &key, payload).await?;
/// let entry = store.get(CacheDomain::Workflow, &key).await?;
/// ```
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    saves: AtomicU64,
}

impl LmdbCacheStore {
    /// Open (creating if needed) the cache environment at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path in this process and
        // the backing files are not modified by anything else.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            clock: Arc::new(SystemClock),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            saves: AtomicU64::new(0),
        })
    }

    /// Replace the clock used for timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

fn encode_value(updated_at: Timestamp, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TIMESTAMP_LEN + payload.len());
    bytes.extend_from_slice(&updated_at.timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn decode_timestamp(bytes: &[u8]) -> Option<Timestamp> {
    let millis: [u8; TIMESTAMP_LEN] = bytes.get(..TIMESTAMP_LEN)?.try_into().ok()?;
    DateTime::from_timestamp_millis(i64::from_le_bytes(millis))
}

fn decode_value(domain: CacheDomain, bytes: &[u8]) -> Result<(Timestamp, Value), StorageError> {
    let updated_at = decode_timestamp(bytes).ok_or_else(|| StorageError::Corrupt {
        domain,
        reason: "missing or invalid timestamp".to_string(),
    })?;
    let payload = serde_json::from_slice(&bytes[TIMESTAMP_LEN..]).map_err(|e| {
        StorageError::Corrupt {
            domain,
            reason: e.to_string(),
        }
    })?;
    Ok((updated_at, payload))
}

/// Truncate to the millisecond precision that survives the value encoding.
fn to_stored_precision(at: Timestamp) -> Timestamp {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let stored_key = DomainKey::new(domain, key.clone()).encode();
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        match self.db.get(&rtxn, &stored_key).map_err(txn_error)? {
            Some(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let (updated_at, payload) = decode_value(domain, bytes)?;
                Ok(Some(CacheEntry::new(domain, key.clone(), payload, updated_at)))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn save(
        &self,
        domain: CacheDomain,
        key: &ResourceKey,
        payload: Value,
    ) -> Result<CacheEntry, StorageError> {
        let stored_key = DomainKey::new(domain, key.clone()).encode();
        let payload_bytes =
            serde_json::to_vec(&payload).map_err(|e| StorageError::Serialization {
                domain,
                reason: e.to_string(),
            })?;

        let now = to_stored_precision(self.clock.now());
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;

        // Read the previous timestamp inside the write transaction so the
        // monotonic check and the write commit together.
        let previous = self
            .db
            .get(&wtxn, &stored_key)
            .map_err(txn_error)?
            .and_then(decode_timestamp);
        let updated_at = previous.map_or(now, |previous| previous.max(now));

        self.db
            .put(&mut wtxn, &stored_key, &encode_value(updated_at, &payload_bytes))
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(CacheEntry::new(domain, key.clone(), payload, updated_at))
    }

    async fn list_keys(&self, domain: CacheDomain) -> Result<Vec<ResourceKey>, StorageError> {
        let prefix = DomainKey::domain_prefix(domain);
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        let mut keys = Vec::new();
        for result in self.db.prefix_iter(&rtxn, &prefix).map_err(txn_error)? {
            let (stored_key, _) = result.map_err(txn_error)?;
            match DomainKey::decode(stored_key) {
                Some(decoded) => keys.push(decoded.into_key()),
                None => tracing::warn!(%domain, "Skipping undecodable cache key"),
            }
        }
        Ok(keys)
    }

    async fn clear(&self, domain: CacheDomain) -> Result<u64, StorageError> {
        let prefix = DomainKey::domain_prefix(domain);
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;

        let stored_keys = self
            .db
            .prefix_iter(&wtxn, &prefix)
            .map_err(txn_error)?
            .map(|result| result.map(|(stored_key, _)| stored_key.to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(txn_error)?;

        let mut deleted = 0u64;
        for stored_key in &stored_keys {
            if self.db.delete(&mut wtxn, stored_key).map_err(txn_error)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_error)?;

        Ok(deleted)
    }

    async fn stats(&self) -> Result<CacheStats, StorageError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_error)?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            entry_count,
        })
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl std::fmt::Debug for LmdbCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbCacheStore")
            .field("path", &self.env.path())
            .finish()
    }
}
