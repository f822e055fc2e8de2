//! Cache storage backends
//!
//! Every backend stores [`serde_json::Value`]s under a namespace prefix and
//! honours a per-entry expiry. Backends report failures through [`Result`];
//! the [`CacheManager`](crate::CacheManager) is responsible for turning those
//! into misses and `false` returns.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{CacheError, Result};

pub mod disk;
pub mod memory;
pub mod redis_backend;

pub use self::disk::DiskBackend;
pub use self::memory::{MemoryBackend, MemoryStore};
pub use self::redis_backend::RedisBackend;

/// Longest key accepted by any backend, in bytes.
pub const MAX_KEY_BYTES: usize = 1024;

/// A stored value together with its absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Logical key (without namespace prefix)
    pub key: String,
    /// The cached data
    pub value: serde_json::Value,
    /// Expiry as Unix milliseconds
    pub expires_at: i64,
}

impl CacheEntry {
    /// Create a new cache entry expiring `ttl` from now
    pub fn new(key: &str, value: serde_json::Value, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            key: key.to_string(),
            value,
            expires_at: now_millis().saturating_add(ttl_ms),
        }
    }

    /// An entry is expired once `now >= expires_at`
    pub fn is_expired(&self) -> bool {
        now_millis() >= self.expires_at
    }

    /// Get remaining TTL
    pub fn ttl_remaining(&self) -> Option<Duration> {
        let remaining = self.expires_at - now_millis();
        if remaining > 0 {
            Some(Duration::from_millis(remaining as u64))
        } else {
            None
        }
    }

    /// Approximate size of the serialized value in bytes
    pub fn size_bytes(&self) -> u64 {
        serde_json::to_string(&self.value)
            .map(|s| s.len() as u64)
            .unwrap_or(0)
    }
}

/// Self-reported backend statistics.
///
/// Only `available` has a fixed meaning; everything else is backend specific
/// and passed through untouched by the manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStats {
    pub available: bool,
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl BackendStats {
    pub fn available() -> Self {
        Self {
            available: true,
            details: BTreeMap::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Attach a backend-specific detail
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Uniform contract over a single storage medium.
///
/// Implementations must:
/// - treat expired entries as absent and evict them on read,
/// - treat undecodable entries as absent,
/// - make `delete` idempotent,
/// - scope `clear` to their own prefix.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend kind, used in stats and logs
    fn name(&self) -> &str;

    /// Namespace prefix applied to every key
    fn prefix(&self) -> &str;

    /// Whether the backend initialized successfully
    fn is_available(&self) -> bool;

    /// Retrieve a value. Read or decode failures yield `Ok(None)` where the
    /// backend can recover locally.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store a value for `ttl`
    async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) -> Result<()>;

    /// Remove a value; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a live entry exists
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove every entry under this backend's prefix
    async fn clear(&self) -> Result<()>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }

    /// Backend-specific statistics
    async fn stats(&self) -> BackendStats;
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Check a namespace prefix.
///
/// Prefixes double as directory names and Redis key segments, so only ASCII
/// alphanumerics plus `-`, `_` and `.` are accepted, and never `.` or `..`.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && prefix != "."
        && prefix != ".."
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidPrefix {
            prefix: prefix.to_string(),
        })
    }
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_BYTES {
        return Err(CacheError::InvalidKey {
            key: key.chars().take(64).collect(),
        });
    }
    Ok(())
}
