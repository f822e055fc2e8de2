//! Read-through multi-tier cache manager
//!
//! Backends are consulted strictly in priority order on reads; writes,
//! deletes and clears fan out to every backend. No backend failure ever
//! reaches the caller: reads degrade to misses and writes to `false`, so a
//! caller can always fall back to computing the value itself.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, CacheManagerConfig};
use crate::error::{CacheError, Result};
use crate::metrics::{CacheManagerStats, CacheMetrics, CacheStats, OperationTimer};
use crate::storage::{validate_key, CacheBackend, DiskBackend, MemoryBackend, RedisBackend};

/// Default TTL when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Multi-tier cache manager
pub struct CacheManager {
    /// Active backends, fastest first
    backends: Vec<Arc<dyn CacheBackend>>,
    /// Unique display name per backend, same order
    names: Vec<String>,
    default_ttl: Duration,
    metrics: CacheMetrics,
}

impl CacheManager {
    /// Create a manager over `backends` in priority order.
    ///
    /// Backends that report themselves unavailable are skipped.
    pub fn new(backends: Vec<Arc<dyn CacheBackend>>, default_ttl: Duration) -> Self {
        let backends: Vec<_> = backends
            .into_iter()
            .filter(|backend| {
                let available = backend.is_available();
                if !available {
                    info!(
                        backend = backend.name(),
                        prefix = backend.prefix(),
                        "Skipping unavailable cache backend"
                    );
                }
                available
            })
            .collect();

        let default_ttl = if default_ttl.is_zero() {
            warn!("Zero default TTL, using {}s", DEFAULT_TTL.as_secs());
            DEFAULT_TTL
        } else {
            default_ttl
        };

        let names = unique_names(&backends);
        debug!(backends = ?names, "Cache manager initialized");

        Self {
            backends,
            names,
            default_ttl,
            metrics: CacheMetrics::new(),
        }
    }

    /// Build every configured backend and keep the ones that came up.
    ///
    /// Fails only on invalid configuration.
    pub async fn from_config(config: &CacheManagerConfig) -> Result<Self> {
        config.validate()?;

        let mut backends: Vec<Arc<dyn CacheBackend>> = Vec::with_capacity(config.backends.len());
        for backend in &config.backends {
            let prefix = backend.prefix().unwrap_or(&config.namespace).to_string();
            let built: Arc<dyn CacheBackend> = match backend {
                BackendConfig::Memory(memory) => Arc::new(
                    MemoryBackend::new(prefix).with_max_entries(memory.max_entries),
                ),
                BackendConfig::Disk(disk) => {
                    Arc::new(DiskBackend::new(&disk.root, prefix).with_compression(disk.compress))
                }
                BackendConfig::Redis(redis) => Arc::new(RedisBackend::connect(redis, prefix).await),
            };
            backends.push(built);
        }

        Ok(Self::new(backends, config.default_ttl()))
    }

    /// Start building a manager
    pub fn builder() -> CacheManagerBuilder {
        CacheManagerBuilder::new()
    }

    /// TTL applied when callers pass none, and to promoted values
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Names of the active backends in priority order
    pub fn available_backends(&self) -> Vec<String> {
        self.names.clone()
    }

    /// Look a value up, promoting it into faster tiers on a lower-tier hit.
    ///
    /// A stored value that does not decode as `T` counts as a miss in that
    /// tier and the lookup continues downward.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let timer = OperationTimer::start();

        if let Err(e) = validate_key(key) {
            debug!(error = %e, "Rejected cache lookup");
            self.metrics.record_miss();
            return None;
        }

        for (tier, backend) in self.backends.iter().enumerate() {
            let raw = match backend.get(key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    self.metrics.record_backend_error();
                    warn!(backend = %self.names[tier], key, error = %e, "Cache backend read failed");
                    continue;
                }
            };

            match T::deserialize(&raw) {
                Ok(value) => {
                    self.promote(key, &raw, tier).await;
                    self.metrics.record_hit();
                    debug!(
                        backend = %self.names[tier],
                        key,
                        tier,
                        elapsed_ms = timer.elapsed_ms(),
                        "Cache hit"
                    );
                    return Some(value);
                }
                Err(e) => {
                    debug!(backend = %self.names[tier], key, error = %e, "Cached value has unexpected shape");
                }
            }
        }

        self.metrics.record_miss();
        debug!(key, elapsed_ms = timer.elapsed_ms(), "Cache miss");
        None
    }

    /// Untyped lookup
    pub async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.get(key).await
    }

    /// Copy a value found at `found_at` into every faster backend
    async fn promote(&self, key: &str, raw: &serde_json::Value, found_at: usize) {
        if found_at == 0 {
            return;
        }

        let results = join_all(
            self.backends[..found_at]
                .iter()
                .map(|backend| backend.set(key, raw, self.default_ttl)),
        )
        .await;

        let mut promoted = 0;
        for (name, result) in self.names.iter().zip(results) {
            match result {
                Ok(()) => promoted += 1,
                Err(e) => debug!(backend = %name, key, error = %e, "Cache promotion failed"),
            }
        }
        if promoted > 0 {
            self.metrics.record_promotions(promoted);
        }
    }

    /// Store a value in every backend.
    ///
    /// `ttl` of `None` uses the default TTL; a zero TTL is rejected. Returns
    /// `true` if at least one backend accepted the write.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        if self.backends.is_empty() {
            return false;
        }
        if let Err(e) = validate_key(key) {
            warn!(error = %e, "Rejected cache write");
            return false;
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            warn!(key, error = %CacheError::InvalidTtl, "Rejected cache write");
            return false;
        }

        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Cache value is not serializable");
                return false;
            }
        };

        let results = join_all(
            self.backends
                .iter()
                .map(|backend| backend.set(key, &value, ttl)),
        )
        .await;

        let success = self.coalesce("set", key, results);
        if success {
            self.metrics.record_set();
        }
        success
    }

    /// Remove a key from every backend
    pub async fn delete(&self, key: &str) -> bool {
        if self.backends.is_empty() || validate_key(key).is_err() {
            return false;
        }

        let results = join_all(self.backends.iter().map(|backend| backend.delete(key))).await;

        let success = self.coalesce("delete", key, results);
        if success {
            self.metrics.record_delete();
        }
        success
    }

    /// Clear every backend's namespace.
    ///
    /// All backends are attempted; the result is `false` if any failed or
    /// none are active.
    pub async fn clear(&self) -> bool {
        if self.backends.is_empty() {
            return false;
        }

        let results = join_all(self.backends.iter().map(|backend| backend.clear())).await;

        let mut all_ok = true;
        for (name, result) in self.names.iter().zip(results) {
            if let Err(e) = result {
                all_ok = false;
                self.metrics.record_backend_error();
                warn!(backend = %name, error = %e, "Cache clear failed");
            }
        }
        info!(success = all_ok, "Cache cleared");
        all_ok
    }

    /// Check if any backend holds a live entry, without promotion or
    /// touching the hit/miss counters
    pub async fn contains(&self, key: &str) -> bool {
        if validate_key(key).is_err() {
            return false;
        }
        for backend in &self.backends {
            if backend.contains(key).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    /// Return the cached value, or compute, store and return it
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get(key).await {
            return value;
        }
        let value = compute().await;
        self.set(key, &value, ttl).await;
        value
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible
    /// computations; errors are returned and nothing is cached
    pub async fn try_get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Drop expired entries from every backend, returning the total removed
    pub async fn purge_expired(&self) -> usize {
        let results = join_all(self.backends.iter().map(|backend| backend.purge_expired())).await;

        let mut removed = 0;
        for (name, result) in self.names.iter().zip(results) {
            match result {
                Ok(count) => removed += count,
                Err(e) => {
                    self.metrics.record_backend_error();
                    warn!(backend = %name, error = %e, "Cache purge failed");
                }
            }
        }
        debug!(removed, "Purged expired cache entries");
        removed
    }

    /// Counters plus each backend's self-reported stats
    pub async fn stats(&self) -> CacheManagerStats {
        let reported = join_all(self.backends.iter().map(|backend| backend.stats())).await;
        let backend_stats: BTreeMap<_, _> = self.names.iter().cloned().zip(reported).collect();

        CacheManagerStats::new(self.names.clone(), self.metrics.snapshot(), backend_stats)
    }

    /// Snapshot of the operation counters only
    pub fn counters(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Reset the operation counters
    pub fn reset_stats(&self) {
        self.metrics.reset();
    }

    /// Coalesce per-backend results: success if any backend succeeded
    fn coalesce(&self, operation: &str, key: &str, results: Vec<Result<()>>) -> bool {
        let mut any_ok = false;
        for (name, result) in self.names.iter().zip(results) {
            match result {
                Ok(()) => any_ok = true,
                Err(e) => {
                    self.metrics.record_backend_error();
                    warn!(backend = %name, key, operation, error = %e, "Cache backend operation failed");
                }
            }
        }
        any_ok
    }
}

/// Suffix repeated backend kinds so stats keys stay unique
fn unique_names(backends: &[Arc<dyn CacheBackend>]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    backends
        .iter()
        .map(|backend| {
            let count = seen.entry(backend.name()).or_insert(0);
            *count += 1;
            if *count == 1 {
                backend.name().to_string()
            } else {
                format!("{}-{}", backend.name(), count)
            }
        })
        .collect()
}

/// Builder pattern for cache manager construction
pub struct CacheManagerBuilder {
    backends: Vec<Arc<dyn CacheBackend>>,
    default_ttl: Duration,
}

impl CacheManagerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Append a backend with lower priority than those already added
    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Set the default TTL
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Build the manager
    pub fn build(self) -> CacheManager {
        CacheManager::new(self.backends, self.default_ttl)
    }
}

impl Default for CacheManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
