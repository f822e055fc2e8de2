//! Cache operation counters and statistics

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

use crate::storage::BackendStats;

/// Snapshot of the manager's own operation counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,
    /// Total number of cache misses
    pub misses: u64,
    /// Total number of successful sets
    pub sets: u64,
    /// Total number of successful deletes
    pub deletes: u64,
    /// Values copied into a higher-priority backend after a lower-tier hit
    pub promotions: u64,
    /// Individual backend calls that failed
    pub backend_errors: u64,
    /// Timestamp of metrics creation (or last reset)
    pub created_at: SystemTime,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or 0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get uptime since metrics creation
    pub fn uptime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Thread-safe cache metrics tracker
///
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
    deletes: Arc<AtomicU64>,
    promotions: Arc<AtomicU64>,
    backend_errors: Arc<AtomicU64>,
    created_at: Arc<parking_lot::Mutex<SystemTime>>,
}

impl CacheMetrics {
    /// Create new cache metrics
    pub fn new() -> Self {
        Self {
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
            deletes: Arc::new(AtomicU64::new(0)),
            promotions: Arc::new(AtomicU64::new(0)),
            backend_errors: Arc::new(AtomicU64::new(0)),
            created_at: Arc::new(parking_lot::Mutex::new(SystemTime::now())),
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotions(&self, count: u64) {
        self.promotions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            created_at: *self.created_at.lock(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.promotions.store(0, Ordering::Relaxed);
        self.backend_errors.store(0, Ordering::Relaxed);
        *self.created_at.lock() = SystemTime::now();
    }

    /// Get a formatted summary of cache metrics
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Cache Metrics:\n  Hits: {}\n  Misses: {}\n  Hit Rate: {:.2}%\n  Sets: {}\n  Deletes: {}\n  Promotions: {}\n  Backend Errors: {}",
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0,
            stats.sets,
            stats.deletes,
            stats.promotions,
            stats.backend_errors
        )
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated manager statistics, as returned by
/// [`CacheManager::stats`](crate::CacheManager::stats)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManagerStats {
    /// Active backend names in priority order
    pub backends: Vec<String>,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_sets: u64,
    pub total_deletes: u64,
    pub total_promotions: u64,
    pub backend_errors: u64,
    pub hit_rate: f64,
    /// Each backend's self-reported stats, keyed by backend name
    pub backend_stats: BTreeMap<String, BackendStats>,
}

impl CacheManagerStats {
    pub(crate) fn new(
        backends: Vec<String>,
        stats: CacheStats,
        backend_stats: BTreeMap<String, BackendStats>,
    ) -> Self {
        Self {
            backends,
            total_hits: stats.hits,
            total_misses: stats.misses,
            total_sets: stats.sets,
            total_deletes: stats.deletes,
            total_promotions: stats.promotions,
            backend_errors: stats.backend_errors,
            hit_rate: stats.hit_rate(),
            backend_stats,
        }
    }
}

/// Operation timing helper
#[derive(Debug)]
pub struct OperationTimer {
    start_time: std::time::Instant,
}

impl OperationTimer {
    /// Start timing an operation
    pub fn start() -> Self {
        Self {
            start_time: std::time::Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}
