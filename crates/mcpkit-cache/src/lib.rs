//! # mcpkit Cache
//!
//! Read-through multi-tier caching for MCP tool servers.
//!
//! ## Features
//!
//! - **Ordered tiers**: backends are consulted fastest first; a hit in a
//!   slower tier is promoted into every faster one
//! - **Fail-open**: backend failures degrade to misses or `false`, never errors
//! - **Backends**: in-process memory, local disk and Redis, each with its own
//!   namespace prefix and native expiry
//! - **Statistics**: hit/miss/set/delete counters plus per-backend reports
//! - **Configuration**: TOML file with `MCPKIT_CACHE__*` environment overrides
//!
//! ```no_run
//! use std::time::Duration;
//! use mcpkit_cache::{CacheManager, CacheManagerConfig};
//!
//! # async fn demo() -> mcpkit_cache::Result<()> {
//! let cache = CacheManager::from_config(&CacheManagerConfig::load(None)?).await?;
//! cache.set("search:rust", &vec!["tokio", "serde"], Some(Duration::from_secs(60))).await;
//! let hits: Option<Vec<String>> = cache.get("search:rust").await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod storage;

pub use config::{BackendConfig, CacheManagerConfig, DiskConfig, MemoryConfig, RedisConfig};
pub use error::{CacheError, Result};
pub use manager::{CacheManager, CacheManagerBuilder, DEFAULT_TTL};
pub use metrics::{CacheManagerStats, CacheMetrics, CacheStats};
pub use storage::{
    BackendStats, CacheBackend, CacheEntry, DiskBackend, MemoryBackend, MemoryStore, RedisBackend,
};
