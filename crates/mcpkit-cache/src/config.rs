//! Cache configuration types and loading

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{storage, CacheError, Result};

/// Environment variable prefix for overrides, e.g. `MCPKIT_CACHE__DEFAULT_TTL_SECS`
pub const ENV_PREFIX: &str = "MCPKIT_CACHE";

/// Cache manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheManagerConfig {
    /// Namespace prefix shared by every backend without its own prefix
    pub namespace: String,
    /// TTL used when a caller passes none, and for tier promotion
    pub default_ttl_secs: u64,
    /// Backends in priority order, fastest first
    pub backends: Vec<BackendConfig>,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            namespace: "mcpkit".to_string(),
            default_ttl_secs: 3600, // 1 hour
            backends: vec![
                BackendConfig::Memory(MemoryConfig::default()),
                BackendConfig::Disk(DiskConfig::default()),
            ],
        }
    }
}

/// One backend to attempt to activate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory(MemoryConfig),
    Disk(DiskConfig),
    Redis(RedisConfig),
}

impl BackendConfig {
    /// Backend-specific prefix override
    pub fn prefix(&self) -> Option<&str> {
        match self {
            BackendConfig::Memory(c) => c.prefix.as_deref(),
            BackendConfig::Disk(c) => c.prefix.as_deref(),
            BackendConfig::Redis(c) => c.prefix.as_deref(),
        }
    }
}

/// In-process backend options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub prefix: Option<String>,
    /// Maximum number of entries; unbounded when unset
    pub max_entries: Option<usize>,
}

/// Local-disk backend options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub prefix: Option<String>,
    /// Root directory; each namespace gets a subdirectory
    pub root: PathBuf,
    /// Gzip entry files
    pub compress: bool,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            root: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mcpkit"),
            compress: false,
        }
    }
}

/// Networked key-value backend options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub prefix: Option<String>,
    pub url: String,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_ms: 500,
            command_timeout_ms: 250,
        }
    }
}

impl CacheManagerConfig {
    /// Load configuration from an optional TOML file plus environment
    /// overrides, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Default TTL as a duration
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_prefix(&self.namespace)?;

        if self.default_ttl_secs == 0 {
            return Err(CacheError::Config(
                "default_ttl_secs must be greater than 0".to_string(),
            ));
        }

        for backend in &self.backends {
            if let Some(prefix) = backend.prefix() {
                validate_prefix(prefix)?;
            }
            if let BackendConfig::Redis(redis) = backend {
                if redis.connect_timeout_ms == 0 || redis.command_timeout_ms == 0 {
                    return Err(CacheError::Config(
                        "redis timeouts must be greater than 0".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    storage::validate_prefix(prefix).map_err(|e| CacheError::Config(e.to_string()))
}
