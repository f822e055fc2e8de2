//! Redis cache storage
//!
//! Values are stored as JSON text under `<prefix>:<key>` with a millisecond
//! expiry, so Redis evicts them natively. Every command runs under a timeout
//! and a timeout is reported like any other failure.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, FromRedisValue};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{validate_prefix, BackendStats, CacheBackend};
use crate::{config::RedisConfig, CacheError, Result};

const SCAN_BATCH: usize = 100;

/// Redis cache backend
pub struct RedisBackend {
    connection: Option<ConnectionManager>,
    prefix: String,
    command_timeout: Duration,
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// An invalid prefix, or a refused, failed or timed out connection,
    /// yields an unavailable backend rather than an error.
    pub async fn connect(config: &RedisConfig, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let command_timeout = Duration::from_millis(config.command_timeout_ms);
        if let Err(e) = validate_prefix(&prefix) {
            warn!(error = %e, "Redis cache backend unavailable");
            return Self {
                connection: None,
                prefix,
                command_timeout,
            };
        }

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let connection = match timeout(connect_timeout, Self::open(&config.url)).await {
            Ok(Ok(connection)) => {
                info!(prefix = %prefix, "Redis cache backend connected");
                Some(connection)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Redis cache backend unavailable");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = config.connect_timeout_ms,
                    "Redis cache backend connection timed out"
                );
                None
            }
        };

        Self {
            connection,
            prefix,
            command_timeout,
        }
    }

    async fn open(url: &str) -> Result<ConnectionManager> {
        let client = redis::Client::open(url)?;
        let mut connection = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(connection)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .clone()
            .ok_or_else(|| CacheError::Unavailable {
                backend: self.name().to_string(),
            })
    }

    /// Run one command under the command timeout
    async fn run<T: FromRedisValue + Send>(&self, operation: &str, cmd: &redis::Cmd) -> Result<T> {
        let mut connection = self.connection()?;
        match timeout(self.command_timeout, cmd.query_async(&mut connection)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout {
                backend: self.name().to_string(),
                operation: operation.to_string(),
            }),
        }
    }
}

/// Escape glob metacharacters so a prefix matches literally in SCAN MATCH
fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn is_available(&self) -> bool {
        self.connection.is_some()
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if self.connection.is_none() {
            return Ok(None);
        }

        let full_key = self.full_key(key);
        let raw: Option<String> = self.run("get", redis::cmd("GET").arg(&full_key)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key = %full_key, error = %e, "Removing undecodable redis cache entry");
                let _: Result<i64> = self.run("del", redis::cmd("DEL").arg(&full_key)).await;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(value).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let _: () = self
            .run(
                "set",
                redis::cmd("SET")
                    .arg(self.full_key(key))
                    .arg(payload)
                    .arg("PX")
                    .arg(ttl_ms),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _: i64 = self
            .run("del", redis::cmd("DEL").arg(self.full_key(key)))
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let pattern = format!("{}:*", escape_glob(&self.prefix));
        let mut cursor: u64 = 0;
        let mut total_deleted: i64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = self
                .run(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH),
                )
                .await?;

            if !keys.is_empty() {
                let deleted: i64 = self.run("del", redis::cmd("DEL").arg(&keys)).await?;
                total_deleted += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        info!(prefix = %self.prefix, deleted = total_deleted, "Cleared redis cache entries");
        Ok(())
    }

    async fn stats(&self) -> BackendStats {
        if self.connection.is_none() {
            return BackendStats::unavailable().with("prefix", self.prefix.as_str());
        }

        let stats = BackendStats::available()
            .with("prefix", self.prefix.as_str())
            .with("command_timeout_ms", self.command_timeout.as_millis() as u64);

        match self.run::<String>("info", redis::cmd("INFO").arg("memory")).await {
            Ok(info) => info
                .lines()
                .filter_map(|line| line.split_once(':'))
                .filter(|(name, _)| matches!(*name, "used_memory" | "used_memory_human"))
                .fold(stats, |stats, (name, value)| stats.with(name, value.trim())),
            Err(e) => stats.with("error", e.to_string()),
        }
    }
}
