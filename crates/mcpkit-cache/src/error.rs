//! Cache-related error types

use thiserror::Error;

/// Cache operation errors
///
/// These never cross the [`CacheManager`](crate::CacheManager) boundary; the
/// manager logs them and coalesces each backend call to a hit/miss or a
/// success flag.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Backend unavailable: {backend}")]
    Unavailable { backend: String },

    #[error("Backend {backend} timed out during {operation}")]
    Timeout { backend: String, operation: String },

    #[error("Invalid cache key: {key}")]
    InvalidKey { key: String },

    #[error("Invalid namespace prefix: {prefix:?}")]
    InvalidPrefix { prefix: String },

    #[error("Invalid TTL: must be greater than zero")]
    InvalidTtl,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        CacheError::Config(err.to_string())
    }
}

/// Re-export commonly used Result type
pub type Result<T> = std::result::Result<T, CacheError>;
