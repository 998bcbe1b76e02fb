//! Redis settings and pool construction.

use std::time::Duration;

use deadpool_redis::Pool;
use serde::{Deserialize, Serialize};

/// Redis configuration shared by the serving side and direct-mode clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Enable the distributed cache (gracefully degrades without it).
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Pub/sub channel carrying invalidation messages
    #[serde(default = "default_channel")]
    pub channel: String,

    /// TTL applied to distributed-cache keys on write, in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_redis_enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

fn default_channel() -> String {
    "toggle-invalidate".to_string()
}

fn default_ttl_seconds() -> u64 {
    3600
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            channel: default_channel(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

/// Build a Redis pool from settings, verifying one connection.
///
/// Returns `None` when Redis is disabled or unreachable; callers run in
/// local-only mode in that case. Failing to reach Redis is never fatal.
pub async fn create_redis_pool(settings: &RedisSettings) -> Option<Pool> {
    if !settings.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return None;
    }

    tracing::info!(url = %settings.url, "Connecting to Redis");

    let mut config = deadpool_redis::Config::from_url(&settings.url);
    if let Some(ref mut pool_config) = config.pool {
        pool_config.max_size = settings.pool_size;
        pool_config.timeouts.wait = Some(Duration::from_millis(settings.timeout_ms));
        pool_config.timeouts.create = Some(Duration::from_millis(settings.timeout_ms));
        pool_config.timeouts.recycle = Some(Duration::from_millis(settings.timeout_ms));
    }

    let pool = match config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool, using local cache only");
            return None;
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            Some(pool)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to connect to Redis, using local cache only");
            None
        }
    }
}
