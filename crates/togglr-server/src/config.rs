//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use togglr_cache::RedisSettings;
use togglr_db_postgres::PostgresConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Local (per-process) cache settings
    #[serde(default)]
    pub cache: CacheSettings,
    /// Distributed cache and invalidation channel
    #[serde(default)]
    pub redis: RedisSettings,
    /// Scheduled-transition runner
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.cache.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be > 0".into());
        }
        if self.scheduler.interval_secs == 0 {
            return Err("scheduler.interval_secs must be > 0".into());
        }
        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if let Some(ref pg) = self.storage.postgres
            && pg.url.is_empty()
        {
            return Err("storage.postgres.url must not be empty".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8090
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Authority-store selection. Without a postgres section the server runs
/// on the in-memory store, which only makes sense for local development.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

/// Local-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL for local-cache entries, in seconds
    #[serde(default = "default_local_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_local_ttl_seconds() -> u64 {
    30
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_local_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// How often to look for due transitions, in seconds
    #[serde(default = "default_scheduler_interval_secs")]
    pub interval_secs: u64,
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_scheduler_interval_secs() -> u64 {
    60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_secs: default_scheduler_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load configuration from a TOML file. A missing file yields the
/// defaults; a malformed one is an error.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let config = if Path::new(path).exists() {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
    } else {
        tracing::info!(path = %path, "Config file not found, using defaults");
        AppConfig::default()
    };

    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: TOGGLR_CONFIG
/// 3. Default: togglr.toml
pub fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return path;
        }
    }

    if let Ok(path) = std::env::var("TOGGLR_CONFIG")
        && !path.is_empty()
    {
        return path;
    }

    "togglr.toml".to_string()
}
