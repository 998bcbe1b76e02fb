//! Client configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use togglr_cache::RedisSettings;
use togglr_core::DefaultBehavior;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the serving side, used in remote mode and as the
    /// fallback target for direct mode.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    #[serde(default)]
    pub cache: ClientCacheSettings,

    /// Shared Redis settings; only consulted when `direct_mode` is on or
    /// for the invalidation subscription.
    #[serde(default)]
    pub redis: RedisSettings,

    /// Read the distributed cache directly instead of calling the serving
    /// side. Requires access to the same Redis the service writes.
    #[serde(default)]
    pub direct_mode: bool,

    /// Per-flag default behavior, consulted before `global_default`.
    ///
    /// Defaults are local to this process; nothing keeps them in sync
    /// with the serving side's configuration.
    #[serde(default)]
    pub defaults: HashMap<String, DefaultBehavior>,

    #[serde(default)]
    pub global_default: DefaultBehavior,
}

fn default_service_url() -> String {
    "http://localhost:8090".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            cache: ClientCacheSettings::default(),
            redis: RedisSettings::default(),
            direct_mode: false,
            defaults: HashMap::new(),
            global_default: DefaultBehavior::default(),
        }
    }
}

impl ClientConfig {
    /// Default behavior for one flag: per-name override, then global.
    pub fn default_behavior(&self, feature_name: &str) -> DefaultBehavior {
        self.defaults
            .get(feature_name)
            .copied()
            .unwrap_or(self.global_default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCacheSettings {
    /// TTL for locally cached check results, in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    30
}

impl Default for ClientCacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}
