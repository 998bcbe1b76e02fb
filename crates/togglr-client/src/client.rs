//! The toggle client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use togglr_cache::{
    FLUSH_ALL, InvalidationListener, Pool, create_redis_pool, is_list_member, read_status,
};
use togglr_core::{CheckResult, CheckStatus, ListType, ToggleStatus, evaluate};

use crate::config::ClientConfig;
use crate::error::{FeatureDisabledError, FetchError};

/// A check result held in the client's local cache, keyed by
/// `feature` or `feature:user`.
#[derive(Debug, Clone)]
struct CachedCheck {
    enabled: bool,
    status: Option<CheckStatus>,
    reason: String,
    cached_at: Instant,
}

impl CachedCheck {
    fn from_result(result: &CheckResult) -> Self {
        Self {
            enabled: result.enabled,
            status: result.status,
            reason: result.reason.clone(),
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }

    fn to_result(&self, feature_name: &str) -> CheckResult {
        CheckResult {
            feature_name: feature_name.to_string(),
            enabled: self.enabled,
            status: self.status,
            reason: self.reason.clone(),
            from_cache: true,
            from_default: false,
        }
    }
}

/// Per-process feature-toggle client.
///
/// Construct one instance per process and share it (`Arc`); the local
/// cache is safe for concurrent use from any number of tasks.
pub struct ToggleClient {
    config: ClientConfig,
    http: Option<reqwest::Client>,
    redis: Option<Pool>,
    direct_mode: bool,
    local: DashMap<String, CachedCheck>,
}

impl ToggleClient {
    /// Build a client from configuration.
    ///
    /// Direct mode needs a reachable Redis; when the pool cannot be
    /// created the client silently runs in remote mode, and with no
    /// service URL either, every check resolves to the default behavior.
    pub async fn new(config: ClientConfig) -> Self {
        let redis = if config.direct_mode || config.redis.enabled {
            create_redis_pool(&config.redis).await
        } else {
            None
        };
        let direct_mode = config.direct_mode && redis.is_some();

        let http = if config.service_url.trim().is_empty() {
            None
        } else {
            Some(reqwest::Client::new())
        };

        if direct_mode {
            tracing::info!("Toggle client running in direct Redis mode");
        } else if http.is_some() {
            tracing::info!(url = %config.service_url, "Toggle client running in remote mode");
        } else {
            tracing::warn!("Toggle client has no remote endpoint or Redis, defaults only");
        }

        Self {
            config,
            http,
            redis,
            direct_mode,
            local: DashMap::new(),
        }
    }

    /// Convenience wrapper over [`check`](Self::check).
    pub async fn is_enabled(&self, feature_name: &str, user_id: Option<&str>) -> bool {
        self.check(feature_name, user_id).await.enabled
    }

    /// Evaluate a feature, raising on a disabled outcome.
    ///
    /// This is the only loud surface, and it is loud solely for the
    /// business reason: infrastructure failure lands in the default
    /// behavior like everywhere else.
    pub async fn require_enabled(
        &self,
        feature_name: &str,
        user_id: Option<&str>,
    ) -> Result<(), FeatureDisabledError> {
        let result = self.check(feature_name, user_id).await;
        if result.enabled {
            Ok(())
        } else {
            Err(FeatureDisabledError::new(feature_name, result.reason))
        }
    }

    /// Evaluate a feature for a caller. Never fails.
    pub async fn check(&self, feature_name: &str, user_id: Option<&str>) -> CheckResult {
        let user = user_id.map(str::trim).filter(|u| !u.is_empty());
        let key = Self::cache_key(feature_name, user);

        if let Some(entry) = self.local.get(&key) {
            if !entry.is_expired(Duration::from_secs(self.config.cache.ttl_seconds)) {
                return entry.to_result(feature_name);
            }
            drop(entry);
            self.local.remove(&key);
        }

        match self.fetch(feature_name, user).await {
            Ok(result) => {
                self.local.insert(key, CachedCheck::from_result(&result));
                result
            }
            Err(e) => {
                tracing::warn!(
                    feature = %feature_name,
                    error = %e,
                    "Feature check failed, using default behavior"
                );
                self.default_result(feature_name)
            }
        }
    }

    /// Drop one flag's entries (including every user-qualified key).
    pub fn evict(&self, feature_name: &str) {
        let prefix = format!("{feature_name}:");
        self.local
            .retain(|key, _| key != feature_name && !key.starts_with(&prefix));
        tracing::debug!(feature = %feature_name, "Evicted from client cache");
    }

    /// Drop everything.
    pub fn evict_all(&self) {
        self.local.clear();
        tracing::debug!("Evicted all client cache entries");
    }

    /// React to one broadcast payload. Idempotent.
    pub fn handle_invalidation(&self, payload: &str) {
        if payload == FLUSH_ALL {
            self.evict_all();
        } else {
            self.evict(payload);
        }
    }

    /// Subscribe the local cache to the invalidation channel. Returns
    /// `None` when Redis is disabled in the configuration.
    pub fn subscribe_invalidations(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.redis.enabled {
            return None;
        }
        let client = Arc::clone(self);
        let listener =
            InvalidationListener::new(&self.config.redis.url, &self.config.redis.channel);
        Some(listener.spawn(move |payload| client.handle_invalidation(payload)))
    }

    /// Number of live local entries.
    pub fn cached_entries(&self) -> usize {
        self.local.len()
    }

    async fn fetch(
        &self,
        feature_name: &str,
        user: Option<&str>,
    ) -> Result<CheckResult, FetchError> {
        if self.direct_mode {
            match self.fetch_from_redis(feature_name, user).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    // Single-call fallback; the next check tries Redis again.
                    tracing::warn!(
                        feature = %feature_name,
                        error = %e,
                        "Direct Redis read failed, falling back to remote"
                    );
                    if self.http.is_none() {
                        return Err(e.into());
                    }
                }
            }
        }
        self.fetch_from_service(feature_name, user).await
    }

    /// Read the distributed cache directly, replicating the serving
    /// side's evaluation with the shared key layout.
    async fn fetch_from_redis(
        &self,
        feature_name: &str,
        user: Option<&str>,
    ) -> Result<CheckResult, togglr_cache::CacheError> {
        let Some(pool) = self.redis.as_ref() else {
            return Err(togglr_cache::CacheError::pool("direct mode without a Redis pool"));
        };

        let Some(status) = read_status(pool, feature_name).await? else {
            tracing::debug!(feature = %feature_name, "Feature not in Redis, using default");
            return Ok(self.default_result(feature_name));
        };

        let (is_allowed, is_denied) = match (status, user) {
            (ToggleStatus::ListMode, Some(user)) => {
                // Deny first; it wins outright.
                if is_list_member(pool, feature_name, ListType::Deny, user).await? {
                    (false, true)
                } else {
                    (
                        is_list_member(pool, feature_name, ListType::Allow, user).await?,
                        false,
                    )
                }
            }
            _ => (false, false),
        };

        Ok(evaluate(feature_name, status, user, is_allowed, is_denied))
    }

    async fn fetch_from_service(
        &self,
        feature_name: &str,
        user: Option<&str>,
    ) -> Result<CheckResult, FetchError> {
        let http = self.http.as_ref().ok_or(FetchError::NoRemote)?;

        let url = format!(
            "{}/api/v1/toggles/{feature_name}/check",
            self.config.service_url.trim_end_matches('/')
        );
        let mut request = http.get(&url);
        if let Some(user) = user {
            request = request.query(&[("userId", user)]);
        }

        let mut result = request
            .send()
            .await?
            .error_for_status()?
            .json::<CheckResult>()
            .await?;
        result.from_cache = false;
        result.from_default = false;
        Ok(result)
    }

    fn default_result(&self, feature_name: &str) -> CheckResult {
        CheckResult::default_behavior(feature_name, self.config.default_behavior(feature_name))
    }

    fn cache_key(feature_name: &str, user: Option<&str>) -> String {
        match user {
            Some(user) => format!("{feature_name}:{user}"),
            None => feature_name.to_string(),
        }
    }
}
