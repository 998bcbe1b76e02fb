//! The cache coordinator: tier order, write-back and invalidation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use deadpool_redis::Pool;
use togglr_cache::{
    CachedToggle, FLUSH_ALL, InvalidationListener, RedisSettings, add_list_members,
    delete_list_key, delete_toggle_keys, publish_invalidation, read_status, write_status,
};
use togglr_core::{CheckResult, ListType, ToggleStatus, evaluate};
use togglr_storage::{ToggleStore, UserListStore};

use crate::metrics;

/// Orchestrates the three storage tiers for feature checks and keeps them
/// coherent across mutations.
///
/// The local map is the only mutable state owned here; it is safe for
/// concurrent use from any number of request handlers. Constructed once
/// per process and shared via `Arc`.
pub struct CacheCoordinator {
    local: DashMap<String, CachedToggle>,
    redis: Option<Pool>,
    redis_url: String,
    channel: String,
    local_ttl: Duration,
    redis_ttl_seconds: u64,
    toggles: Arc<dyn ToggleStore>,
    lists: Arc<dyn UserListStore>,
}

impl CacheCoordinator {
    pub fn new(
        settings: &RedisSettings,
        local_ttl: Duration,
        redis: Option<Pool>,
        toggles: Arc<dyn ToggleStore>,
        lists: Arc<dyn UserListStore>,
    ) -> Self {
        if redis.is_none() {
            tracing::info!("Distributed cache unavailable, serving from local cache and store");
        }
        Self {
            local: DashMap::new(),
            redis,
            redis_url: settings.url.clone(),
            channel: settings.channel.clone(),
            local_ttl,
            redis_ttl_seconds: settings.ttl_seconds,
            toggles,
            lists,
        }
    }

    /// Evaluate a feature for a caller.
    ///
    /// Never returns an error: infrastructure trouble in a cache tier is
    /// absorbed as a miss, and an unreachable or silent authority store
    /// surfaces as the terminal not-found result.
    pub async fn check(&self, feature_name: &str, user_id: Option<&str>) -> CheckResult {
        let started = Instant::now();

        let Some(status) = self.load_status(feature_name).await else {
            metrics::record_check(feature_name, false);
            metrics::record_check_duration(started.elapsed());
            return CheckResult::not_found(feature_name);
        };

        let user = user_id.map(str::trim).filter(|u| !u.is_empty());
        let (is_allowed, is_denied) = match (status, user) {
            (ToggleStatus::ListMode, Some(user)) => self.list_memberships(feature_name, user).await,
            _ => (false, false),
        };

        let result = evaluate(feature_name, status, user, is_allowed, is_denied);
        metrics::record_check(feature_name, result.enabled);
        metrics::record_check_duration(started.elapsed());
        result
    }

    /// Walk the tiers for a status: local → Redis → store, populating the
    /// upper tiers on the way back. `None` means the flag does not exist
    /// (or the store could not say otherwise).
    async fn load_status(&self, feature_name: &str) -> Option<ToggleStatus> {
        if let Some(entry) = self.local.get(feature_name) {
            if !entry.is_expired(self.local_ttl) {
                tracing::debug!(feature = %feature_name, "cache hit (local)");
                metrics::record_cache_hit("local");
                return Some(entry.status);
            }
            drop(entry);
            self.local.remove(feature_name);
        }

        if let Some(pool) = &self.redis {
            match read_status(pool, feature_name).await {
                Ok(Some(status)) => {
                    tracing::debug!(feature = %feature_name, "cache hit (redis)");
                    metrics::record_cache_hit("redis");
                    self.local
                        .insert(feature_name.to_string(), CachedToggle::new(status));
                    return Some(status);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(feature = %feature_name, error = %e, "Redis read failed, falling through");
                }
            }
        }

        metrics::record_cache_miss();
        let toggle = match self.toggles.find_by_name(feature_name).await {
            Ok(found) => found?,
            Err(e) => {
                tracing::warn!(feature = %feature_name, error = %e, "Authority store read failed");
                return None;
            }
        };

        if let Some(pool) = &self.redis {
            // Write-back is fire-and-forget; a failed write only means the
            // next reader falls through to the store again.
            let pool = pool.clone();
            let name = toggle.name.clone();
            let status = toggle.status;
            let ttl = self.redis_ttl_seconds;
            tokio::spawn(async move {
                if let Err(e) = write_status(&pool, &name, status, ttl).await {
                    tracing::warn!(feature = %name, error = %e, "Redis write-back failed");
                }
            });
        }

        self.local
            .insert(feature_name.to_string(), CachedToggle::new(toggle.status));
        Some(toggle.status)
    }

    /// Deny membership first; a positive Redis answer is trusted, anything
    /// else falls back to the store.
    async fn list_memberships(&self, feature_name: &str, user_id: &str) -> (bool, bool) {
        if self.is_member(feature_name, user_id, ListType::Deny).await {
            return (false, true);
        }
        let allowed = self.is_member(feature_name, user_id, ListType::Allow).await;
        (allowed, false)
    }

    async fn is_member(&self, feature_name: &str, user_id: &str, list_type: ListType) -> bool {
        if let Some(pool) = &self.redis {
            match togglr_cache::is_list_member(pool, feature_name, list_type, user_id).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(feature = %feature_name, error = %e, "Redis membership check failed");
                }
            }
        }
        match self
            .lists
            .contains(feature_name, user_id, list_type)
            .await
        {
            Ok(member) => member,
            Err(e) => {
                tracing::warn!(feature = %feature_name, error = %e, "Store membership check failed");
                false
            }
        }
    }

    /// Drop a flag from every tier and tell all other processes to do the
    /// same. Each step is attempted even when an earlier one fails;
    /// partial invalidation beats none.
    pub async fn invalidate(&self, feature_name: &str) {
        self.evict_local(feature_name);

        if let Some(pool) = &self.redis {
            if let Err(e) = delete_toggle_keys(pool, feature_name).await {
                tracing::warn!(feature = %feature_name, error = %e, "Redis eviction failed");
            }
            if let Err(e) = publish_invalidation(pool, &self.channel, feature_name).await {
                tracing::warn!(feature = %feature_name, error = %e, "Invalidation publish failed");
            }
        }
    }

    /// Drop one materialized list set and broadcast the flag name.
    pub async fn invalidate_user_list(&self, feature_name: &str, list_type: ListType) {
        if let Some(pool) = &self.redis {
            if let Err(e) = delete_list_key(pool, feature_name, list_type).await {
                tracing::warn!(feature = %feature_name, error = %e, "Redis list eviction failed");
            }
            if let Err(e) = publish_invalidation(pool, &self.channel, feature_name).await {
                tracing::warn!(feature = %feature_name, error = %e, "Invalidation publish failed");
            }
        }
    }

    /// Materialize freshly written memberships so the next checks hit the
    /// set instead of the store.
    pub async fn warm_user_list(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) {
        if let Some(pool) = &self.redis {
            if let Err(e) =
                add_list_members(pool, feature_name, list_type, user_ids, self.redis_ttl_seconds)
                    .await
            {
                tracing::warn!(feature = %feature_name, error = %e, "Redis list warm failed");
            }
        }
    }

    pub fn evict_local(&self, feature_name: &str) {
        self.local.remove(feature_name);
        tracing::debug!(feature = %feature_name, "Evicted from local cache");
    }

    pub fn evict_all_local(&self) {
        self.local.clear();
        tracing::info!("Cleared local cache");
    }

    /// React to one broadcast payload. Idempotent by construction.
    pub fn handle_invalidation(&self, payload: &str) {
        if payload == FLUSH_ALL {
            self.evict_all_local();
        } else {
            self.evict_local(payload);
        }
    }

    /// Subscribe this coordinator's local cache to the invalidation
    /// channel. No-op without Redis.
    pub fn subscribe(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        self.redis.as_ref()?;
        let coordinator = Arc::clone(self);
        let listener = InvalidationListener::new(&self.redis_url, &self.channel);
        Some(listener.spawn(move |payload| coordinator.handle_invalidation(payload)))
    }

    /// Number of live local entries (for health/stats endpoints).
    pub fn local_entries(&self) -> usize {
        self.local.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use togglr_core::{CheckStatus, FeatureToggle};
    use togglr_storage::{MemoryStore, StorageError, StorageResult};

    /// Counts authority-store reads and can be switched into failure mode.
    struct InstrumentedStore {
        inner: MemoryStore,
        reads: AtomicUsize,
        failing: AtomicBool,
    }

    impl InstrumentedStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                reads: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl ToggleStore for InstrumentedStore {
        async fn find_by_name(
            &self,
            name: &str,
        ) -> StorageResult<Option<FeatureToggle>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::database("connection refused"));
            }
            self.inner.find_by_name(name).await
        }

        async fn find_all(&self) -> StorageResult<Vec<FeatureToggle>> {
            self.inner.find_all().await
        }

        async fn find_by_group(&self, group: &str) -> StorageResult<Vec<FeatureToggle>> {
            self.inner.find_by_group(group).await
        }

        async fn exists(&self, name: &str) -> StorageResult<bool> {
            self.inner.exists(name).await
        }

        async fn insert(&self, toggle: &FeatureToggle) -> StorageResult<()> {
            self.inner.insert(toggle).await
        }

        async fn update(&self, toggle: &FeatureToggle) -> StorageResult<()> {
            self.inner.update(toggle).await
        }

        async fn delete(&self, name: &str) -> StorageResult<()> {
            self.inner.delete(name).await
        }

        async fn find_due_transitions(
            &self,
            now: chrono::DateTime<chrono::Utc>,
        ) -> StorageResult<Vec<FeatureToggle>> {
            self.inner.find_due_transitions(now).await
        }

        async fn apply_transition(
            &self,
            name: &str,
            now: chrono::DateTime<chrono::Utc>,
        ) -> StorageResult<Option<togglr_storage::AppliedTransition>> {
            self.inner.apply_transition(name, now).await
        }
    }

    fn coordinator_over(
        store: Arc<InstrumentedStore>,
        lists: Arc<MemoryStore>,
        local_ttl: Duration,
    ) -> CacheCoordinator {
        let settings = RedisSettings {
            enabled: false,
            ..RedisSettings::default()
        };
        CacheCoordinator::new(&settings, local_ttl, None, store, lists)
    }

    async fn seed(store: &InstrumentedStore, toggle: FeatureToggle) {
        store.inner.insert(&toggle).await.unwrap();
    }

    #[tokio::test]
    async fn second_check_within_ttl_skips_the_store() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        seed(&store, FeatureToggle::new("PAYMENTS", ToggleStatus::Enabled)).await;
        let coordinator =
            coordinator_over(Arc::clone(&store), lists, Duration::from_secs(30));

        let first = coordinator.check("PAYMENTS", None).await;
        assert!(first.enabled);
        assert_eq!(first.reason, "Feature is enabled globally");
        assert_eq!(store.reads(), 1);

        let second = coordinator.check("PAYMENTS", None).await;
        assert_eq!(second, first);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn expired_local_entry_reconsults_the_next_tier() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        seed(&store, FeatureToggle::new("PAYMENTS", ToggleStatus::Enabled)).await;
        let coordinator = coordinator_over(Arc::clone(&store), lists, Duration::ZERO);

        coordinator.check("PAYMENTS", None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        coordinator.check("PAYMENTS", None).await;
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn unknown_flag_is_terminal_and_never_cached() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        let coordinator =
            coordinator_over(Arc::clone(&store), lists, Duration::from_secs(30));

        let result = coordinator.check("GHOST", None).await;
        assert!(!result.enabled);
        assert_eq!(result.status, None);
        assert_eq!(result.reason, "Feature not found");

        coordinator.check("GHOST", None).await;
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn store_read_failure_surfaces_as_not_found() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        store.fail();
        let coordinator =
            coordinator_over(Arc::clone(&store), lists, Duration::from_secs(30));

        let result = coordinator.check("PAYMENTS", Some("alice")).await;
        assert!(!result.enabled);
        assert_eq!(result.reason, "Feature not found");
    }

    #[tokio::test]
    async fn list_mode_consults_memberships() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        seed(&store, FeatureToggle::new("BETA", ToggleStatus::ListMode)).await;
        lists
            .add_users("BETA", &["alice".to_string()], ListType::Allow)
            .await
            .unwrap();
        let coordinator =
            coordinator_over(Arc::clone(&store), Arc::clone(&lists), Duration::from_secs(30));

        let alice = coordinator.check("BETA", Some("alice")).await;
        assert!(alice.enabled);
        assert_eq!(alice.reason, "User is whitelisted");

        let bob = coordinator.check("BETA", Some("bob")).await;
        assert!(!bob.enabled);
        assert_eq!(bob.reason, "User not in whitelist");

        let nobody = coordinator.check("BETA", None).await;
        assert!(!nobody.enabled);
        assert_eq!(nobody.reason, "User ID required for list mode");
        assert_eq!(nobody.status, Some(CheckStatus::ListMode));
    }

    #[tokio::test]
    async fn deny_wins_even_when_also_allowed() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        seed(&store, FeatureToggle::new("BETA", ToggleStatus::ListMode)).await;
        lists
            .add_users("BETA", &["alice".to_string()], ListType::Allow)
            .await
            .unwrap();
        lists
            .add_users("BETA", &["alice".to_string()], ListType::Deny)
            .await
            .unwrap();
        let coordinator =
            coordinator_over(Arc::clone(&store), Arc::clone(&lists), Duration::from_secs(30));

        let result = coordinator.check("BETA", Some("alice")).await;
        assert!(!result.enabled);
        assert_eq!(result.reason, "User is blacklisted");
    }

    #[tokio::test]
    async fn invalidation_is_idempotent() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        seed(&store, FeatureToggle::new("PAYMENTS", ToggleStatus::Enabled)).await;
        let coordinator =
            coordinator_over(Arc::clone(&store), lists, Duration::from_secs(30));

        coordinator.check("PAYMENTS", None).await;
        assert_eq!(coordinator.local_entries(), 1);

        coordinator.invalidate("PAYMENTS").await;
        coordinator.invalidate("PAYMENTS").await;
        assert_eq!(coordinator.local_entries(), 0);

        coordinator.check("PAYMENTS", None).await;
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn flush_all_payload_clears_every_entry() {
        let store = Arc::new(InstrumentedStore::new());
        let lists = Arc::new(MemoryStore::new());
        seed(&store, FeatureToggle::new("A", ToggleStatus::Enabled)).await;
        seed(&store, FeatureToggle::new("B", ToggleStatus::Disabled)).await;
        let coordinator =
            coordinator_over(Arc::clone(&store), lists, Duration::from_secs(30));

        coordinator.check("A", None).await;
        coordinator.check("B", None).await;
        assert_eq!(coordinator.local_entries(), 2);

        coordinator.handle_invalidation("A");
        assert_eq!(coordinator.local_entries(), 1);

        coordinator.handle_invalidation(FLUSH_ALL);
        assert_eq!(coordinator.local_entries(), 0);

        coordinator.check("A", None).await;
        assert_eq!(store.reads(), 3);
    }
}
