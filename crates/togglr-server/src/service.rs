//! Toggle mutation and query service.
//!
//! Every mutation goes authority store first, then cache invalidation,
//! then the audit observer. The invalidation is what reconciles the
//! tiers; there is no transaction spanning store and cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use togglr_core::{
    CheckResult, CoreError, FeatureToggle, ListType, ToggleStatus, validate_feature_name,
};
use togglr_storage::{
    AuditAction, AuditFilter, AuditRecord, AuditStore, StorageError, ToggleStore, UserListStore,
};

use crate::audit::AuditLogger;
use crate::cache::CacheCoordinator;

/// Errors surfaced to the API layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateToggleRequest {
    pub feature_name: String,
    pub status: ToggleStatus,
    pub description: Option<String>,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateToggleRequest {
    pub status: ToggleStatus,
    pub description: Option<String>,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub scheduled_status: ToggleStatus,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListRequest {
    pub user_ids: Vec<String>,
}

/// A toggle as presented over the API, with list sizes attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleView {
    #[serde(flatten)]
    pub toggle: FeatureToggle,
    pub allow_count: u64,
    pub deny_count: u64,
}

/// One page of list members.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListPage {
    pub users: Vec<String>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

pub struct ToggleService {
    toggles: Arc<dyn ToggleStore>,
    lists: Arc<dyn UserListStore>,
    audit_store: Arc<dyn AuditStore>,
    coordinator: Arc<CacheCoordinator>,
    audit: AuditLogger,
}

impl ToggleService {
    pub fn new(
        toggles: Arc<dyn ToggleStore>,
        lists: Arc<dyn UserListStore>,
        audit_store: Arc<dyn AuditStore>,
        coordinator: Arc<CacheCoordinator>,
    ) -> Self {
        let audit = AuditLogger::new(Arc::clone(&audit_store));
        Self {
            toggles,
            lists,
            audit_store,
            coordinator,
            audit,
        }
    }

    pub async fn check(&self, feature_name: &str, user_id: Option<&str>) -> CheckResult {
        self.coordinator.check(feature_name, user_id).await
    }

    pub async fn get(&self, feature_name: &str) -> ServiceResult<ToggleView> {
        let toggle = self.find_required(feature_name).await?;
        self.to_view(toggle).await
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<ToggleView>> {
        let mut views = Vec::new();
        for toggle in self.toggles.find_all().await? {
            views.push(self.to_view(toggle).await?);
        }
        Ok(views)
    }

    pub async fn get_by_group(&self, group_name: &str) -> ServiceResult<Vec<ToggleView>> {
        let mut views = Vec::new();
        for toggle in self.toggles.find_by_group(group_name).await? {
            views.push(self.to_view(toggle).await?);
        }
        Ok(views)
    }

    pub async fn create(
        &self,
        request: CreateToggleRequest,
        actor: &str,
    ) -> ServiceResult<ToggleView> {
        validate_feature_name(&request.feature_name)?;

        let mut toggle = FeatureToggle::new(&request.feature_name, request.status);
        toggle.description = request.description;
        if let Some(group) = request.group_name {
            toggle.group_name = group;
        }

        self.toggles.insert(&toggle).await?;
        tracing::info!(feature = %toggle.name, status = %toggle.status, "Created feature toggle");

        self.coordinator.invalidate(&toggle.name).await;
        self.audit.log(
            &toggle.name,
            AuditAction::Create,
            actor,
            format!("Created with status: {}", toggle.status),
        );
        self.to_view(toggle).await
    }

    pub async fn update(
        &self,
        feature_name: &str,
        request: UpdateToggleRequest,
        actor: &str,
    ) -> ServiceResult<ToggleView> {
        let mut toggle = self.find_required(feature_name).await?;
        let old_status = toggle.status;

        toggle.status = request.status;
        if let Some(description) = request.description {
            toggle.description = Some(description);
        }
        if let Some(group) = request.group_name {
            toggle.group_name = group;
        }
        toggle.updated_at = Utc::now();

        self.toggles.update(&toggle).await?;
        tracing::info!(feature = %feature_name, status = %request.status, "Updated feature toggle");

        self.coordinator.invalidate(feature_name).await;
        self.audit.log(
            feature_name,
            AuditAction::Update,
            actor,
            format!("Status changed from {old_status} to {}", request.status),
        );
        self.to_view(toggle).await
    }

    pub async fn delete(&self, feature_name: &str, actor: &str) -> ServiceResult<()> {
        self.find_required(feature_name).await?;

        self.lists.delete_for_feature(feature_name).await?;
        self.toggles.delete(feature_name).await?;
        tracing::info!(feature = %feature_name, "Deleted feature toggle");

        self.coordinator.invalidate(feature_name).await;
        self.audit
            .log(feature_name, AuditAction::Delete, actor, "Toggle deleted");
        Ok(())
    }

    pub async fn schedule(
        &self,
        feature_name: &str,
        request: ScheduleRequest,
        actor: &str,
    ) -> ServiceResult<ToggleView> {
        let mut toggle = self.find_required(feature_name).await?;
        toggle.schedule(request.scheduled_status, request.scheduled_at);
        self.toggles.update(&toggle).await?;

        tracing::info!(
            feature = %feature_name,
            status = %request.scheduled_status,
            at = %request.scheduled_at,
            "Scheduled toggle change"
        );
        self.audit.log(
            feature_name,
            AuditAction::Schedule,
            actor,
            format!(
                "Scheduled to change to {} at {}",
                request.scheduled_status, request.scheduled_at
            ),
        );
        self.to_view(toggle).await
    }

    pub async fn cancel_schedule(
        &self,
        feature_name: &str,
        actor: &str,
    ) -> ServiceResult<ToggleView> {
        let mut toggle = self.find_required(feature_name).await?;
        toggle.clear_schedule();
        self.toggles.update(&toggle).await?;

        tracing::info!(feature = %feature_name, "Cancelled scheduled toggle change");
        self.audit.log(
            feature_name,
            AuditAction::Schedule,
            actor,
            "Cancelled scheduled change",
        );
        self.to_view(toggle).await
    }

    pub async fn add_users(
        &self,
        feature_name: &str,
        request: UserListRequest,
        list_type: ListType,
        actor: &str,
    ) -> ServiceResult<usize> {
        self.find_required(feature_name).await?;

        let added = self
            .lists
            .add_users(feature_name, &request.user_ids, list_type)
            .await?;
        if added > 0 {
            tracing::info!(feature = %feature_name, list = %list_type, added, "Added users to list");
            let action = match list_type {
                ListType::Allow => AuditAction::AddToAllowList,
                ListType::Deny => AuditAction::AddToDenyList,
            };
            self.audit
                .log(feature_name, action, actor, format!("Added {added} users"));
        }

        self.coordinator
            .invalidate_user_list(feature_name, list_type)
            .await;
        self.coordinator
            .warm_user_list(feature_name, &request.user_ids, list_type)
            .await;
        Ok(added)
    }

    pub async fn remove_users(
        &self,
        feature_name: &str,
        request: UserListRequest,
        list_type: ListType,
        actor: &str,
    ) -> ServiceResult<usize> {
        self.find_required(feature_name).await?;

        let removed = self
            .lists
            .remove_users(feature_name, &request.user_ids, list_type)
            .await?;
        tracing::info!(feature = %feature_name, list = %list_type, removed, "Removed users from list");
        if removed > 0 {
            let action = match list_type {
                ListType::Allow => AuditAction::RemoveFromAllowList,
                ListType::Deny => AuditAction::RemoveFromDenyList,
            };
            self.audit.log(
                feature_name,
                action,
                actor,
                format!("Removed {removed} users"),
            );
        }

        self.coordinator
            .invalidate_user_list(feature_name, list_type)
            .await;
        Ok(removed)
    }

    pub async fn list_users(
        &self,
        feature_name: &str,
        list_type: ListType,
        offset: u64,
        limit: u64,
    ) -> ServiceResult<UserListPage> {
        self.find_required(feature_name).await?;

        let users = self
            .lists
            .list_users(feature_name, list_type, offset, limit)
            .await?;
        let total = self.lists.count(feature_name, list_type).await?;
        Ok(UserListPage {
            users,
            total,
            offset,
            limit,
        })
    }

    pub async fn audit_logs(
        &self,
        filter: AuditFilter,
        offset: u64,
        limit: u64,
    ) -> ServiceResult<Vec<AuditRecord>> {
        Ok(self.audit_store.find(&filter, offset, limit).await?)
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }

    async fn find_required(&self, feature_name: &str) -> ServiceResult<FeatureToggle> {
        self.toggles
            .find_by_name(feature_name)
            .await?
            .ok_or_else(|| StorageError::not_found(feature_name).into())
    }

    async fn to_view(&self, toggle: FeatureToggle) -> ServiceResult<ToggleView> {
        let allow_count = self.lists.count(&toggle.name, ListType::Allow).await?;
        let deny_count = self.lists.count(&toggle.name, ListType::Deny).await?;
        Ok(ToggleView {
            toggle,
            allow_count,
            deny_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use togglr_cache::RedisSettings;
    use togglr_storage::MemoryStore;

    fn service() -> (ToggleService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let toggles: Arc<dyn ToggleStore> = store.clone();
        let lists: Arc<dyn UserListStore> = store.clone();
        let audit: Arc<dyn AuditStore> = store.clone();
        let settings = RedisSettings {
            enabled: false,
            ..RedisSettings::default()
        };
        let coordinator = Arc::new(CacheCoordinator::new(
            &settings,
            Duration::from_secs(30),
            None,
            Arc::clone(&toggles),
            Arc::clone(&lists),
        ));
        (
            ToggleService::new(toggles, lists, audit, coordinator),
            store,
        )
    }

    fn create_request(name: &str, status: ToggleStatus) -> CreateToggleRequest {
        CreateToggleRequest {
            feature_name: name.to_string(),
            status,
            description: None,
            group_name: None,
        }
    }

    async fn drain_audit() {
        // Audit appends are spawned off the critical path.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn create_then_check_round_trips() {
        let (service, _) = service();
        let view = service
            .create(create_request("PAYMENTS", ToggleStatus::Enabled), "ops")
            .await
            .unwrap();
        assert_eq!(view.toggle.group_name, "default");

        let result = service.check("PAYMENTS", None).await;
        assert!(result.enabled);
        assert_eq!(result.reason, "Feature is enabled globally");
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_bad_names() {
        let (service, _) = service();
        service
            .create(create_request("PAYMENTS", ToggleStatus::Enabled), "ops")
            .await
            .unwrap();

        let err = service
            .create(create_request("PAYMENTS", ToggleStatus::Disabled), "ops")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StorageError::AlreadyExists { .. })
        ));

        let err = service
            .create(create_request("no spaces allowed", ToggleStatus::Enabled), "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[tokio::test]
    async fn update_invalidates_the_cached_status() {
        let (service, _) = service();
        service
            .create(create_request("PAYMENTS", ToggleStatus::Enabled), "ops")
            .await
            .unwrap();
        assert!(service.check("PAYMENTS", None).await.enabled);

        service
            .update(
                "PAYMENTS",
                UpdateToggleRequest {
                    status: ToggleStatus::Disabled,
                    description: None,
                    group_name: None,
                },
                "ops",
            )
            .await
            .unwrap();

        // The local cache was evicted, so the new status is visible at once.
        let result = service.check("PAYMENTS", None).await;
        assert!(!result.enabled);
        assert_eq!(result.reason, "Feature is disabled globally");
    }

    #[tokio::test]
    async fn delete_removes_toggle_and_memberships() {
        let (service, store) = service();
        service
            .create(create_request("BETA", ToggleStatus::ListMode), "ops")
            .await
            .unwrap();
        service
            .add_users(
                "BETA",
                UserListRequest {
                    user_ids: vec!["alice".to_string()],
                },
                ListType::Allow,
                "ops",
            )
            .await
            .unwrap();

        service.delete("BETA", "ops").await.unwrap();
        assert!(store.find_by_name("BETA").await.unwrap().is_none());
        assert_eq!(store.count("BETA", ListType::Allow).await.unwrap(), 0);

        let result = service.check("BETA", Some("alice")).await;
        assert_eq!(result.reason, "Feature not found");
    }

    #[tokio::test]
    async fn list_mode_scenario_with_precedence() {
        let (service, _) = service();
        service
            .create(create_request("BETA", ToggleStatus::ListMode), "ops")
            .await
            .unwrap();
        service
            .add_users(
                "BETA",
                UserListRequest {
                    user_ids: vec!["alice".to_string()],
                },
                ListType::Allow,
                "ops",
            )
            .await
            .unwrap();

        assert!(service.check("BETA", Some("alice")).await.enabled);
        assert!(!service.check("BETA", Some("bob")).await.enabled);

        service
            .add_users(
                "BETA",
                UserListRequest {
                    user_ids: vec!["alice".to_string()],
                },
                ListType::Deny,
                "ops",
            )
            .await
            .unwrap();

        let result = service.check("BETA", Some("alice")).await;
        assert!(!result.enabled);
        assert_eq!(result.reason, "User is blacklisted");
    }

    #[tokio::test]
    async fn schedule_and_cancel_keep_the_pair_together() {
        let (service, store) = service();
        service
            .create(create_request("BETA", ToggleStatus::Disabled), "ops")
            .await
            .unwrap();

        let at = Utc::now() + chrono::Duration::hours(1);
        let view = service
            .schedule(
                "BETA",
                ScheduleRequest {
                    scheduled_status: ToggleStatus::Enabled,
                    scheduled_at: at,
                },
                "ops",
            )
            .await
            .unwrap();
        assert!(view.toggle.has_schedule());

        service.cancel_schedule("BETA", "ops").await.unwrap();
        let stored = store.find_by_name("BETA").await.unwrap().unwrap();
        assert!(stored.scheduled_status.is_none());
        assert!(stored.scheduled_at.is_none());
    }

    #[tokio::test]
    async fn mutations_leave_an_audit_trail() {
        let (service, store) = service();
        service
            .create(create_request("BETA", ToggleStatus::Enabled), "ops")
            .await
            .unwrap();
        service
            .update(
                "BETA",
                UpdateToggleRequest {
                    status: ToggleStatus::Disabled,
                    description: None,
                    group_name: None,
                },
                "release-bot",
            )
            .await
            .unwrap();
        drain_audit().await;

        let trail = store.find(&AuditFilter::default(), 0, 10).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, AuditAction::Update);
        assert_eq!(trail[0].actor, "release-bot");
        assert!(
            trail[0]
                .details
                .as_deref()
                .unwrap()
                .contains("ENABLED to DISABLED")
        );
        assert_eq!(trail[1].action, AuditAction::Create);
    }

    #[tokio::test]
    async fn list_users_pages_with_totals() {
        let (service, _) = service();
        service
            .create(create_request("BETA", ToggleStatus::ListMode), "ops")
            .await
            .unwrap();
        service
            .add_users(
                "BETA",
                UserListRequest {
                    user_ids: (1..=5).map(|i| format!("user{i}")).collect(),
                },
                ListType::Deny,
                "ops",
            )
            .await
            .unwrap();

        let page = service
            .list_users("BETA", ListType::Deny, 2, 2)
            .await
            .unwrap();
        assert_eq!(page.users, ["user3", "user4"]);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn operations_on_unknown_toggles_are_not_found() {
        let (service, _) = service();
        for err in [
            service.get("GHOST").await.unwrap_err(),
            service.delete("GHOST", "ops").await.unwrap_err(),
            service
                .list_users("GHOST", ListType::Allow, 0, 10)
                .await
                .unwrap_err(),
        ] {
            assert!(matches!(
                err,
                ServiceError::Storage(StorageError::NotFound { .. })
            ));
        }
    }
}
