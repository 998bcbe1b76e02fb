//! In-memory authority store.
//!
//! Backs unit tests and single-process deployments that run without
//! PostgreSQL. Concurrency safety comes from the concurrent map; the
//! scheduled-transition application happens under the entry lock, so
//! readers never see a half-applied transition here either.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use togglr_core::{FeatureToggle, ListType};

use crate::error::{StorageError, StorageResult};
use crate::traits::{AuditStore, ToggleStore, UserListStore};
use crate::types::{AppliedTransition, AuditFilter, AuditRecord};

type ListKey = (String, ListType);

/// DashMap-backed implementation of all three store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    toggles: DashMap<String, FeatureToggle>,
    lists: DashMap<ListKey, BTreeSet<String>>,
    audit: Mutex<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_key(feature_name: &str, list_type: ListType) -> ListKey {
        (feature_name.to_string(), list_type)
    }
}

#[async_trait]
impl ToggleStore for MemoryStore {
    async fn find_by_name(&self, name: &str) -> StorageResult<Option<FeatureToggle>> {
        Ok(self.toggles.get(name).map(|entry| entry.value().clone()))
    }

    async fn find_all(&self) -> StorageResult<Vec<FeatureToggle>> {
        let mut all: Vec<_> = self.toggles.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find_by_group(&self, group_name: &str) -> StorageResult<Vec<FeatureToggle>> {
        let mut matched: Vec<_> = self
            .toggles
            .iter()
            .filter(|e| e.group_name == group_name)
            .map(|e| e.value().clone())
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.toggles.contains_key(name))
    }

    async fn insert(&self, toggle: &FeatureToggle) -> StorageResult<()> {
        match self.toggles.entry(toggle.name.clone()) {
            Entry::Occupied(_) => Err(StorageError::already_exists(&toggle.name)),
            Entry::Vacant(slot) => {
                slot.insert(toggle.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, toggle: &FeatureToggle) -> StorageResult<()> {
        match self.toggles.get_mut(&toggle.name) {
            Some(mut entry) => {
                *entry = toggle.clone();
                Ok(())
            }
            None => Err(StorageError::not_found(&toggle.name)),
        }
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        self.toggles
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(name))
    }

    async fn find_due_transitions(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<FeatureToggle>> {
        Ok(self
            .toggles
            .iter()
            .filter(|e| e.scheduled_at.is_some_and(|at| at <= now))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn apply_transition(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<AppliedTransition>> {
        let Some(mut entry) = self.toggles.get_mut(name) else {
            return Ok(None);
        };
        if !entry.scheduled_at.is_some_and(|at| at <= now) {
            return Ok(None);
        }
        let previous = entry
            .apply_scheduled()
            .expect("due toggle always has a scheduled status");
        Ok(Some(AppliedTransition {
            previous,
            current: entry.status,
        }))
    }
}

#[async_trait]
impl UserListStore for MemoryStore {
    async fn contains(
        &self,
        feature_name: &str,
        user_id: &str,
        list_type: ListType,
    ) -> StorageResult<bool> {
        Ok(self
            .lists
            .get(&Self::list_key(feature_name, list_type))
            .is_some_and(|set| set.contains(user_id)))
    }

    async fn add_users(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) -> StorageResult<usize> {
        let mut set = self
            .lists
            .entry(Self::list_key(feature_name, list_type))
            .or_default();
        Ok(user_ids
            .iter()
            .filter(|user| set.insert((*user).clone()))
            .count())
    }

    async fn remove_users(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) -> StorageResult<usize> {
        let Some(mut set) = self.lists.get_mut(&Self::list_key(feature_name, list_type))
        else {
            return Ok(0);
        };
        Ok(user_ids.iter().filter(|user| set.remove(*user)).count())
    }

    async fn list_users(
        &self,
        feature_name: &str,
        list_type: ListType,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<String>> {
        Ok(self
            .lists
            .get(&Self::list_key(feature_name, list_type))
            .map(|set| {
                set.iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, feature_name: &str, list_type: ListType) -> StorageResult<u64> {
        Ok(self
            .lists
            .get(&Self::list_key(feature_name, list_type))
            .map(|set| set.len() as u64)
            .unwrap_or(0))
    }

    async fn delete_for_feature(&self, feature_name: &str) -> StorageResult<usize> {
        let mut removed = 0;
        for list_type in [ListType::Allow, ListType::Deny] {
            if let Some((_, set)) = self.lists.remove(&Self::list_key(feature_name, list_type))
            {
                removed += set.len();
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, record: AuditRecord) -> StorageResult<()> {
        self.audit
            .lock()
            .map_err(|_| StorageError::database("audit lock poisoned"))?
            .push(record);
        Ok(())
    }

    async fn find(
        &self,
        filter: &AuditFilter,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<AuditRecord>> {
        let records = self
            .audit
            .lock()
            .map_err(|_| StorageError::database("audit lock poisoned"))?;
        Ok(records
            .iter()
            .rev()
            .filter(|record| filter.matches(record))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuditAction;
    use chrono::Duration;
    use togglr_core::ToggleStatus;

    #[tokio::test]
    async fn insert_rejects_duplicate_names() {
        let store = MemoryStore::new();
        let toggle = FeatureToggle::new("PAYMENTS", ToggleStatus::Enabled);

        store.insert(&toggle).await.unwrap();
        let err = store.insert(&toggle).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_and_delete_require_an_existing_record() {
        let store = MemoryStore::new();
        let toggle = FeatureToggle::new("PAYMENTS", ToggleStatus::Enabled);

        assert!(store.update(&toggle).await.unwrap_err().is_not_found());
        assert!(store.delete("PAYMENTS").await.unwrap_err().is_not_found());

        store.insert(&toggle).await.unwrap();
        let mut changed = toggle.clone();
        changed.status = ToggleStatus::Disabled;
        store.update(&changed).await.unwrap();

        let found = store.find_by_name("PAYMENTS").await.unwrap().unwrap();
        assert_eq!(found.status, ToggleStatus::Disabled);

        store.delete("PAYMENTS").await.unwrap();
        assert!(store.find_by_name("PAYMENTS").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_group_filters_and_sorts() {
        let store = MemoryStore::new();
        for (name, group) in [("B", "exp"), ("A", "exp"), ("C", "default")] {
            store
                .insert(&FeatureToggle::new(name, ToggleStatus::Enabled).with_group(group))
                .await
                .unwrap();
        }
        let exp = store.find_by_group("exp").await.unwrap();
        assert_eq!(
            exp.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            ["A", "B"]
        );
    }

    #[tokio::test]
    async fn add_users_is_idempotent_per_tuple() {
        let store = MemoryStore::new();
        let users = vec!["alice".to_string(), "bob".to_string()];

        assert_eq!(
            store.add_users("BETA", &users, ListType::Allow).await.unwrap(),
            2
        );
        assert_eq!(
            store.add_users("BETA", &users, ListType::Allow).await.unwrap(),
            0
        );
        // Same user in the other list is a distinct tuple.
        assert_eq!(
            store.add_users("BETA", &users, ListType::Deny).await.unwrap(),
            2
        );
        assert_eq!(store.count("BETA", ListType::Allow).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn contains_and_remove() {
        let store = MemoryStore::new();
        store
            .add_users("BETA", &["alice".to_string()], ListType::Deny)
            .await
            .unwrap();

        assert!(store.contains("BETA", "alice", ListType::Deny).await.unwrap());
        assert!(!store.contains("BETA", "alice", ListType::Allow).await.unwrap());

        let removed = store
            .remove_users(
                "BETA",
                &["alice".to_string(), "ghost".to_string()],
                ListType::Deny,
            )
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.contains("BETA", "alice", ListType::Deny).await.unwrap());
    }

    #[tokio::test]
    async fn list_users_pages_in_order() {
        let store = MemoryStore::new();
        let users: Vec<String> = ["u1", "u2", "u3", "u4"].iter().map(|s| s.to_string()).collect();
        store.add_users("BETA", &users, ListType::Allow).await.unwrap();

        let page = store.list_users("BETA", ListType::Allow, 1, 2).await.unwrap();
        assert_eq!(page, ["u2", "u3"]);
    }

    #[tokio::test]
    async fn delete_for_feature_drops_both_lists() {
        let store = MemoryStore::new();
        store
            .add_users("BETA", &["a".to_string()], ListType::Allow)
            .await
            .unwrap();
        store
            .add_users("BETA", &["b".to_string(), "c".to_string()], ListType::Deny)
            .await
            .unwrap();

        assert_eq!(store.delete_for_feature("BETA").await.unwrap(), 3);
        assert_eq!(store.count("BETA", ListType::Allow).await.unwrap(), 0);
        assert_eq!(store.count("BETA", ListType::Deny).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn due_transitions_and_atomic_application() {
        let store = MemoryStore::new();
        let mut due = FeatureToggle::new("DUE", ToggleStatus::Disabled);
        due.schedule(ToggleStatus::Enabled, Utc::now() - Duration::minutes(5));
        let mut future = FeatureToggle::new("LATER", ToggleStatus::Disabled);
        future.schedule(ToggleStatus::Enabled, Utc::now() + Duration::hours(1));
        store.insert(&due).await.unwrap();
        store.insert(&future).await.unwrap();

        let found = store.find_due_transitions(Utc::now()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "DUE");

        let applied = store.apply_transition("DUE", Utc::now()).await.unwrap().unwrap();
        assert_eq!(applied.previous, ToggleStatus::Disabled);
        assert_eq!(applied.current, ToggleStatus::Enabled);

        let stored = store.find_by_name("DUE").await.unwrap().unwrap();
        assert_eq!(stored.status, ToggleStatus::Enabled);
        assert!(!stored.has_schedule());

        // Applying again (another runner instance) is a harmless no-op.
        assert!(store.apply_transition("DUE", Utc::now()).await.unwrap().is_none());
        // Not yet due and unknown names are no-ops too.
        assert!(store.apply_transition("LATER", Utc::now()).await.unwrap().is_none());
        assert!(store.apply_transition("GHOST", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_trail_is_newest_first_and_filtered() {
        let store = MemoryStore::new();
        for (name, actor) in [("A", "ops"), ("B", "ops"), ("A", "bot")] {
            store
                .append(AuditRecord::new(name, AuditAction::Update, actor, "changed"))
                .await
                .unwrap();
        }

        let all = store.find(&AuditFilter::default(), 0, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].actor, "bot");

        let filter = AuditFilter {
            feature_name: Some("A".into()),
            actor: Some("ops".into()),
        };
        let filtered = store.find(&filter, 0, 10).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].feature_name, "A");
    }
}
