//! Authority-store traits.
//!
//! All backends must implement these. Implementations are thread-safe and
//! may be called concurrently from many request handlers; none of the
//! methods take external locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use togglr_core::{FeatureToggle, ListType};

use crate::error::StorageResult;
use crate::types::{AppliedTransition, AuditFilter, AuditRecord};

/// Durable store for feature-toggle records.
///
/// `name` is the identity everywhere; surrogate keys are a backend detail.
#[async_trait]
pub trait ToggleStore: Send + Sync {
    /// Look a toggle up by name. Returns `None` when absent; an `Err` means
    /// the backend itself failed.
    async fn find_by_name(&self, name: &str) -> StorageResult<Option<FeatureToggle>>;

    async fn find_all(&self) -> StorageResult<Vec<FeatureToggle>>;

    async fn find_by_group(&self, group_name: &str) -> StorageResult<Vec<FeatureToggle>>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` when the name is taken.
    async fn insert(&self, toggle: &FeatureToggle) -> StorageResult<()>;

    /// Replace an existing record (matched by name).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when the record does not exist.
    async fn update(&self, toggle: &FeatureToggle) -> StorageResult<()>;

    /// Remove a record by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` when the record does not exist.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// All toggles whose scheduled transition is due at `now`.
    async fn find_due_transitions(&self, now: DateTime<Utc>)
    -> StorageResult<Vec<FeatureToggle>>;

    /// Apply a due transition atomically: set `status := scheduled_status`
    /// and clear both schedule fields in one step. Returns `None` when no
    /// transition was due anymore — another instance may have applied it
    /// first, which makes uncoordinated schedulers harmless.
    async fn apply_transition(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<AppliedTransition>>;
}

/// Durable store for per-flag Allow/Deny memberships.
///
/// At most one row exists per `(feature, user, list_type)` tuple; adds are
/// idempotent.
#[async_trait]
pub trait UserListStore: Send + Sync {
    async fn contains(
        &self,
        feature_name: &str,
        user_id: &str,
        list_type: ListType,
    ) -> StorageResult<bool>;

    /// Add users in bulk. Returns how many were newly added.
    async fn add_users(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) -> StorageResult<usize>;

    /// Remove users in bulk. Returns how many were actually removed.
    async fn remove_users(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) -> StorageResult<usize>;

    async fn list_users(
        &self,
        feature_name: &str,
        list_type: ListType,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<String>>;

    async fn count(&self, feature_name: &str, list_type: ListType) -> StorageResult<u64>;

    /// Drop every membership row of a feature (used when the toggle is
    /// deleted). Returns how many rows went away.
    async fn delete_for_feature(&self, feature_name: &str) -> StorageResult<usize>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: AuditRecord) -> StorageResult<()>;

    /// Newest-first page of the trail.
    async fn find(
        &self,
        filter: &AuditFilter,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<AuditRecord>>;
}
