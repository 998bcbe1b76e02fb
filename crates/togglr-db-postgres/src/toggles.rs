//! Toggle-record queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use togglr_core::{FeatureToggle, ToggleStatus};
use togglr_storage::{AppliedTransition, StorageError, StorageResult, ToggleStore};

use crate::error::db_error;
use crate::store::PostgresStore;

type ToggleRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const TOGGLE_COLUMNS: &str =
    "name, status, description, group_name, scheduled_status, scheduled_at, created_at, updated_at";

fn from_tuple(row: ToggleRow) -> StorageResult<FeatureToggle> {
    let status: ToggleStatus = row.1.parse().map_err(|e| {
        StorageError::database(format!("corrupt status for {}: {e}", row.0))
    })?;
    let scheduled_status = row
        .4
        .map(|s| {
            s.parse::<ToggleStatus>().map_err(|e| {
                StorageError::database(format!("corrupt scheduled status for {}: {e}", row.0))
            })
        })
        .transpose()?;

    Ok(FeatureToggle {
        name: row.0,
        status,
        description: row.2,
        group_name: row.3,
        scheduled_status,
        scheduled_at: row.5,
        created_at: row.6,
        updated_at: row.7,
    })
}

#[async_trait]
impl ToggleStore for PostgresStore {
    async fn find_by_name(&self, name: &str) -> StorageResult<Option<FeatureToggle>> {
        let row: Option<ToggleRow> = query_as(&format!(
            "SELECT {TOGGLE_COLUMNS} FROM feature_toggles WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error)?;

        row.map(from_tuple).transpose()
    }

    async fn find_all(&self) -> StorageResult<Vec<FeatureToggle>> {
        let rows: Vec<ToggleRow> = query_as(&format!(
            "SELECT {TOGGLE_COLUMNS} FROM feature_toggles ORDER BY name"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?;

        rows.into_iter().map(from_tuple).collect()
    }

    async fn find_by_group(&self, group_name: &str) -> StorageResult<Vec<FeatureToggle>> {
        let rows: Vec<ToggleRow> = query_as(&format!(
            "SELECT {TOGGLE_COLUMNS} FROM feature_toggles WHERE group_name = $1 ORDER BY name"
        ))
        .bind(group_name)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?;

        rows.into_iter().map(from_tuple).collect()
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let row: (bool,) =
            query_as("SELECT EXISTS (SELECT 1 FROM feature_toggles WHERE name = $1)")
                .bind(name)
                .fetch_one(self.pool())
                .await
                .map_err(db_error)?;
        Ok(row.0)
    }

    async fn insert(&self, toggle: &FeatureToggle) -> StorageResult<()> {
        let result = query(
            r#"
            INSERT INTO feature_toggles
                (name, status, description, group_name, scheduled_status, scheduled_at,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&toggle.name)
        .bind(toggle.status.as_str())
        .bind(&toggle.description)
        .bind(&toggle.group_name)
        .bind(toggle.scheduled_status.map(|s| s.as_str()))
        .bind(toggle.scheduled_at)
        .bind(toggle.created_at)
        .bind(toggle.updated_at)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
            {
                Err(StorageError::already_exists(&toggle.name))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn update(&self, toggle: &FeatureToggle) -> StorageResult<()> {
        let result = query(
            r#"
            UPDATE feature_toggles
            SET status = $2,
                description = $3,
                group_name = $4,
                scheduled_status = $5,
                scheduled_at = $6,
                updated_at = $7
            WHERE name = $1
            "#,
        )
        .bind(&toggle.name)
        .bind(toggle.status.as_str())
        .bind(&toggle.description)
        .bind(&toggle.group_name)
        .bind(toggle.scheduled_status.map(|s| s.as_str()))
        .bind(toggle.scheduled_at)
        .bind(toggle.updated_at)
        .execute(self.pool())
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(&toggle.name));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let result = query("DELETE FROM feature_toggles WHERE name = $1")
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(name));
        }
        Ok(())
    }

    async fn find_due_transitions(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<FeatureToggle>> {
        let rows: Vec<ToggleRow> = query_as(&format!(
            "SELECT {TOGGLE_COLUMNS} FROM feature_toggles \
             WHERE scheduled_at IS NOT NULL AND scheduled_at <= $1 ORDER BY scheduled_at"
        ))
        .bind(now)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?;

        rows.into_iter().map(from_tuple).collect()
    }

    async fn apply_transition(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<AppliedTransition>> {
        // Single guarded UPDATE: the due check is re-evaluated inside the
        // statement, so a transition another instance already applied (or
        // cancelled) matches zero rows instead of firing twice.
        let row: Option<(String, String)> = query_as(
            r#"
            UPDATE feature_toggles AS t
            SET status = t.scheduled_status,
                scheduled_status = NULL,
                scheduled_at = NULL,
                updated_at = $2
            FROM (
                SELECT name, status AS previous_status
                FROM feature_toggles
                WHERE name = $1
                FOR UPDATE
            ) AS prev
            WHERE t.name = prev.name
              AND t.scheduled_status IS NOT NULL
              AND t.scheduled_at IS NOT NULL
              AND t.scheduled_at <= $2
            RETURNING prev.previous_status, t.status
            "#,
        )
        .bind(name)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error)?;

        let Some((previous, current)) = row else {
            return Ok(None);
        };
        let previous: ToggleStatus = previous
            .parse()
            .map_err(|e| StorageError::database(format!("corrupt status for {name}: {e}")))?;
        let current: ToggleStatus = current
            .parse()
            .map_err(|e| StorageError::database(format!("corrupt status for {name}: {e}")))?;

        Ok(Some(AppliedTransition { previous, current }))
    }
}
