//! Allow/Deny membership queries.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use togglr_core::ListType;
use togglr_storage::{StorageResult, UserListStore};

use crate::error::db_error;
use crate::store::PostgresStore;

#[async_trait]
impl UserListStore for PostgresStore {
    async fn contains(
        &self,
        feature_name: &str,
        user_id: &str,
        list_type: ListType,
    ) -> StorageResult<bool> {
        let row: (bool,) = query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM feature_toggle_users
                WHERE feature_name = $1 AND user_id = $2 AND list_type = $3
            )
            "#,
        )
        .bind(feature_name)
        .bind(user_id)
        .bind(list_type.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(db_error)?;

        Ok(row.0)
    }

    async fn add_users(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) -> StorageResult<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = query(
            r#"
            INSERT INTO feature_toggle_users (feature_name, user_id, list_type)
            SELECT $1, unnest($2::text[]), $3
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(feature_name)
        .bind(user_ids)
        .bind(list_type.as_str())
        .execute(self.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn remove_users(
        &self,
        feature_name: &str,
        user_ids: &[String],
        list_type: ListType,
    ) -> StorageResult<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = query(
            r#"
            DELETE FROM feature_toggle_users
            WHERE feature_name = $1 AND user_id = ANY($2) AND list_type = $3
            "#,
        )
        .bind(feature_name)
        .bind(user_ids)
        .bind(list_type.as_str())
        .execute(self.pool())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn list_users(
        &self,
        feature_name: &str,
        list_type: ListType,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<String>> {
        let rows: Vec<(String,)> = query_as(
            r#"
            SELECT user_id FROM feature_toggle_users
            WHERE feature_name = $1 AND list_type = $2
            ORDER BY user_id
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(feature_name)
        .bind(list_type.as_str())
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(|(user,)| user).collect())
    }

    async fn count(&self, feature_name: &str, list_type: ListType) -> StorageResult<u64> {
        let row: (i64,) = query_as(
            "SELECT COUNT(*) FROM feature_toggle_users WHERE feature_name = $1 AND list_type = $2",
        )
        .bind(feature_name)
        .bind(list_type.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(db_error)?;

        Ok(row.0 as u64)
    }

    async fn delete_for_feature(&self, feature_name: &str) -> StorageResult<usize> {
        let result = query("DELETE FROM feature_toggle_users WHERE feature_name = $1")
            .bind(feature_name)
            .execute(self.pool())
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() as usize)
    }
}
