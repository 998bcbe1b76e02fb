//! Audit-trail queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use togglr_storage::{AuditAction, AuditFilter, AuditRecord, AuditStore, StorageError, StorageResult};

use crate::error::db_error;
use crate::store::PostgresStore;

type AuditRow = (String, String, Option<String>, Option<String>, DateTime<Utc>);

fn from_tuple(row: AuditRow) -> StorageResult<AuditRecord> {
    let action: AuditAction = row
        .1
        .parse()
        .map_err(|e| StorageError::database(format!("corrupt audit action: {e}")))?;
    Ok(AuditRecord {
        feature_name: row.0,
        action,
        actor: row.2.unwrap_or_default(),
        details: row.3,
        timestamp: row.4,
    })
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn append(&self, record: AuditRecord) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO audit_logs (feature_name, action, actor, details, ts)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.feature_name)
        .bind(record.action.as_str())
        .bind(&record.actor)
        .bind(&record.details)
        .bind(record.timestamp)
        .execute(self.pool())
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find(
        &self,
        filter: &AuditFilter,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<AuditRecord>> {
        let rows: Vec<AuditRow> = query_as(
            r#"
            SELECT feature_name, action, actor, details, ts
            FROM audit_logs
            WHERE ($1::text IS NULL OR feature_name = $1)
              AND ($2::text IS NULL OR actor = $2)
            ORDER BY ts DESC, id DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(&filter.feature_name)
        .bind(&filter.actor)
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?;

        rows.into_iter().map(from_tuple).collect()
    }
}
