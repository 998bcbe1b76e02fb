//! Schema bootstrap.
//!
//! Idempotent DDL for the three tables. `feature_toggles.name` is the
//! primary key; membership rows are unique per
//! `(feature_name, user_id, list_type)` tuple.

use sqlx_core::query::query;
use sqlx_postgres::PgPool;
use tracing::info;

use crate::error::Result;

const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feature_toggles (
        name             TEXT PRIMARY KEY,
        status           TEXT NOT NULL,
        description      TEXT,
        group_name       TEXT NOT NULL DEFAULT 'default',
        scheduled_status TEXT,
        scheduled_at     TIMESTAMPTZ,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        CHECK ((scheduled_status IS NULL) = (scheduled_at IS NULL))
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_toggles_group
        ON feature_toggles (group_name)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_toggles_scheduled_at
        ON feature_toggles (scheduled_at)
        WHERE scheduled_at IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feature_toggle_users (
        feature_name TEXT NOT NULL,
        user_id      TEXT NOT NULL,
        list_type    TEXT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (feature_name, user_id, list_type)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_toggle_users_feature_list
        ON feature_toggle_users (feature_name, list_type)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id           BIGSERIAL PRIMARY KEY,
        feature_name TEXT NOT NULL,
        action       TEXT NOT NULL,
        actor        TEXT,
        details      TEXT,
        ts           TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_feature_name ON audit_logs (feature_name)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_logs (actor)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_ts ON audit_logs (ts)
    "#,
];

/// Create tables and indexes when missing. Safe to run on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in DDL {
        query(statement).execute(pool).await?;
    }
    info!("Schema ensured");
    Ok(())
}
