//! The PostgreSQL store handle.

use sqlx_postgres::PgPool;

use crate::config::PostgresConfig;
use crate::error::Result;
use crate::pool::create_pool;
use crate::schema::ensure_schema;

/// PostgreSQL implementation of `ToggleStore`, `UserListStore` and
/// `AuditStore`. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and bootstrap the schema.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, shared pools). Schema is assumed.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
