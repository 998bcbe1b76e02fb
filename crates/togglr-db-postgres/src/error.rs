use thiserror::Error;
use togglr_storage::StorageError;

/// Errors raised while setting up the PostgreSQL backend.
///
/// Runtime query failures surface as `StorageError::Database` through the
/// store traits; this type covers pool creation and schema bootstrap.
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx_core::Error),

    #[error("Schema error: {0}")]
    Schema(String),
}

impl PostgresError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        StorageError::database(err.to_string())
    }
}

/// Convenience result type for backend setup
pub type Result<T> = std::result::Result<T, PostgresError>;

/// Map a runtime sqlx failure into the storage error taxonomy.
pub(crate) fn db_error(err: sqlx_core::Error) -> StorageError {
    StorageError::database(err.to_string())
}
