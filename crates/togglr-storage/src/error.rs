use thiserror::Error;

/// Errors produced by authority-store backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Feature toggle not found: {name}")]
    NotFound { name: String },

    #[error("Feature toggle already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a new AlreadyExists error
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = StorageError::not_found("PAYMENTS");
        assert_eq!(err.to_string(), "Feature toggle not found: PAYMENTS");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_already_exists() {
        let err = StorageError::already_exists("PAYMENTS");
        assert_eq!(err.to_string(), "Feature toggle already exists: PAYMENTS");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_database() {
        let err = StorageError::database("connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_not_found());
    }
}
