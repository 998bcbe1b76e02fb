use thiserror::Error;

/// Core error types for toggle domain operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown toggle status: {0}")]
    UnknownStatus(String),

    #[error("Unknown list type: {0}")]
    UnknownListType(String),

    #[error("Invalid feature name: {0}")]
    InvalidFeatureName(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new UnknownStatus error
    pub fn unknown_status(value: impl Into<String>) -> Self {
        Self::UnknownStatus(value.into())
    }

    /// Create a new UnknownListType error
    pub fn unknown_list_type(value: impl Into<String>) -> Self {
        Self::UnknownListType(value.into())
    }

    /// Create a new InvalidFeatureName error
    pub fn invalid_feature_name(message: impl Into<String>) -> Self {
        Self::InvalidFeatureName(message.into())
    }

    /// Create a new InvalidSchedule error
    pub fn invalid_schedule(message: impl Into<String>) -> Self {
        Self::InvalidSchedule(message.into())
    }

    /// Check if this error was caused by bad caller input rather than a
    /// defect in this process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownStatus(_)
                | Self::UnknownListType(_)
                | Self::InvalidFeatureName(_)
                | Self::InvalidSchedule(_)
        )
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
