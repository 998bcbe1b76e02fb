use thiserror::Error;

/// Errors from distributed-cache operations.
///
/// Always recoverable from the caller's point of view: the read path
/// treats any of these as a miss and falls through to the next tier.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis subscribe error: {0}")]
    Subscribe(String),

    #[error("Redis publish error: {0}")]
    Publish(String),

    #[error("Cache decode error: {0}")]
    Decode(String),

    #[error("Redis pub/sub stream ended")]
    StreamEnded,
}

impl CacheError {
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool(message.into())
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Convenience result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;
