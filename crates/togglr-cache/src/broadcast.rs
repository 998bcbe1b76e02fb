//! Invalidation broadcast over Redis pub/sub.
//!
//! A mutation on any instance publishes the flag name on a single channel;
//! every subscribed process evicts that entry from its local cache. The
//! payload `"*"` flushes everything. Delivery is at-least-once and
//! unordered; eviction is idempotent, so duplicates are harmless.

use std::time::Duration;

use deadpool_redis::Pool;
use futures_util::StreamExt;
use redis::AsyncCommands;

use crate::error::{CacheError, CacheResult};

/// Sentinel payload that evicts every local entry.
pub const FLUSH_ALL: &str = "*";

/// Publish an invalidation message to all subscribed processes.
pub async fn publish_invalidation(pool: &Pool, channel: &str, message: &str) -> CacheResult<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::Pool(e.to_string()))?;

    conn.publish::<_, _, ()>(channel, message)
        .await
        .map_err(|e| CacheError::Publish(e.to_string()))?;

    tracing::debug!(channel = %channel, message = %message, "Published cache invalidation");
    Ok(())
}

/// Subscription side of the broadcast bus.
///
/// `spawn` registers a plain closure against the channel and keeps the
/// subscription alive across connection failures with exponential backoff
/// (1 s up to 5 min). A dedicated client is used because pooled
/// connections cannot enter subscriber mode.
pub struct InvalidationListener {
    pub redis_url: String,
    pub channel: String,
}

impl InvalidationListener {
    pub fn new(redis_url: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            channel: channel.into(),
        }
    }

    /// Start listening in a background task, calling `handler` with every
    /// delivered payload.
    pub fn spawn<F>(self, handler: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            const MAX_BACKOFF: Duration = Duration::from_secs(300);

            loop {
                match self.run(&handler).await {
                    Ok(()) => {
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Invalidation listener error, reconnecting"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        })
    }

    async fn run<F>(&self, handler: &F) -> CacheResult<()>
    where
        F: Fn(&str) + Send + Sync,
    {
        let client = redis::Client::open(self.redis_url.as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| CacheError::Subscribe(e.to_string()))?;

        tracing::info!(channel = %self.channel, "Subscribed to invalidation channel");

        let mut stream = pubsub.on_message();
        loop {
            match stream.next().await {
                Some(msg) => match msg.get_payload::<String>() {
                    Ok(payload) => {
                        tracing::debug!(payload = %payload, "Received cache invalidation");
                        handler(&payload);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to parse invalidation payload");
                    }
                },
                None => return Err(CacheError::StreamEnded),
            }
        }
    }
}
