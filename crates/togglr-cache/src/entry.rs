//! TTL'd local-cache entry.

use std::time::{Duration, Instant};

use togglr_core::ToggleStatus;

/// A toggle status held in a per-process local cache.
///
/// The TTL is supplied at lookup time rather than stored here, so a config
/// change takes effect without repopulating the map.
#[derive(Debug, Clone, Copy)]
pub struct CachedToggle {
    pub status: ToggleStatus,
    pub cached_at: Instant,
}

impl CachedToggle {
    pub fn new(status: ToggleStatus) -> Self {
        Self {
            status,
            cached_at: Instant::now(),
        }
    }

    /// Check if this entry has outlived the given TTL.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}
