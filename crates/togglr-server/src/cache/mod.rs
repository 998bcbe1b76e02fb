//! Tiered cache orchestration for the serving side.
//!
//! Read path: local DashMap (TTL) → Redis (TTL) → authority store, with
//! write-back on miss. Write path: every mutation evicts the local entry,
//! deletes the Redis keys and publishes the flag name on the invalidation
//! channel, so every other local cache — server or SDK — drops its copy.
//!
//! If Redis is unavailable or disabled the coordinator degrades to
//! local-cache-plus-store; a Redis error is never more than a cache miss.

mod coordinator;

pub use coordinator::CacheCoordinator;
