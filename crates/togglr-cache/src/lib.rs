//! Shared distributed-cache plumbing.
//!
//! Both the serving side's cache coordinator and the SDK client's direct
//! mode talk to the same Redis keys and listen on the same invalidation
//! channel. This crate owns that shared surface so the two sides can never
//! drift apart:
//!
//! - the key layout (`toggle:`/`allow:`/`deny:` prefixes, `status` field)
//! - TTL'd local-cache entries
//! - pool construction with graceful degradation
//! - typed Redis operations (status hash, membership sets, invalidation)
//! - the broadcast bus: publish + subscribe-with-reconnect
//!
//! Every operation here treats Redis trouble as a recoverable condition:
//! callers get an `Err` to log and fall through on, never a panic.

mod broadcast;
mod entry;
mod error;
mod keys;
mod ops;
mod redis_pool;

pub use broadcast::{FLUSH_ALL, InvalidationListener, publish_invalidation};
pub use entry::CachedToggle;
pub use error::{CacheError, CacheResult};
pub use keys::{STATUS_FIELD, allow_key, deny_key, list_key, toggle_key};
pub use ops::{
    add_list_members, delete_list_key, delete_toggle_keys, is_list_member, read_status,
    write_status,
};
pub use redis_pool::{RedisSettings, create_redis_pool};

pub use deadpool_redis::Pool;
