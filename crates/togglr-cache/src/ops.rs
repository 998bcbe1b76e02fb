//! Typed Redis operations over the shared key layout.

use deadpool_redis::Pool;
use redis::AsyncCommands;
use togglr_core::{ListType, ToggleStatus};

use crate::error::{CacheError, CacheResult};
use crate::keys::{STATUS_FIELD, list_key, toggle_key};

/// Read a toggle's status from the distributed hash.
///
/// `Ok(None)` is an ordinary miss (key absent or expired); `Err` means the
/// command itself failed and the caller should fall through to the next
/// tier.
pub async fn read_status(pool: &Pool, feature_name: &str) -> CacheResult<Option<ToggleStatus>> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::pool(e.to_string()))?;

    let raw: Option<String> = conn
        .hget(toggle_key(feature_name), STATUS_FIELD)
        .await
        .map_err(|e| CacheError::command(e.to_string()))?;

    match raw {
        Some(value) => value
            .parse::<ToggleStatus>()
            .map(Some)
            .map_err(|e| CacheError::decode(e.to_string())),
        None => Ok(None),
    }
}

/// Write a toggle's status into the distributed hash with a TTL.
pub async fn write_status(
    pool: &Pool,
    feature_name: &str,
    status: ToggleStatus,
    ttl_seconds: u64,
) -> CacheResult<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::pool(e.to_string()))?;

    let key = toggle_key(feature_name);
    conn.hset::<_, _, _, ()>(&key, STATUS_FIELD, status.as_str())
        .await
        .map_err(|e| CacheError::command(e.to_string()))?;
    conn.expire::<_, ()>(&key, ttl_seconds as i64)
        .await
        .map_err(|e| CacheError::command(e.to_string()))?;
    Ok(())
}

/// Membership test against one of the per-flag sets.
pub async fn is_list_member(
    pool: &Pool,
    feature_name: &str,
    list_type: ListType,
    user_id: &str,
) -> CacheResult<bool> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::pool(e.to_string()))?;

    conn.sismember(list_key(feature_name, list_type), user_id)
        .await
        .map_err(|e| CacheError::command(e.to_string()))
}

/// Materialize (or extend) one of the per-flag sets, refreshing its TTL.
pub async fn add_list_members(
    pool: &Pool,
    feature_name: &str,
    list_type: ListType,
    user_ids: &[String],
    ttl_seconds: u64,
) -> CacheResult<()> {
    if user_ids.is_empty() {
        return Ok(());
    }

    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::pool(e.to_string()))?;

    let key = list_key(feature_name, list_type);
    conn.sadd::<_, _, ()>(&key, user_ids)
        .await
        .map_err(|e| CacheError::command(e.to_string()))?;
    conn.expire::<_, ()>(&key, ttl_seconds as i64)
        .await
        .map_err(|e| CacheError::command(e.to_string()))?;
    Ok(())
}

/// Delete the status hash and both list sets of a flag.
pub async fn delete_toggle_keys(pool: &Pool, feature_name: &str) -> CacheResult<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::pool(e.to_string()))?;

    conn.del::<_, ()>(&[
        toggle_key(feature_name),
        list_key(feature_name, ListType::Allow),
        list_key(feature_name, ListType::Deny),
    ])
    .await
    .map_err(|e| CacheError::command(e.to_string()))
}

/// Delete a single per-flag list set.
pub async fn delete_list_key(
    pool: &Pool,
    feature_name: &str,
    list_type: ListType,
) -> CacheResult<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::pool(e.to_string()))?;

    conn.del::<_, ()>(list_key(feature_name, list_type))
        .await
        .map_err(|e| CacheError::command(e.to_string()))
}
