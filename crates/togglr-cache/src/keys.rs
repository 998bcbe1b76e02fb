//! Distributed-cache key layout.
//!
//! `toggle:<name>` is a hash whose `status` field carries the wire form of
//! the toggle status; `allow:<name>` and `deny:<name>` are sets of user
//! ids. All three get a TTL on write.

use togglr_core::ListType;

/// Hash field holding the status wire form.
pub const STATUS_FIELD: &str = "status";

pub fn toggle_key(feature_name: &str) -> String {
    format!("toggle:{feature_name}")
}

pub fn allow_key(feature_name: &str) -> String {
    format!("allow:{feature_name}")
}

pub fn deny_key(feature_name: &str) -> String {
    format!("deny:{feature_name}")
}

pub fn list_key(feature_name: &str, list_type: ListType) -> String {
    match list_type {
        ListType::Allow => allow_key(feature_name),
        ListType::Deny => deny_key(feature_name),
    }
}
