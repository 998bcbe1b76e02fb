//! The result handed back to anyone asking "is this feature on?".

use serde::{Deserialize, Serialize};

use crate::status::{CheckStatus, DefaultBehavior};

/// Reason attached to the terminal not-found outcome.
pub const REASON_NOT_FOUND: &str = "Feature not found";

/// Outcome of a feature check.
///
/// A check always resolves to one of these; infrastructure trouble is
/// absorbed by the tiers and surfaces only as a default-behavior result.
/// `status` is `None` exactly for the not-found outcome, which is terminal
/// and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub feature_name: String,
    pub enabled: bool,
    pub status: Option<CheckStatus>,
    pub reason: String,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default)]
    pub from_default: bool,
}

impl CheckResult {
    /// Build a plain evaluated result.
    pub fn new(
        feature_name: impl Into<String>,
        enabled: bool,
        status: CheckStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            feature_name: feature_name.into(),
            enabled,
            status: Some(status),
            reason: reason.into(),
            from_cache: false,
            from_default: false,
        }
    }

    /// Terminal outcome for a flag absent from the authority store.
    pub fn not_found(feature_name: impl Into<String>) -> Self {
        Self {
            feature_name: feature_name.into(),
            enabled: false,
            status: None,
            reason: REASON_NOT_FOUND.to_string(),
            from_cache: false,
            from_default: false,
        }
    }

    /// Fallback outcome produced by the default-behavior policy.
    pub fn default_behavior(
        feature_name: impl Into<String>,
        behavior: DefaultBehavior,
    ) -> Self {
        Self {
            feature_name: feature_name.into(),
            enabled: behavior.is_enabled(),
            status: Some(CheckStatus::Default),
            reason: format!("Using default behavior: {behavior}"),
            from_cache: false,
            from_default: true,
        }
    }

    /// Mark this result as served from a local cache.
    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}
