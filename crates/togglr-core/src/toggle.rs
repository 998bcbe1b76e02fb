//! The authoritative feature-toggle record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::status::ToggleStatus;

/// Group assigned to toggles created without an explicit one.
pub const DEFAULT_GROUP: &str = "default";

/// Longest accepted feature name.
pub const MAX_NAME_LEN: usize = 255;

/// A feature toggle as stored in the authority store.
///
/// `name` is the identity: unique and immutable once created. The
/// `scheduled_status`/`scheduled_at` pair is always set or cleared together;
/// a half-set schedule is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureToggle {
    pub name: String,
    pub status: ToggleStatus,
    pub description: Option<String>,
    pub group_name: String,
    pub scheduled_status: Option<ToggleStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureToggle {
    /// Create a new toggle in the default group with fresh timestamps.
    pub fn new(name: impl Into<String>, status: ToggleStatus) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            status,
            description: None,
            group_name: DEFAULT_GROUP.to_string(),
            scheduled_status: None,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self
    }

    /// Whether a transition is pending.
    pub fn has_schedule(&self) -> bool {
        self.scheduled_status.is_some() && self.scheduled_at.is_some()
    }

    /// Set the scheduled transition pair.
    pub fn schedule(&mut self, status: ToggleStatus, at: DateTime<Utc>) {
        self.scheduled_status = Some(status);
        self.scheduled_at = Some(at);
        self.updated_at = Utc::now();
    }

    /// Clear any pending transition.
    pub fn clear_schedule(&mut self) {
        self.scheduled_status = None;
        self.scheduled_at = None;
        self.updated_at = Utc::now();
    }

    /// Apply a due transition: status takes the scheduled value, the
    /// schedule fields are cleared in the same step. Returns the previous
    /// status, or `None` when nothing was pending.
    pub fn apply_scheduled(&mut self) -> Option<ToggleStatus> {
        let next = self.scheduled_status.take()?;
        self.scheduled_at = None;
        let previous = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Some(previous)
    }
}

/// Validate a caller-supplied feature name.
///
/// Names key every cache tier and the broadcast payload, so the accepted
/// alphabet stays narrow: alphanumerics plus `-`, `_` and `.`.
pub fn validate_feature_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::invalid_feature_name("name must not be blank"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::invalid_feature_name(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CoreError::invalid_feature_name(format!(
            "name contains unsupported characters: {name}"
        )));
    }
    Ok(())
}
