//! Status and list-type enums with their wire representations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Authoritative status of a feature toggle.
///
/// The wire form (`ENABLED`, `DISABLED`, `LIST_MODE`) is what lands in the
/// distributed cache's `status` hash field and in API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToggleStatus {
    Enabled,
    Disabled,
    ListMode,
}

impl ToggleStatus {
    /// Wire representation, shared with the distributed cache layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::ListMode => "LIST_MODE",
        }
    }
}

impl FromStr for ToggleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENABLED" => Ok(Self::Enabled),
            "DISABLED" => Ok(Self::Disabled),
            "LIST_MODE" => Ok(Self::ListMode),
            other => Err(CoreError::unknown_status(other)),
        }
    }
}

impl fmt::Display for ToggleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which per-user list a membership row belongs to.
///
/// Deny always overrides Allow at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListType {
    Allow,
    Deny,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl FromStr for ListType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(Self::Allow),
            "DENY" => Ok(Self::Deny),
            other => Err(CoreError::unknown_list_type(other)),
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status a caller observes in a [`crate::CheckResult`].
///
/// `Default` never appears on an authoritative record; it marks results
/// produced by the default-behavior policy when no tier could answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Enabled,
    Disabled,
    ListMode,
    Default,
}

impl From<ToggleStatus> for CheckStatus {
    fn from(status: ToggleStatus) -> Self {
        match status {
            ToggleStatus::Enabled => Self::Enabled,
            ToggleStatus::Disabled => Self::Disabled,
            ToggleStatus::ListMode => Self::ListMode,
        }
    }
}

/// Fallback answer used when neither the cache tiers nor the authority
/// store can be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultBehavior {
    Enabled,
    #[default]
    Disabled,
}

impl DefaultBehavior {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for DefaultBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
