//! Shared storage-facing types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use togglr_core::ToggleStatus;

/// Result of applying a due scheduled transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedTransition {
    pub previous: ToggleStatus,
    pub current: ToggleStatus,
}

/// What happened to a toggle, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    AddToAllowList,
    RemoveFromAllowList,
    AddToDenyList,
    RemoveFromDenyList,
    Schedule,
    ScheduleApplied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::AddToAllowList => "ADD_TO_ALLOW_LIST",
            Self::RemoveFromAllowList => "REMOVE_FROM_ALLOW_LIST",
            Self::AddToDenyList => "ADD_TO_DENY_LIST",
            Self::RemoveFromDenyList => "REMOVE_FROM_DENY_LIST",
            Self::Schedule => "SCHEDULE",
            Self::ScheduleApplied => "SCHEDULE_APPLIED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "ADD_TO_ALLOW_LIST" => Ok(Self::AddToAllowList),
            "REMOVE_FROM_ALLOW_LIST" => Ok(Self::RemoveFromAllowList),
            "ADD_TO_DENY_LIST" => Ok(Self::AddToDenyList),
            "REMOVE_FROM_DENY_LIST" => Ok(Self::RemoveFromDenyList),
            "SCHEDULE" => Ok(Self::Schedule),
            "SCHEDULE_APPLIED" => Ok(Self::ScheduleApplied),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub feature_name: String,
    pub action: AuditAction,
    pub actor: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        feature_name: impl Into<String>,
        action: AuditAction,
        actor: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            feature_name: feature_name.into(),
            action,
            actor: actor.into(),
            details: Some(details.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Filter for audit-trail queries. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub feature_name: Option<String>,
    pub actor: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.feature_name
            .as_deref()
            .is_none_or(|name| record.feature_name == name)
            && self.actor.as_deref().is_none_or(|actor| record.actor == actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_action_roundtrips_through_wire_form() {
        for action in [
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Delete,
            AuditAction::AddToAllowList,
            AuditAction::RemoveFromAllowList,
            AuditAction::AddToDenyList,
            AuditAction::RemoveFromDenyList,
            AuditAction::Schedule,
            AuditAction::ScheduleApplied,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("AUDITED".parse::<AuditAction>().is_err());
    }

    #[test]
    fn filter_matches_on_name_and_actor() {
        let record = AuditRecord::new("BETA", AuditAction::Create, "ops", "created");

        assert!(AuditFilter::default().matches(&record));
        assert!(
            AuditFilter {
                feature_name: Some("BETA".into()),
                actor: None
            }
            .matches(&record)
        );
        assert!(
            !AuditFilter {
                feature_name: Some("OTHER".into()),
                actor: None
            }
            .matches(&record)
        );
        assert!(
            !AuditFilter {
                feature_name: Some("BETA".into()),
                actor: Some("someone-else".into())
            }
            .matches(&record)
        );
    }
}
