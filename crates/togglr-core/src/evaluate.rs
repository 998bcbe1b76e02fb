//! The pure evaluation engine.

use crate::check::CheckResult;
use crate::status::{CheckStatus, ToggleStatus};

/// Decide whether a feature is enabled for a caller.
///
/// Pure and total: no I/O, deterministic for all inputs. The list
/// memberships are supplied by the caller (the cache coordinator or the
/// SDK's direct mode), which only needs to look them up when the status is
/// [`ToggleStatus::ListMode`].
///
/// Deny membership always wins, even when the same user is also in the
/// Allow list.
pub fn evaluate(
    feature_name: &str,
    status: ToggleStatus,
    user_id: Option<&str>,
    is_allowed: bool,
    is_denied: bool,
) -> CheckResult {
    match status {
        ToggleStatus::Enabled => CheckResult::new(
            feature_name,
            true,
            CheckStatus::Enabled,
            "Feature is enabled globally",
        ),
        ToggleStatus::Disabled => CheckResult::new(
            feature_name,
            false,
            CheckStatus::Disabled,
            "Feature is disabled globally",
        ),
        ToggleStatus::ListMode => {
            let user = user_id.map(str::trim).filter(|u| !u.is_empty());
            if user.is_none() {
                return CheckResult::new(
                    feature_name,
                    false,
                    CheckStatus::ListMode,
                    "User ID required for list mode",
                );
            }
            if is_denied {
                CheckResult::new(
                    feature_name,
                    false,
                    CheckStatus::ListMode,
                    "User is blacklisted",
                )
            } else if is_allowed {
                CheckResult::new(
                    feature_name,
                    true,
                    CheckStatus::ListMode,
                    "User is whitelisted",
                )
            } else {
                CheckResult::new(
                    feature_name,
                    false,
                    CheckStatus::ListMode,
                    "User not in whitelist",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_wins_regardless_of_user_and_lists() {
        for user in [None, Some("alice"), Some("")] {
            for (allowed, denied) in [(false, false), (true, false), (false, true), (true, true)] {
                let result = evaluate("F", ToggleStatus::Enabled, user, allowed, denied);
                assert!(result.enabled);
                assert_eq!(result.status, Some(CheckStatus::Enabled));
                assert_eq!(result.reason, "Feature is enabled globally");
            }
        }
    }

    #[test]
    fn disabled_wins_regardless_of_user_and_lists() {
        for user in [None, Some("alice")] {
            let result = evaluate("F", ToggleStatus::Disabled, user, true, false);
            assert!(!result.enabled);
            assert_eq!(result.reason, "Feature is disabled globally");
        }
    }

    #[test]
    fn list_mode_requires_a_user_id() {
        for user in [None, Some(""), Some("   ")] {
            let result = evaluate("F", ToggleStatus::ListMode, user, true, false);
            assert!(!result.enabled);
            assert_eq!(result.status, Some(CheckStatus::ListMode));
            assert_eq!(result.reason, "User ID required for list mode");
        }
    }

    #[test]
    fn deny_overrides_allow() {
        let result = evaluate("F", ToggleStatus::ListMode, Some("alice"), true, true);
        assert!(!result.enabled);
        assert_eq!(result.reason, "User is blacklisted");
    }

    #[test]
    fn denied_user_is_disabled() {
        let result = evaluate("F", ToggleStatus::ListMode, Some("alice"), false, true);
        assert!(!result.enabled);
        assert_eq!(result.reason, "User is blacklisted");
    }

    #[test]
    fn allowed_user_is_enabled() {
        let result = evaluate("F", ToggleStatus::ListMode, Some("alice"), true, false);
        assert!(result.enabled);
        assert_eq!(result.reason, "User is whitelisted");
    }

    #[test]
    fn unlisted_user_is_disabled() {
        let result = evaluate("F", ToggleStatus::ListMode, Some("bob"), false, false);
        assert!(!result.enabled);
        assert_eq!(result.reason, "User not in whitelist");
    }

    #[test]
    fn result_carries_the_feature_name() {
        let result = evaluate("PAYMENTS", ToggleStatus::Enabled, None, false, false);
        assert_eq!(result.feature_name, "PAYMENTS");
    }
}
