use thiserror::Error;

/// Raised by `require_enabled` when a flag evaluates to disabled.
///
/// The one error callers see; infrastructure trouble never gets this far
/// because checks resolve to the default behavior instead.
#[derive(Debug, Error)]
#[error("Feature '{feature_name}' is disabled: {reason}")]
pub struct FeatureDisabledError {
    pub feature_name: String,
    pub reason: String,
}

impl FeatureDisabledError {
    pub fn new(feature_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            feature_name: feature_name.into(),
            reason: reason.into(),
        }
    }
}

/// Internal fetch failures, absorbed into default-behavior results.
#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Cache(#[from] togglr_cache::CacheError),

    #[error("No remote endpoint configured")]
    NoRemote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_name_and_reason() {
        let err = FeatureDisabledError::new("BETA", "User is blacklisted");
        assert_eq!(
            err.to_string(),
            "Feature 'BETA' is disabled: User is blacklisted"
        );
    }
}
