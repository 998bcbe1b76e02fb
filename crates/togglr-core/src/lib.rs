//! Core domain types and the evaluation engine for feature toggles.
//!
//! This crate is intentionally free of I/O: it defines the toggle record,
//! the status and list-type enums, the result type returned to callers, and
//! the pure [`evaluate`] function that turns a status plus list memberships
//! into an enabled/disabled decision with a human-readable reason.
//!
//! Everything that touches a cache tier, a database, or the network lives
//! in the sibling crates and funnels its answers through [`evaluate`].

mod check;
mod error;
mod evaluate;
mod status;
mod toggle;

pub use check::{CheckResult, REASON_NOT_FOUND};
pub use error::{CoreError, Result};
pub use evaluate::evaluate;
pub use status::{CheckStatus, DefaultBehavior, ListType, ToggleStatus};
pub use toggle::{DEFAULT_GROUP, FeatureToggle, validate_feature_name};
