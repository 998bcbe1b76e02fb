//! Embedded feature-toggle client.
//!
//! Runs inside caller processes, decoupled from the serving side. Keeps
//! its own TTL'd local cache, subscribes to the invalidation broadcast,
//! and on a miss either calls the serving side's check endpoint (remote
//! mode) or reads the distributed cache directly with the shared key
//! layout (direct mode), replicating the evaluation engine locally.
//!
//! A check never fails: when neither source is reachable the configured
//! default behavior answers. Only [`ToggleClient::require_enabled`] is
//! loud, and only for a genuinely disabled flag.

mod client;
mod config;
mod error;

pub use client::ToggleClient;
pub use config::{ClientCacheSettings, ClientConfig};
pub use error::FeatureDisabledError;

pub use togglr_core::{CheckResult, CheckStatus, DefaultBehavior};
