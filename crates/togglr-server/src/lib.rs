//! The feature-toggle serving side.
//!
//! Wires the tiers together: a per-process local cache in front of the
//! distributed cache in front of the authority store, with invalidation
//! broadcast keeping remote local caches honest, a scheduled-transition
//! runner mutating authoritative state on a timer, and a thin axum surface
//! on top.

pub mod api;
pub mod audit;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod observability;
pub mod scheduler;
pub mod service;

pub use api::{AppState, router};
pub use audit::AuditLogger;
pub use cache::CacheCoordinator;
pub use config::{AppConfig, ConfigError, load_config, resolve_config_path};
pub use observability::{apply_logging_level, init_tracing};
pub use scheduler::ScheduledTransitionRunner;
pub use service::{ServiceError, ToggleService};
