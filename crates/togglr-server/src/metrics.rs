//! Prometheus metrics for the toggle server.
//!
//! Counters for cache tier hits/misses and per-feature check outcomes,
//! plus a histogram over check latency.

use std::sync::OnceLock;
use std::time::Duration;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const TOGGLE_CHECKS_TOTAL: &str = "toggle_checks_total";
    pub const TOGGLE_CHECK_DURATION_SECONDS: &str = "toggle_check_duration_seconds";
    pub const CACHE_HITS_TOTAL: &str = "toggle_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "toggle_cache_misses_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Should be called once at server startup. Returns `true` if
/// initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record a hit on a cache tier ("local" or "redis").
pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Record a full cache miss (the authority store had to answer).
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record the outcome of one feature check.
pub fn record_check(feature_name: &str, enabled: bool) {
    counter!(
        names::TOGGLE_CHECKS_TOTAL,
        "feature" => feature_name.to_string(),
        "result" => if enabled { "enabled" } else { "disabled" },
    )
    .increment(1);
}

/// Record how long one feature check took.
pub fn record_check_duration(duration: Duration) {
    histogram!(names::TOGGLE_CHECK_DURATION_SECONDS).record(duration.as_secs_f64());
}
