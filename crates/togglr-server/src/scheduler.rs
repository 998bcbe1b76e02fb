//! Scheduled-transition runner.
//!
//! Periodically applies due status transitions in the authority store and
//! invalidates every cache tier for the affected flags. One flag failing
//! never aborts the batch. Multiple instances may run concurrently; the
//! store-level guarded application makes the duplicates no-ops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use togglr_storage::{AuditAction, ToggleStore};

use crate::audit::AuditLogger;
use crate::cache::CacheCoordinator;
use crate::config::SchedulerSettings;

pub struct ScheduledTransitionRunner {
    toggles: Arc<dyn ToggleStore>,
    coordinator: Arc<CacheCoordinator>,
    audit: AuditLogger,
    interval_secs: u64,
}

impl ScheduledTransitionRunner {
    pub fn new(
        settings: &SchedulerSettings,
        toggles: Arc<dyn ToggleStore>,
        coordinator: Arc<CacheCoordinator>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            toggles,
            coordinator,
            audit,
            interval_secs: settings.interval_secs,
        }
    }

    /// Start the runner in a background task.
    ///
    /// Returns a shutdown sender; send `true` to stop it.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval_secs, "Transition runner started");

            let mut ticker = interval(Duration::from_secs(self.interval_secs));

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Transition runner shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// One scan-and-apply pass.
    pub async fn run_once(&self) {
        let now = Utc::now();
        let due = match self.toggles.find_due_transitions(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query due transitions");
                return;
            }
        };

        for toggle in due {
            match self.toggles.apply_transition(&toggle.name, now).await {
                Ok(Some(applied)) => {
                    self.coordinator.invalidate(&toggle.name).await;
                    self.audit.log(
                        &toggle.name,
                        AuditAction::ScheduleApplied,
                        "SYSTEM",
                        format!(
                            "Scheduled status change from {} to {}",
                            applied.previous, applied.current
                        ),
                    );
                    tracing::info!(
                        feature = %toggle.name,
                        status = %applied.current,
                        "Applied scheduled toggle change"
                    );
                }
                Ok(None) => {
                    // Raced with another instance or a cancellation.
                    tracing::debug!(feature = %toggle.name, "Transition no longer due");
                }
                Err(e) => {
                    tracing::error!(feature = %toggle.name, error = %e, "Failed to apply scheduled toggle");
                }
            }
        }
    }
}
