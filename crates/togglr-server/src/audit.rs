//! Fire-and-forget audit observer.
//!
//! Invoked after a mutation has already succeeded; a failing append is
//! logged and swallowed so it can never gate the mutation or the cache
//! invalidation that followed it.

use std::sync::Arc;

use togglr_storage::{AuditAction, AuditRecord, AuditStore};

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditStore>) -> Self {
        Self { sink }
    }

    /// Record what happened, off the caller's critical path.
    pub fn log(
        &self,
        feature_name: &str,
        action: AuditAction,
        actor: &str,
        details: impl Into<String>,
    ) {
        let record = AuditRecord::new(feature_name, action, actor, details);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tracing::debug!(
                feature = %record.feature_name,
                action = %record.action,
                actor = %record.actor,
                "Audit log"
            );
            if let Err(e) = sink.append(record).await {
                tracing::warn!(error = %e, "Audit append failed");
            }
        });
    }
}
