//! Storage contracts for the feature-toggle authority store.
//!
//! The traits here are the only way the serving side talks to durable
//! state. Two backends exist: [`MemoryStore`] (tests and single-process
//! deployments) and the PostgreSQL implementation in `togglr-db-postgres`.
//! Implementations must be thread-safe (`Send + Sync`) and keep the
//! scheduled-transition pair atomic: readers never observe a status change
//! without the schedule fields cleared.

mod error;
mod memory;
mod traits;
mod types;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use traits::{AuditStore, ToggleStore, UserListStore};
pub use types::{AppliedTransition, AuditAction, AuditFilter, AuditRecord};
