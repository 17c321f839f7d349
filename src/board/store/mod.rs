//! Local mirror of the board and the gate that protects it from stale
//! refreshes.
//!
//! - [`TaskStore`] holds the current [`BoardSnapshot`] and publishes every
//!   revision to subscribers.
//! - [`ReconciliationGuard`] decides which container scopes a server
//!   refresh may overwrite.

pub mod guard;
pub mod task_store;

pub use guard::{ReconciliationGuard, RefreshOutcome};
pub use task_store::{StoreError, StoreResult, TaskStore};
