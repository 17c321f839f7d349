//! Per-scope refresh gate.
//!
//! A scope is held while it has at least one unpersisted batch or while a
//! drag touches it. Refreshes never overwrite a held scope; they record it
//! as stale instead so the caller can refresh again once it is released.

use super::{StoreError, StoreResult, TaskStore};
use crate::board::domain::{Task, TaskStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// What a gated refresh did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Scopes that were free to take server data.
    pub applied: BTreeSet<TaskStatus>,
    /// Held scopes whose server data differed and was left for later.
    pub deferred: BTreeSet<TaskStatus>,
}

#[derive(Debug, Default)]
struct GuardState {
    pending: BTreeMap<TaskStatus, usize>,
    dragging: BTreeSet<TaskStatus>,
    stale: BTreeSet<TaskStatus>,
}

impl GuardState {
    fn is_held(&self, scope: TaskStatus) -> bool {
        self.dragging.contains(&scope) || self.pending.get(&scope).is_some_and(|count| *count > 0)
    }

    fn held(&self) -> BTreeSet<TaskStatus> {
        TaskStatus::ALL
            .into_iter()
            .filter(|scope| self.is_held(*scope))
            .collect()
    }
}

/// Gate between in-flight local changes and inbound server refreshes.
#[derive(Debug, Default)]
pub struct ReconciliationGuard {
    state: Mutex<GuardState>,
}

impl ReconciliationGuard {
    /// Creates a guard with every scope free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, GuardState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Registers one pending batch for each scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn hold(&self, scopes: &BTreeSet<TaskStatus>) -> StoreResult<()> {
        let mut state = self.lock()?;
        for scope in scopes {
            let count = state.pending.entry(*scope).or_default();
            *count = count.saturating_add(1);
        }
        Ok(())
    }

    /// Retires one pending batch for each scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn release(&self, scopes: &BTreeSet<TaskStatus>) -> StoreResult<()> {
        let mut state = self.lock()?;
        for scope in scopes {
            if let Some(count) = state.pending.get_mut(scope) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    state.pending.remove(scope);
                }
            }
        }
        Ok(())
    }

    /// Marks scopes as touched by the active drag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn set_dragging(&self, scopes: impl IntoIterator<Item = TaskStatus>) -> StoreResult<()> {
        self.lock()?.dragging.extend(scopes);
        Ok(())
    }

    /// Clears every drag flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn clear_dragging(&self) -> StoreResult<()> {
        self.lock()?.dragging.clear();
        Ok(())
    }

    /// Returns `true` when the scope must not take server data.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn is_held(&self, scope: TaskStatus) -> StoreResult<bool> {
        Ok(self.lock()?.is_held(scope))
    }

    /// Returns every held scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn held_scopes(&self) -> StoreResult<BTreeSet<TaskStatus>> {
        Ok(self.lock()?.held())
    }

    /// Returns scopes whose last refresh was deferred or whose local state
    /// was rolled back, and which therefore may disagree with the server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn stale_scopes(&self) -> StoreResult<BTreeSet<TaskStatus>> {
        Ok(self.lock()?.stale.clone())
    }

    /// Records scopes as possibly out of date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn mark_stale(&self, scopes: &BTreeSet<TaskStatus>) -> StoreResult<()> {
        self.lock()?.stale.extend(scopes.iter().copied());
        Ok(())
    }

    /// Checks that a scope may be overwritten from the server right now.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrentModification`] while the scope is
    /// held.
    pub fn admit(&self, scope: TaskStatus) -> StoreResult<()> {
        if self.lock()?.is_held(scope) {
            return Err(StoreError::ConcurrentModification { scope });
        }
        Ok(())
    }

    /// Merges a server refresh into the store, skipping held scopes.
    ///
    /// The guard stays locked for the whole merge so no scope can become
    /// held halfway through.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn reconcile(
        &self,
        store: &TaskStore,
        server_tasks: Vec<Task>,
    ) -> StoreResult<RefreshOutcome> {
        let mut state = self.lock()?;
        let held = state.held();
        let deferred = store.merge_server(server_tasks, &held);
        let applied: BTreeSet<TaskStatus> = TaskStatus::ALL
            .into_iter()
            .filter(|scope| !held.contains(scope))
            .collect();
        state.stale.retain(|scope| !applied.contains(scope));
        state.stale.extend(deferred.iter().copied());
        debug!(?applied, ?deferred, "reconciled server refresh");
        Ok(RefreshOutcome { applied, deferred })
    }
}
