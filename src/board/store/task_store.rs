//! Subscribable in-memory task store.

use crate::board::domain::{
    BoardDomainError, BoardSnapshot, Container, FieldMutation, Task, TaskId, TaskStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tokio::sync::watch;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the store and the reconciliation guard.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The scope has unpersisted local changes or an active drag.
    #[error("{scope} has unpersisted local changes")]
    ConcurrentModification {
        /// Scope that refused the write.
        scope: TaskStatus,
    },

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A mutation did not fit the board.
    #[error(transparent)]
    Domain(#[from] BoardDomainError),
}

/// The single mutable copy of the board.
///
/// Readers take cheap snapshots or subscribe to a [`watch::Receiver`] that
/// observes every revision. Writes that change nothing do not notify.
#[derive(Debug)]
pub struct TaskStore {
    sender: watch::Sender<BoardSnapshot>,
}

impl TaskStore {
    /// Creates a store holding `snapshot`.
    #[must_use]
    pub fn new(snapshot: BoardSnapshot) -> Self {
        Self {
            sender: watch::Sender::new(snapshot),
        }
    }

    /// Returns a copy of the current board.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        self.sender.borrow().clone()
    }

    /// Subscribes to board revisions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.sender.subscribe()
    }

    /// Returns the members of a container in display order.
    #[must_use]
    pub fn members(&self, container: Container) -> Vec<Task> {
        self.sender
            .borrow()
            .members(container)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns one task.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<Task> {
        self.sender.borrow().get(task_id).cloned()
    }

    /// Applies field mutations atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Domain`] and leaves the board untouched when a
    /// mutation targets an unknown task.
    pub fn apply(&self, mutations: &[FieldMutation]) -> StoreResult<()> {
        let mut outcome = Ok(());
        self.sender.send_if_modified(|board| {
            let before = board.clone();
            if let Err(err) = board.apply(mutations) {
                outcome = Err(StoreError::from(err));
                return false;
            }
            *board != before
        });
        outcome
    }

    /// Replaces the whole board.
    pub fn replace(&self, snapshot: BoardSnapshot) {
        self.sender.send_if_modified(|board| {
            if *board == snapshot {
                false
            } else {
                *board = snapshot;
                true
            }
        });
    }

    /// Inserts or replaces one task.
    pub fn upsert(&self, task: Task) {
        self.sender.send_if_modified(|board| {
            if board.get(task.id()) == Some(&task) {
                false
            } else {
                board.upsert(task);
                true
            }
        });
    }

    /// Merges server data into the board, leaving every task whose local or
    /// server container lies in a `held` scope untouched.
    ///
    /// Returns the held scopes that had differences and were therefore
    /// deferred.
    pub fn merge_server(
        &self,
        server_tasks: Vec<Task>,
        held: &BTreeSet<TaskStatus>,
    ) -> BTreeSet<TaskStatus> {
        let incoming: BTreeMap<TaskId, Task> = server_tasks
            .into_iter()
            .map(|task| (task.id(), task))
            .collect();
        let mut deferred = BTreeSet::new();
        self.sender.send_if_modified(|board| {
            let ids: BTreeSet<TaskId> = board
                .tasks()
                .map(Task::id)
                .chain(incoming.keys().copied())
                .collect();
            let mut modified = false;
            for task_id in ids {
                let remote = incoming.get(&task_id);
                if board.get(task_id) == remote {
                    continue;
                }
                let scopes: BTreeSet<TaskStatus> = board
                    .get(task_id)
                    .map(Task::status)
                    .into_iter()
                    .chain(remote.map(Task::status))
                    .collect();
                let blocked: Vec<TaskStatus> = scopes.intersection(held).copied().collect();
                if !blocked.is_empty() {
                    deferred.extend(blocked);
                    continue;
                }
                match remote {
                    Some(task) => board.upsert(task.clone()),
                    None => {
                        board.remove(task_id);
                    }
                }
                modified = true;
            }
            modified
        });
        deferred
    }
}
