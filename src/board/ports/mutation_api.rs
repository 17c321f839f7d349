//! Mutation port for the remote task service.

use crate::board::domain::{NewTask, Priority, Task, TaskId, TaskPatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task mutation operations.
pub type TaskMutationResult<T> = Result<T, TaskMutationError>;

/// One entry of a batched priority update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityUpdate {
    /// Task to update.
    pub task_id: TaskId,
    /// New priority.
    pub priority: Priority,
}

/// Task service contract.
///
/// Implementations must enforce the service-side capacity rules: a status
/// transition into a full Inbox or Next is rejected with
/// [`TaskMutationError::InboxFull`] or [`TaskMutationError::NextFull`] and
/// leaves the stored task untouched.
#[async_trait]
pub trait TaskMutationApi: Send + Sync {
    /// Applies a partial update and returns the stored task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::NotFound`] for unknown tasks and a
    /// capacity error when the patch moves the task into a full container.
    async fn update_task(&self, task_id: TaskId, patch: TaskPatch) -> TaskMutationResult<Task>;

    /// Moves a task into the Next slot.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::NextFull`] when Next is occupied.
    async fn make_next(&self, task_id: TaskId) -> TaskMutationResult<Task>;

    /// Moves a task into the Inbox.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::InboxFull`] when the Inbox is at its cap.
    async fn move_to_inbox(&self, task_id: TaskId) -> TaskMutationResult<Task>;

    /// Writes several priorities in one call.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::NotFound`] when any task is unknown; no
    /// priority is written in that case.
    async fn batch_update_priority(&self, updates: Vec<PriorityUpdate>) -> TaskMutationResult<()>;

    /// Fetches every task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskMutationError::Transport`] when the service is
    /// unreachable.
    async fn refresh_tasks(&self) -> TaskMutationResult<Vec<Task>>;

    /// Creates a task in the Inbox or Next.
    ///
    /// # Errors
    ///
    /// Returns a capacity error when the requested container is full.
    async fn create_task(&self, request: &NewTask) -> TaskMutationResult<Task>;
}

/// Errors returned by task service implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskMutationError {
    /// The Inbox is at its cap.
    #[error("inbox is full")]
    InboxFull,

    /// The Next slot is occupied.
    #[error("next slot is occupied")]
    NextFull,

    /// The task does not exist on the service.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Network or service failure.
    #[error("transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskMutationError {
    /// Wraps a transport error.
    #[must_use]
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
