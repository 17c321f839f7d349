//! Service-level error taxonomy.

use super::DebounceKey;
use crate::board::{
    domain::{BoardDomainError, CapacityLimits, Container},
    ports::TaskMutationError,
    store::StoreError,
};
use thiserror::Error;

/// Result type for board service operations.
pub type BoardServiceResult<T> = Result<T, BoardServiceError>;

/// Errors surfaced by the board services.
#[derive(Debug, Clone, Error)]
pub enum BoardServiceError {
    /// The engine rejected the operation, including capacity violations.
    #[error(transparent)]
    Domain(#[from] BoardDomainError),

    /// The store or guard failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A synchronous call to the task service failed.
    #[error("task service call failed: {0}")]
    Mutation(TaskMutationError),

    /// A debounced batch failed after its retries and was rolled back.
    #[error("persisting {key} failed: {source}")]
    NetworkFailure {
        /// Debounce key of the failed batch.
        key: DebounceKey,
        /// Last error returned by the task service.
        source: TaskMutationError,
    },
}

impl BoardServiceError {
    /// Maps a port error into the service taxonomy, turning the service's
    /// capacity rejections into [`BoardDomainError::CapacityExceeded`].
    #[must_use]
    pub fn from_mutation(err: TaskMutationError, capacity: CapacityLimits) -> Self {
        let full = |container| {
            Self::Domain(BoardDomainError::CapacityExceeded {
                container,
                capacity: capacity.of(container).unwrap_or_default(),
            })
        };
        match err {
            TaskMutationError::InboxFull => full(Container::Inbox),
            TaskMutationError::NextFull => full(Container::Next),
            TaskMutationError::NotFound(task_id) => {
                Self::Domain(BoardDomainError::TaskNotFound(task_id))
            }
            TaskMutationError::Transport(_) => Self::Mutation(err),
        }
    }

    /// Returns `true` for capacity violations.
    #[must_use]
    pub const fn is_capacity_exceeded(&self) -> bool {
        matches!(
            self,
            Self::Domain(BoardDomainError::CapacityExceeded { .. })
        )
    }
}
