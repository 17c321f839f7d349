//! Error types for board domain validation and parsing.

use super::{Container, TaskId};
use std::fmt;
use thiserror::Error;

/// Errors returned by pure board operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardDomainError {
    /// The destination container is at its capacity cap.
    #[error("{container} is full (capacity {capacity})")]
    CapacityExceeded {
        /// Container that rejected the insertion.
        container: Container,
        /// Configured capacity of that container.
        capacity: usize,
    },

    /// A drop could not be applied. Callers treat this as a no-op.
    #[error("invalid drop: {0}")]
    InvalidDrop(InvalidDropReason),

    /// The task is not present in the board snapshot.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The priority value is outside `1..=4`.
    #[error("invalid priority {0}, expected a value from 1 to 4")]
    InvalidPriority(u8),

    /// The duration is zero.
    #[error("task duration must be positive")]
    InvalidDuration,
}

/// Why a drop descriptor was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDropReason {
    /// The task no longer sits at the recorded source container and index.
    StaleSource,
    /// Completed tasks cannot be dragged out again.
    TerminalSource,
    /// The task to evict is not a member of the destination container.
    EvictionNotInTarget,
    /// The sub-slot offset for the requested index would leave the slot.
    SlotOverflow,
}

impl fmt::Display for InvalidDropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::StaleSource => "task is no longer at the recorded source position",
            Self::TerminalSource => "completed tasks cannot be moved",
            Self::EvictionNotInTarget => "evicted task is not in the destination",
            Self::SlotOverflow => "too many tasks share the slot",
        };
        f.write_str(text)
    }
}

/// Error returned while parsing task statuses from the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
