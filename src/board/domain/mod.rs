//! Domain model for the task board.
//!
//! Everything in this module is pure: tasks and containers, the priority
//! ladder, the drag session state machine, field-level change sets and the
//! reorder engine. Nothing here performs I/O or reads a clock.

mod change;
mod container;
mod drag;
mod engine;
mod error;
mod ids;
mod ladder;
mod snapshot;
mod task;

pub use change::{ChangeSet, FieldChange, FieldMutation, FieldValue, TaskField, TaskPatch};
pub use container::{Container, OrderingStrategy, SlotGrid, SlotKey};
pub use drag::{
    DragOrigin, DragSession, DragSettings, DragState, DragUpdate, DropTarget, Point, PointerEvent,
};
pub use engine::{CapacityLimits, DropDescriptor, ReorderEngine, ReorderPlan};
pub use error::{BoardDomainError, InvalidDropReason, ParseTaskStatusError};
pub use ids::TaskId;
pub use ladder::priority_at;
pub use snapshot::BoardSnapshot;
pub use task::{NewTask, PersistedTaskData, Priority, Schedule, Task, TaskStatus};
