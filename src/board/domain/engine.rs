//! Reorder engine: turns a committed drop into a new board and a change set.
//!
//! Every function here is pure. The engine reads a [`BoardSnapshot`],
//! rearranges the affected containers with "remove, then insert into the
//! post-removal list" semantics, re-derives whatever the container's
//! [`OrderingStrategy`] ties to position, and reports only the fields that
//! actually changed.

use super::{
    BoardDomainError, BoardSnapshot, ChangeSet, Container, FieldValue, InvalidDropReason,
    OrderingStrategy, Schedule, Task, TaskId, TaskStatus, priority_at,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;

/// Capacity caps of the capped containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimits {
    inbox: usize,
    next: usize,
}

impl CapacityLimits {
    /// Creates capacity limits.
    #[must_use]
    pub const fn new(inbox: usize, next: usize) -> Self {
        Self { inbox, next }
    }

    /// Returns the cap of a container, or `None` when it is unbounded.
    #[must_use]
    pub const fn of(&self, container: Container) -> Option<usize> {
        match container {
            Container::Inbox => Some(self.inbox),
            Container::Next => Some(self.next),
            _ => None,
        }
    }
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self::new(5, 1)
    }
}

/// A committed drop: where the task came from and where it landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropDescriptor {
    /// Dragged task.
    pub task_id: TaskId,
    /// Container the drag started in.
    pub source: Container,
    /// Index of the task in the source container at drag start.
    pub source_index: usize,
    /// Container the task was dropped on.
    pub destination: Container,
    /// Requested index in the destination, counted after removal from the
    /// source.
    pub destination_index: usize,
    /// Occupant of a full destination that swaps into the source position.
    pub evict: Option<TaskId>,
    /// Time of the drop, used to stamp Later entry.
    pub at: DateTime<Utc>,
}

impl DropDescriptor {
    /// Returns `true` when the task is dropped back onto its own position.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.source == self.destination
            && self.source_index == self.destination_index
            && self.evict.is_none()
    }
}

/// Result of a reorder: the proposed board and what to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// Board after the reorder.
    pub snapshot: BoardSnapshot,
    /// Field-level changes from the input board to [`Self::snapshot`].
    pub changes: ChangeSet,
    /// Statuses whose containers were touched.
    pub scopes: BTreeSet<TaskStatus>,
}

impl ReorderPlan {
    fn unchanged(snapshot: &BoardSnapshot) -> Self {
        Self {
            snapshot: snapshot.clone(),
            changes: ChangeSet::new(),
            scopes: BTreeSet::new(),
        }
    }

    /// Returns `true` when nothing needs persisting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn then(self, later: Self) -> Self {
        let mut scopes = self.scopes;
        scopes.extend(later.scopes);
        Self {
            snapshot: later.snapshot,
            changes: self.changes.compose(later.changes),
            scopes,
        }
    }
}

/// Pure reorder engine parameterized by container capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderEngine {
    capacity: CapacityLimits,
}

impl ReorderEngine {
    /// Creates an engine enforcing the given caps.
    #[must_use]
    pub const fn new(capacity: CapacityLimits) -> Self {
        Self { capacity }
    }

    /// Returns the enforced caps.
    #[must_use]
    pub const fn capacity(&self) -> CapacityLimits {
        self.capacity
    }

    /// Checks that a container can take one more task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::CapacityExceeded`] when it is full.
    pub fn ensure_room(
        &self,
        snapshot: &BoardSnapshot,
        container: Container,
    ) -> Result<(), BoardDomainError> {
        match self.capacity.of(container) {
            Some(capacity) if snapshot.count(container) >= capacity => {
                Err(BoardDomainError::CapacityExceeded {
                    container,
                    capacity,
                })
            }
            _ => Ok(()),
        }
    }

    /// Applies a committed drop.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::CapacityExceeded`] when a capped
    /// destination is full and no eviction accompanies the drop,
    /// [`BoardDomainError::InvalidDrop`] when the descriptor no longer
    /// matches the board, and [`BoardDomainError::TaskNotFound`] for unknown
    /// tasks.
    pub fn apply_drop(
        &self,
        snapshot: &BoardSnapshot,
        descriptor: &DropDescriptor,
    ) -> Result<ReorderPlan, BoardDomainError> {
        let current = snapshot
            .container_of(descriptor.task_id)
            .ok_or(BoardDomainError::TaskNotFound(descriptor.task_id))?;
        if current == Container::Completed {
            return Err(BoardDomainError::InvalidDrop(
                InvalidDropReason::TerminalSource,
            ));
        }
        let mut source_ids = snapshot.member_ids(descriptor.source);
        let at_source = source_ids.get(descriptor.source_index) == Some(&descriptor.task_id);
        if current != descriptor.source || !at_source {
            return Err(BoardDomainError::InvalidDrop(InvalidDropReason::StaleSource));
        }
        if descriptor.is_noop() {
            return Ok(ReorderPlan::unchanged(snapshot));
        }

        source_ids.remove(descriptor.source_index);
        let mut next = snapshot.clone();
        let mut touched: BTreeSet<TaskId> = source_ids.iter().copied().collect();
        touched.insert(descriptor.task_id);

        if descriptor.destination == descriptor.source {
            let index = descriptor.destination_index.min(source_ids.len());
            source_ids.insert(index, descriptor.task_id);
            layout(&mut next, descriptor.source, &source_ids, descriptor.at)?;
        } else {
            let mut destination_ids = snapshot.member_ids(descriptor.destination);
            self.make_room(descriptor, &mut source_ids, &mut destination_ids)?;
            touched.extend(destination_ids.iter().copied());
            touched.extend(descriptor.evict);
            let index = match descriptor.destination.strategy() {
                OrderingStrategy::Append => destination_ids.len(),
                OrderingStrategy::Ladder | OrderingStrategy::TimeSlot => {
                    descriptor.destination_index.min(destination_ids.len())
                }
            };
            destination_ids.insert(index, descriptor.task_id);
            layout(&mut next, descriptor.source, &source_ids, descriptor.at)?;
            layout(
                &mut next,
                descriptor.destination,
                &destination_ids,
                descriptor.at,
            )?;
        }

        let mut changes = ChangeSet::new();
        for task_id in touched {
            if let (Some(before), Some(after)) = (snapshot.get(task_id), next.get(task_id)) {
                changes.record_task(before, after);
            }
        }
        Ok(ReorderPlan {
            snapshot: next,
            changes,
            scopes: [descriptor.source.status(), descriptor.destination.status()].into(),
        })
    }

    /// Moves a task to `destination` from wherever it currently is. Used by
    /// button actions that have no drag gesture behind them.
    ///
    /// # Errors
    ///
    /// Same as [`Self::apply_drop`].
    pub fn relocate(
        &self,
        snapshot: &BoardSnapshot,
        task_id: TaskId,
        destination: Container,
        destination_index: usize,
        at: DateTime<Utc>,
    ) -> Result<ReorderPlan, BoardDomainError> {
        let (source, source_index) = snapshot
            .position_of(task_id)
            .ok_or(BoardDomainError::TaskNotFound(task_id))?;
        if source == destination {
            return Ok(ReorderPlan::unchanged(snapshot));
        }
        self.apply_drop(
            snapshot,
            &DropDescriptor {
                task_id,
                source,
                source_index,
                destination,
                destination_index,
                evict: None,
                at,
            },
        )
    }

    /// Writes one field without re-deriving anything else.
    ///
    /// This is the explicit-edit path: a priority set here may break the
    /// ladder until the container is next reordered.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskNotFound`] for unknown tasks.
    pub fn set_field(
        &self,
        snapshot: &BoardSnapshot,
        task_id: TaskId,
        value: FieldValue,
    ) -> Result<ReorderPlan, BoardDomainError> {
        let mut next = snapshot.clone();
        let task = next
            .get_mut(task_id)
            .ok_or(BoardDomainError::TaskNotFound(task_id))?;
        let before = task.field(value.field());
        let status = task.status();
        task.apply(&value);
        let mut changes = ChangeSet::new();
        changes.record(task_id, before, value);
        Ok(ReorderPlan {
            snapshot: next,
            changes,
            scopes: [status].into(),
        })
    }

    /// Moves every Later task whose TTL has elapsed at `now` to the bottom
    /// of the Backlog.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::relocate`].
    pub fn expire_later(
        &self,
        snapshot: &BoardSnapshot,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Result<ReorderPlan, BoardDomainError> {
        let expired: Vec<TaskId> = snapshot
            .members(Container::Later)
            .into_iter()
            .filter(|task| {
                task.later_since()
                    .is_none_or(|since| since.checked_add_signed(ttl).is_none_or(|due| due <= now))
            })
            .map(Task::id)
            .collect();

        let mut plan = ReorderPlan::unchanged(snapshot);
        for task_id in expired {
            let step = self.relocate(&plan.snapshot, task_id, Container::Backlog, usize::MAX, now)?;
            plan = plan.then(step);
        }
        Ok(plan)
    }

    fn make_room(
        &self,
        descriptor: &DropDescriptor,
        source_ids: &mut Vec<TaskId>,
        destination_ids: &mut Vec<TaskId>,
    ) -> Result<(), BoardDomainError> {
        if let Some(evicted) = descriptor.evict {
            let position = destination_ids
                .iter()
                .position(|id| *id == evicted)
                .ok_or(BoardDomainError::InvalidDrop(
                    InvalidDropReason::EvictionNotInTarget,
                ))?;
            destination_ids.remove(position);
            let index = descriptor.source_index.min(source_ids.len());
            source_ids.insert(index, evicted);
            return Ok(());
        }
        match self.capacity.of(descriptor.destination) {
            Some(capacity) if destination_ids.len() >= capacity => {
                Err(BoardDomainError::CapacityExceeded {
                    container: descriptor.destination,
                    capacity,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Rewrites the position-derived fields of every member of a container.
///
/// Slot members are grid-aligned: each one is placed at its lane time,
/// `slot start + index * sub_slot_offset`, so a member stored at an
/// unaligned time inside the slot snaps to its lane when the slot is laid
/// out again.
fn layout(
    board: &mut BoardSnapshot,
    container: Container,
    members: &[TaskId],
    at: DateTime<Utc>,
) -> Result<(), BoardDomainError> {
    let total = members.len();
    let grid = board.grid();
    let completed_tail = match container.strategy() {
        OrderingStrategy::Append => members
            .iter()
            .filter_map(|id| board.get(*id))
            .filter(|task| task.status() == TaskStatus::Completed)
            .map(Task::sort_order)
            .max(),
        OrderingStrategy::Ladder | OrderingStrategy::TimeSlot => None,
    };

    for (index, task_id) in members.iter().enumerate() {
        let task = board
            .get_mut(*task_id)
            .ok_or(BoardDomainError::TaskNotFound(*task_id))?;
        let position = i64::try_from(index).unwrap_or(i64::MAX);
        match container {
            Container::Slot(slot) => {
                let time = grid.offset_time(slot, index).ok_or(BoardDomainError::InvalidDrop(
                    InvalidDropReason::SlotOverflow,
                ))?;
                task.apply(&FieldValue::Status(TaskStatus::Scheduled));
                task.apply(&FieldValue::Schedule(Some(Schedule::new(slot.date(), time))));
                task.apply(&FieldValue::LaterSince(None));
                task.apply(&FieldValue::SortOrder(position));
            }
            Container::Completed => {
                if task.status() != TaskStatus::Completed {
                    let tail = completed_tail.map_or(0, |last| last.saturating_add(1));
                    task.apply(&FieldValue::Status(TaskStatus::Completed));
                    task.apply(&FieldValue::Schedule(None));
                    task.apply(&FieldValue::LaterSince(None));
                    task.apply(&FieldValue::SortOrder(tail));
                }
            }
            Container::Inbox
            | Container::Next
            | Container::Later
            | Container::Backlog
            | Container::Roadmap => {
                let later_since = if container == Container::Later {
                    task.later_since()
                        .filter(|_| task.status() == TaskStatus::Later)
                        .or(Some(at))
                } else {
                    None
                };
                task.apply(&FieldValue::Status(container.status()));
                task.apply(&FieldValue::Schedule(None));
                task.apply(&FieldValue::LaterSince(later_since));
                task.apply(&FieldValue::Priority(priority_at(index, total)));
                task.apply(&FieldValue::SortOrder(position));
            }
        }
    }
    Ok(())
}
