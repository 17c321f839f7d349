//! Immutable view of the whole board at one point in time.

use super::{
    BoardDomainError, Container, FieldMutation, OrderingStrategy, SlotGrid, SlotKey, Task, TaskId,
};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// All tasks of the board, partitioned into containers on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    tasks: BTreeMap<TaskId, Task>,
    grid: SlotGrid,
}

impl BoardSnapshot {
    /// Creates an empty snapshot on the given slot grid.
    #[must_use]
    pub const fn new(grid: SlotGrid) -> Self {
        Self {
            tasks: BTreeMap::new(),
            grid,
        }
    }

    /// Builds a snapshot from service data.
    #[must_use]
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>, grid: SlotGrid) -> Self {
        Self {
            tasks: tasks.into_iter().map(|task| (task.id(), task)).collect(),
            grid,
        }
    }

    /// Returns the slot grid used to derive calendar containers.
    #[must_use]
    pub const fn grid(&self) -> SlotGrid {
        self.grid
    }

    /// Returns a task by identifier.
    #[must_use]
    pub fn get(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    /// Iterates over all tasks in identifier order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` when the board holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the container a task currently belongs to.
    #[must_use]
    pub fn container_of(&self, task_id: TaskId) -> Option<Container> {
        self.get(task_id).map(|task| Container::of(task, &self.grid))
    }

    /// Returns the container and index of a task.
    #[must_use]
    pub fn position_of(&self, task_id: TaskId) -> Option<(Container, usize)> {
        let container = self.container_of(task_id)?;
        let index = self
            .member_ids(container)
            .iter()
            .position(|id| *id == task_id)?;
        Some((container, index))
    }

    /// Returns the members of a container in display order.
    #[must_use]
    pub fn members(&self, container: Container) -> Vec<&Task> {
        let mut members: Vec<&Task> = self
            .tasks
            .values()
            .filter(|task| Container::of(task, &self.grid) == container)
            .collect();
        let strategy = container.strategy();
        members.sort_by(|left, right| compare(strategy, left, right));
        members
    }

    /// Returns the member identifiers of a container in display order.
    #[must_use]
    pub fn member_ids(&self, container: Container) -> Vec<TaskId> {
        self.members(container).iter().map(|task| task.id()).collect()
    }

    /// Returns the number of tasks in a container.
    #[must_use]
    pub fn count(&self, container: Container) -> usize {
        self.tasks
            .values()
            .filter(|task| Container::of(task, &self.grid) == container)
            .count()
    }

    /// Returns the occupied slots of one day with their members in lane
    /// order; the index within each list is the task's side-by-side lane.
    #[must_use]
    pub fn slots_on(&self, date: NaiveDate) -> BTreeMap<SlotKey, Vec<&Task>> {
        self.slots_between(date, date)
    }

    /// Returns the occupied slots between two dates, both inclusive.
    #[must_use]
    pub fn slots_between(&self, from: NaiveDate, to: NaiveDate) -> BTreeMap<SlotKey, Vec<&Task>> {
        let mut slots: BTreeMap<SlotKey, Vec<&Task>> = BTreeMap::new();
        let dated = self.tasks.values().filter_map(|task| match Container::of(task, &self.grid) {
            Container::Slot(slot) => Some((slot, task)),
            _ => None,
        });
        for (slot, task) in dated.filter(|(slot, _)| (from..=to).contains(&slot.date())) {
            slots.entry(slot).or_default().push(task);
        }
        for members in slots.values_mut() {
            members.sort_by(|left, right| compare(OrderingStrategy::TimeSlot, left, right));
        }
        slots
    }

    /// Inserts or replaces a task.
    pub fn upsert(&mut self, task: Task) {
        self.tasks.insert(task.id(), task);
    }

    /// Removes a task.
    pub fn remove(&mut self, task_id: TaskId) -> Option<Task> {
        self.tasks.remove(&task_id)
    }

    /// Applies field mutations atomically.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskNotFound`] without touching any task
    /// when a mutation targets an unknown task.
    pub fn apply(&mut self, mutations: &[FieldMutation]) -> Result<(), BoardDomainError> {
        if let Some(missing) = mutations
            .iter()
            .find(|mutation| !self.tasks.contains_key(&mutation.task_id))
        {
            return Err(BoardDomainError::TaskNotFound(missing.task_id));
        }
        for mutation in mutations {
            if let Some(task) = self.tasks.get_mut(&mutation.task_id) {
                task.apply(&mutation.value);
            }
        }
        Ok(())
    }

    pub(crate) fn get_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&task_id)
    }
}

fn compare(strategy: OrderingStrategy, left: &Task, right: &Task) -> Ordering {
    let primary = match strategy {
        OrderingStrategy::Ladder => right.priority().cmp(&left.priority()),
        OrderingStrategy::TimeSlot => left
            .schedule()
            .map(|schedule| schedule.time())
            .cmp(&right.schedule().map(|schedule| schedule.time())),
        OrderingStrategy::Append => Ordering::Equal,
    };
    primary
        .then_with(|| left.sort_order().cmp(&right.sort_order()))
        .then_with(|| left.id().cmp(&right.id()))
}
