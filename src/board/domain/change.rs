//! Field-level mutations and the reversible change sets built from them.
//!
//! A [`ChangeSet`] records, for every `(task, field)` pair it touches, the
//! value before the change and the value after it. The forward mutation list
//! is the set of after-values and the inverse is the set of before-values,
//! so rolling back is applying the inverse rather than reconstructing the
//! original board by hand.

use super::{Priority, Schedule, Task, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mutable task fields tracked by change sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    /// Container membership.
    Status,
    /// Ladder or explicitly edited priority.
    Priority,
    /// Scheduled date and time, always together.
    Schedule,
    /// Planned duration.
    Duration,
    /// Tie-break order.
    SortOrder,
    /// Later entry timestamp.
    LaterSince,
}

/// A value for one task field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// New status.
    Status(TaskStatus),
    /// New priority.
    Priority(Priority),
    /// New schedule, or `None` to clear date and time together.
    Schedule(Option<Schedule>),
    /// New duration in minutes.
    Duration(u32),
    /// New sort order.
    SortOrder(i64),
    /// New Later entry timestamp.
    LaterSince(Option<DateTime<Utc>>),
}

impl FieldValue {
    /// Returns the field this value belongs to.
    #[must_use]
    pub const fn field(&self) -> TaskField {
        match self {
            Self::Status(_) => TaskField::Status,
            Self::Priority(_) => TaskField::Priority,
            Self::Schedule(_) => TaskField::Schedule,
            Self::Duration(_) => TaskField::Duration,
            Self::SortOrder(_) => TaskField::SortOrder,
            Self::LaterSince(_) => TaskField::LaterSince,
        }
    }
}

/// One field of one task set to a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMutation {
    /// Task to change.
    pub task_id: TaskId,
    /// Value to write.
    pub value: FieldValue,
}

/// Partial update for a single task, one entry per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPatch {
    fields: Vec<FieldValue>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds a value, replacing any earlier value for the same field.
    #[must_use]
    pub fn with(mut self, value: FieldValue) -> Self {
        self.set(value);
        self
    }

    /// Sets a value, replacing any earlier value for the same field.
    pub fn set(&mut self, value: FieldValue) {
        self.fields.retain(|existing| existing.field() != value.field());
        self.fields.push(value);
    }

    /// Removes and returns the value for a field.
    pub fn take(&mut self, field: TaskField) -> Option<FieldValue> {
        let position = self.fields.iter().position(|value| value.field() == field)?;
        Some(self.fields.remove(position))
    }

    /// Returns the value for a field, if present.
    #[must_use]
    pub fn get(&self, field: TaskField) -> Option<&FieldValue> {
        self.fields.iter().find(|value| value.field() == field)
    }

    /// Returns all values in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Returns `true` when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Writes every value into the task.
    pub fn apply_to(&self, task: &mut Task) {
        for value in &self.fields {
            task.apply(value);
        }
    }
}

/// Before and after values of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChange {
    /// Value before the change; the rollback target.
    pub before: FieldValue,
    /// Value after the change; what gets persisted.
    pub after: FieldValue,
}

/// Reversible set of field changes across tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: BTreeMap<(TaskId, TaskField), FieldChange>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Records a field change.
    ///
    /// When the field was already recorded the original before-value is
    /// kept and only the after-value moves; a change that nets out to no
    /// change is dropped entirely.
    pub fn record(&mut self, task_id: TaskId, before: FieldValue, after: FieldValue) {
        let key = (task_id, after.field());
        let original = self
            .entries
            .get(&key)
            .map_or(before, |existing| existing.before);
        if original == after {
            self.entries.remove(&key);
        } else {
            self.entries.insert(
                key,
                FieldChange {
                    before: original,
                    after,
                },
            );
        }
    }

    /// Records every field that differs between two versions of a task.
    pub fn record_task(&mut self, before: &Task, after: &Task) {
        for field in FIELDS {
            let old = before.field(field);
            let new = after.field(field);
            if old != new {
                self.record(before.id(), old, new);
            }
        }
    }

    /// Composes a later change set on top of this one.
    ///
    /// The result keeps the earliest before-value and the latest after-value
    /// for each field, which is exactly what a superseding debounced batch
    /// must ship and what a rollback must restore.
    #[must_use]
    pub fn compose(mut self, later: Self) -> Self {
        for ((task_id, _), change) in later.entries {
            self.record(task_id, change.before, change.after);
        }
        self
    }

    /// Returns the recorded change for a field.
    #[must_use]
    pub fn get(&self, task_id: TaskId, field: TaskField) -> Option<&FieldChange> {
        self.entries.get(&(task_id, field))
    }

    /// Iterates over the recorded changes.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &FieldChange)> {
        self.entries
            .iter()
            .map(|((task_id, _), change)| (*task_id, change))
    }

    /// Returns the number of field changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the distinct tasks touched.
    #[must_use]
    pub fn task_ids(&self) -> BTreeSet<TaskId> {
        self.entries.keys().map(|(task_id, _)| *task_id).collect()
    }

    /// Returns the mutations that carry the board forward.
    #[must_use]
    pub fn forward(&self) -> Vec<FieldMutation> {
        self.iter()
            .map(|(task_id, change)| FieldMutation {
                task_id,
                value: change.after,
            })
            .collect()
    }

    /// Returns the mutations that undo [`Self::forward`].
    #[must_use]
    pub fn inverse(&self) -> Vec<FieldMutation> {
        self.iter()
            .map(|(task_id, change)| FieldMutation {
                task_id,
                value: change.before,
            })
            .collect()
    }

    /// Groups the forward mutations into one patch per task.
    #[must_use]
    pub fn forward_patches(&self) -> BTreeMap<TaskId, TaskPatch> {
        let mut patches: BTreeMap<TaskId, TaskPatch> = BTreeMap::new();
        for (task_id, change) in self.iter() {
            patches.entry(task_id).or_default().set(change.after);
        }
        patches
    }
}

const FIELDS: [TaskField; 6] = [
    TaskField::Status,
    TaskField::Priority,
    TaskField::Schedule,
    TaskField::Duration,
    TaskField::SortOrder,
    TaskField::LaterSince,
];
