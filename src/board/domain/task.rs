//! Task aggregate and its scalar value types.

use super::{BoardDomainError, FieldValue, ParseTaskStatusError, TaskField, TaskId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status. Each status maps to exactly one kind of container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Pending task waiting in the capped inbox.
    Inbox,
    /// The single focus task.
    Next,
    /// Task placed in a calendar slot.
    Scheduled,
    /// Task has been completed.
    Completed,
    /// Task deferred for a limited time.
    Later,
    /// Task parked without a deadline.
    Backlog,
    /// Long-term idea.
    Roadmap,
}

impl TaskStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 7] = [
        Self::Inbox,
        Self::Next,
        Self::Scheduled,
        Self::Completed,
        Self::Later,
        Self::Backlog,
        Self::Roadmap,
    ];

    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Next => "next",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Later => "later",
            Self::Backlog => "backlog",
            Self::Roadmap => "roadmap",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseTaskStatusError(value.to_owned()))
    }
}

/// Task priority from 1 (lowest) to 4 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Bottom rung of the ladder.
    pub const LOWEST: Self = Self(1);
    /// Top rung of the ladder.
    pub const HIGHEST: Self = Self(4);

    /// Creates a validated priority.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidPriority`] for values outside
    /// `1..=4`.
    pub const fn new(value: u8) -> Result<Self, BoardDomainError> {
        if value < Self::LOWEST.0 || value > Self::HIGHEST.0 {
            return Err(BoardDomainError::InvalidPriority(value));
        }
        Ok(Self(value))
    }

    /// Builds a priority from a ladder rung, clamping into range.
    pub(crate) fn clamped(rung: usize) -> Self {
        let bounded = rung.clamp(usize::from(Self::LOWEST.0), usize::from(Self::HIGHEST.0));
        Self(u8::try_from(bounded).unwrap_or(Self::HIGHEST.0))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::HIGHEST
    }
}

impl TryFrom<u8> for Priority {
    type Error = BoardDomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Calendar placement. Date and time only ever exist together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Schedule {
    date: NaiveDate,
    time: NaiveTime,
}

impl Schedule {
    /// Creates a schedule at the given date and time.
    #[must_use]
    pub const fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// Returns the scheduled date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the scheduled time, including any sub-slot offset.
    #[must_use]
    pub const fn time(&self) -> NaiveTime {
        self.time
    }
}

/// Task record mirrored from the task service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: Priority,
    schedule: Option<Schedule>,
    duration_minutes: u32,
    sort_order: i64,
    later_since: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a task from service data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Service-assigned identifier.
    pub id: TaskId,
    /// Display title.
    pub title: String,
    /// Optional display description.
    pub description: Option<String>,
    /// Container membership.
    pub status: TaskStatus,
    /// Stored priority.
    pub priority: Priority,
    /// Calendar placement, present only for scheduled tasks.
    pub schedule: Option<Schedule>,
    /// Planned length in minutes.
    pub duration_minutes: u32,
    /// Tie-break order within the container.
    pub sort_order: i64,
    /// When the task entered Later.
    pub later_since: Option<DateTime<Utc>>,
}

impl Task {
    /// Reconstructs a task from service data.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            schedule: data.schedule,
            duration_minutes: data.duration_minutes,
            sort_order: data.sort_order,
            later_since: data.later_since,
        }
    }

    /// Materializes a creation request under a freshly assigned identifier.
    ///
    /// New tasks start on the bottom rung so they sort after the existing
    /// members of their container.
    #[must_use]
    pub fn from_new(id: TaskId, request: &NewTask, sort_order: i64) -> Self {
        Self {
            id,
            title: request.title.clone(),
            description: request.description.clone(),
            status: request.status,
            priority: Priority::LOWEST,
            schedule: None,
            duration_minutes: request.duration_minutes,
            sort_order,
            later_since: None,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the display description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the task status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the stored priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the calendar placement, if scheduled.
    #[must_use]
    pub const fn schedule(&self) -> Option<Schedule> {
        self.schedule
    }

    /// Returns the planned duration in minutes.
    #[must_use]
    pub const fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Returns the tie-break order within the container.
    #[must_use]
    pub const fn sort_order(&self) -> i64 {
        self.sort_order
    }

    /// Returns when the task entered Later.
    #[must_use]
    pub const fn later_since(&self) -> Option<DateTime<Utc>> {
        self.later_since
    }

    /// Reads the current value of one mutable field.
    #[must_use]
    pub const fn field(&self, field: TaskField) -> FieldValue {
        match field {
            TaskField::Status => FieldValue::Status(self.status),
            TaskField::Priority => FieldValue::Priority(self.priority),
            TaskField::Schedule => FieldValue::Schedule(self.schedule),
            TaskField::Duration => FieldValue::Duration(self.duration_minutes),
            TaskField::SortOrder => FieldValue::SortOrder(self.sort_order),
            TaskField::LaterSince => FieldValue::LaterSince(self.later_since),
        }
    }

    /// Overwrites one mutable field.
    pub const fn apply(&mut self, value: &FieldValue) {
        match *value {
            FieldValue::Status(status) => self.status = status,
            FieldValue::Priority(priority) => self.priority = priority,
            FieldValue::Schedule(schedule) => self.schedule = schedule,
            FieldValue::Duration(minutes) => self.duration_minutes = minutes,
            FieldValue::SortOrder(order) => self.sort_order = order,
            FieldValue::LaterSince(since) => self.later_since = since,
        }
    }
}

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    title: String,
    description: Option<String>,
    status: TaskStatus,
    duration_minutes: u32,
}

impl NewTask {
    /// Default planned length of a new task.
    pub const DEFAULT_DURATION_MINUTES: u32 = 30;

    /// Creates an Inbox task request.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::Inbox,
            duration_minutes: Self::DEFAULT_DURATION_MINUTES,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the planned duration in minutes.
    #[must_use]
    pub const fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Places the new task straight into Next instead of the Inbox.
    #[must_use]
    pub const fn into_next(mut self) -> Self {
        self.status = TaskStatus::Next;
        self
    }

    /// Returns the requested title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the requested description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the requested initial status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the requested duration in minutes.
    #[must_use]
    pub const fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }
}
