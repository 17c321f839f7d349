//! Containers partition the board; membership is derived from task fields.

use super::{Schedule, Task, TaskStatus};
use chrono::{NaiveDate, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a container orders its members and what a reorder rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderingStrategy {
    /// Position drives the priority ladder and `sort_order`.
    Ladder,
    /// Position drives a sub-slot time offset within one calendar slot.
    TimeSlot,
    /// Append-only; members keep their order and new arrivals go last.
    Append,
}

/// One calendar slot: a date plus the slot's start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    date: NaiveDate,
    start: NaiveTime,
}

impl SlotKey {
    /// Creates a slot key. `start` should be aligned to the slot grid.
    #[must_use]
    pub const fn new(date: NaiveDate, start: NaiveTime) -> Self {
        Self { date, start }
    }

    /// Returns the slot date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the slot start time.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.start.format("%H:%M"))
    }
}

/// Calendar granularity and the sub-slot offset used to keep side-by-side
/// tasks in a stable order across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    slot_minutes: u32,
    sub_slot_offset_ms: u32,
}

impl SlotGrid {
    /// Creates a grid. Callers validate that both values are positive and
    /// that the offset is shorter than a slot.
    #[must_use]
    pub const fn new(slot_minutes: u32, sub_slot_offset_ms: u32) -> Self {
        Self {
            slot_minutes,
            sub_slot_offset_ms,
        }
    }

    /// Returns the slot length in minutes.
    #[must_use]
    pub const fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    /// Returns the sub-slot offset in milliseconds.
    #[must_use]
    pub const fn sub_slot_offset_ms(&self) -> u32 {
        self.sub_slot_offset_ms
    }

    const fn slot_seconds(&self) -> u32 {
        self.slot_minutes.saturating_mul(60)
    }

    /// Returns the slot containing a scheduled time.
    #[must_use]
    pub fn slot_of(&self, schedule: Schedule) -> SlotKey {
        let seconds = schedule.time().num_seconds_from_midnight();
        let into_slot = seconds.checked_rem(self.slot_seconds()).unwrap_or(0);
        let start = NaiveTime::from_num_seconds_from_midnight_opt(seconds - into_slot, 0)
            .unwrap_or(NaiveTime::MIN);
        SlotKey::new(schedule.date(), start)
    }

    /// Returns the effective time of the task at `index` within `slot`, or
    /// `None` when the offset would spill into the next slot.
    ///
    /// This is the only time a laid-out slot member can have; any minutes
    /// past the slot start are not preserved.
    #[must_use]
    pub fn offset_time(&self, slot: SlotKey, index: usize) -> Option<NaiveTime> {
        let steps = u64::try_from(index).ok()?;
        let offset_ms = u64::from(self.sub_slot_offset_ms).checked_mul(steps)?;
        let slot_ms = u64::from(self.slot_seconds()).saturating_mul(1000);
        if offset_ms >= slot_ms {
            return None;
        }
        let delta = TimeDelta::milliseconds(i64::try_from(offset_ms).ok()?);
        let (time, _) = slot.start().overflowing_add_signed(delta);
        Some(time)
    }

    /// Rounds a duration up to a whole number of slots.
    #[must_use]
    pub const fn round_duration(&self, minutes: u32) -> u32 {
        let slot = self.slot_minutes;
        if slot == 0 {
            return minutes;
        }
        minutes.div_ceil(slot).saturating_mul(slot)
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::new(30, 6_000)
    }
}

/// A named ordered bucket of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "slot", rename_all = "snake_case")]
pub enum Container {
    /// Capped list of pending tasks.
    Inbox,
    /// The single focus slot.
    Next,
    /// One calendar slot.
    Slot(SlotKey),
    /// Deferred tasks that expire after a TTL.
    Later,
    /// Terminal, append-only list.
    Completed,
    /// Parked tasks.
    Backlog,
    /// Long-term ideas.
    Roadmap,
}

impl Container {
    /// Derives the container a task belongs to.
    ///
    /// A `scheduled` task without a schedule is inconsistent service data; it
    /// is shown in the Backlog so it stays visible without consuming capped
    /// capacity.
    #[must_use]
    pub fn of(task: &Task, grid: &SlotGrid) -> Self {
        match task.status() {
            TaskStatus::Inbox => Self::Inbox,
            TaskStatus::Next => Self::Next,
            TaskStatus::Scheduled => task
                .schedule()
                .map_or(Self::Backlog, |schedule| Self::Slot(grid.slot_of(schedule))),
            TaskStatus::Completed => Self::Completed,
            TaskStatus::Later => Self::Later,
            TaskStatus::Backlog => Self::Backlog,
            TaskStatus::Roadmap => Self::Roadmap,
        }
    }

    /// Returns the status shared by every member.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        match self {
            Self::Inbox => TaskStatus::Inbox,
            Self::Next => TaskStatus::Next,
            Self::Slot(_) => TaskStatus::Scheduled,
            Self::Later => TaskStatus::Later,
            Self::Completed => TaskStatus::Completed,
            Self::Backlog => TaskStatus::Backlog,
            Self::Roadmap => TaskStatus::Roadmap,
        }
    }

    /// Returns the ordering strategy of this container.
    #[must_use]
    pub const fn strategy(&self) -> OrderingStrategy {
        match self {
            Self::Slot(_) => OrderingStrategy::TimeSlot,
            Self::Completed => OrderingStrategy::Append,
            Self::Inbox | Self::Next | Self::Later | Self::Backlog | Self::Roadmap => {
                OrderingStrategy::Ladder
            }
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(slot) => write!(f, "slot {slot}"),
            other => f.write_str(other.status().as_str()),
        }
    }
}
