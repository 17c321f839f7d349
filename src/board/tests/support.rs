//! Shared builders and a controllable clock for board tests.

use crate::board::domain::{
    BoardSnapshot, Container, PersistedTaskData, Priority, Schedule, SlotGrid, SlotKey, Task,
    TaskId, TaskStatus,
};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use std::sync::Mutex;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, step: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += step;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

pub fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub fn slot(hour: u32, minute: u32) -> Container {
    Container::Slot(SlotKey::new(day(), at(hour, minute)))
}

pub fn priority(value: u8) -> Priority {
    Priority::new(value).expect("valid priority")
}

/// Builds a task in a ladder container.
pub fn task(title: &str, status: TaskStatus, rung: u8, sort_order: i64) -> Task {
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        title: title.to_owned(),
        description: None,
        status,
        priority: priority(rung),
        schedule: None,
        duration_minutes: 30,
        sort_order,
        later_since: (status == TaskStatus::Later).then(epoch),
    })
}

/// Builds a task scheduled at `time` on [`day`].
pub fn scheduled(title: &str, time: NaiveTime, sort_order: i64) -> Task {
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        title: title.to_owned(),
        description: None,
        status: TaskStatus::Scheduled,
        priority: Priority::default(),
        schedule: Some(Schedule::new(day(), time)),
        duration_minutes: 30,
        sort_order,
        later_since: None,
    })
}

pub fn board(tasks: impl IntoIterator<Item = Task>) -> BoardSnapshot {
    BoardSnapshot::from_tasks(tasks, SlotGrid::default())
}

/// Titles of a container's members in display order.
pub fn titles(snapshot: &BoardSnapshot, container: Container) -> Vec<String> {
    snapshot
        .members(container)
        .iter()
        .map(|task| task.title().to_owned())
        .collect()
}

/// Priorities of a container's members in display order.
pub fn rungs(snapshot: &BoardSnapshot, container: Container) -> Vec<u8> {
    snapshot
        .members(container)
        .iter()
        .map(|task| task.priority().value())
        .collect()
}
