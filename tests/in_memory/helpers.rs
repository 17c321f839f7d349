//! Shared test helpers for board integration tests.

use chrono::{NaiveDate, NaiveTime, Utc};
use mockable::DefaultClock;
use nextslot::{
    board::{
        adapters::memory::InMemoryTaskApi,
        domain::{Container, PersistedTaskData, Priority, Schedule, Task, TaskId, TaskStatus},
        services::{BoardService, PersistenceEvent},
    },
    config::BoardConfig,
};
use rstest::fixture;
use std::io;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

/// Service type used by the integration tests.
pub type TestBoardService = BoardService<InMemoryTaskApi, DefaultClock>;

/// Provides a tokio runtime for async operations in tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
#[fixture]
pub fn runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Configuration with short timings and no retries.
#[fixture]
pub fn config() -> BoardConfig {
    BoardConfig::from_toml_str(
        "[persistence]\ndebounce_ms = 20\nretry_delay_ms = 1\nmax_retries = 0\n",
    )
    .expect("test config parses")
}

/// Builds a persisted task in a list container.
pub fn listed(title: &str, status: TaskStatus, priority: u8, sort_order: i64) -> Task {
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        title: title.to_owned(),
        description: None,
        status,
        priority: Priority::new(priority).expect("valid priority"),
        schedule: None,
        duration_minutes: 30,
        sort_order,
        later_since: (status == TaskStatus::Later).then(Utc::now),
    })
}

/// Builds a persisted task scheduled at `time` on [`day`].
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

/// Creates a service over `api` and loads the board.
pub async fn load_board(api: &InMemoryTaskApi, config: BoardConfig) -> TestBoardService {
    let service = BoardService::new(Arc::new(api.clone()), Arc::new(DefaultClock), config);
    service.load().await.expect("board loads");
    api.clear_calls();
    service
}

/// Titles of a service-side container in display order.
pub fn titles(service: &TestBoardService, container: Container) -> Vec<String> {
    service
        .members(container)
        .iter()
        .map(|task| task.title().to_owned())
        .collect()
}

/// Drains every event already broadcast.
pub fn drain(events: &mut broadcast::Receiver<PersistenceEvent>) -> Vec<PersistenceEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// A fixed calendar day used by slot tests.
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

/// A wall-clock time on [`day`].
pub fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}
