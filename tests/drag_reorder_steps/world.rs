//! Shared world state for drag-and-drop reorder BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use nextslot::{
    board::{
        adapters::memory::InMemoryTaskApi,
        domain::{BoardSnapshot, Container, DragUpdate, TaskId},
        services::{BoardService, BoardServiceError, PersistenceEvent},
        store::RefreshOutcome,
    },
    config::BoardConfig,
};
use rstest::fixture;
use tokio::sync::broadcast;

/// Service type used by the BDD world.
pub type TestBoardService = BoardService<InMemoryTaskApi, DefaultClock>;

/// Scenario world for drag-and-drop behaviour tests.
pub struct DragReorderWorld {
    pub api: InMemoryTaskApi,
    pub service: TestBoardService,
    pub events: broadcast::Receiver<PersistenceEvent>,
    pub before_drop: Option<BoardSnapshot>,
    pub last_drop: Option<Result<DragUpdate, BoardServiceError>>,
    pub last_refresh: Option<RefreshOutcome>,
}

impl DragReorderWorld {
    /// Creates a world over an empty in-memory task service.
    ///
    /// # Panics
    ///
    /// Panics if the built-in test configuration is rejected.
    #[must_use]
    pub fn new() -> Self {
        let config = BoardConfig::from_toml_str(
            "[persistence]\ndebounce_ms = 20\nretry_delay_ms = 1\nmax_retries = 0\n",
        )
        .expect("scenario config parses");
        let api = InMemoryTaskApi::new();
        let service = BoardService::new(Arc::new(api.clone()), Arc::new(DefaultClock), config);
        let events = service.events();
        Self {
            api,
            service,
            events,
            before_drop: None,
            last_drop: None,
            last_refresh: None,
        }
    }

    /// Finds a loaded task by title.
    ///
    /// # Errors
    ///
    /// Returns an error when no task has that title.
    pub fn task_id(&self, title: &str) -> Result<TaskId, eyre::Report> {
        self.service
            .store()
            .snapshot()
            .tasks()
            .find(|task| task.title() == title)
            .map(|task| task.id())
            .ok_or_else(|| eyre::eyre!("no task titled {title:?} on the board"))
    }

    /// Titles of a container in display order.
    #[must_use]
    pub fn titles(&self, container: Container) -> Vec<String> {
        self.service
            .members(container)
            .iter()
            .map(|task| task.title().to_owned())
            .collect()
    }
}

impl Default for DragReorderWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> DragReorderWorld {
    DragReorderWorld::default()
}

/// Maps a container name used in feature files.
///
/// # Errors
///
/// Returns an error for names that are not list containers.
pub fn container_named(name: &str) -> Result<Container, eyre::Report> {
    match name {
        "inbox" => Ok(Container::Inbox),
        "next" => Ok(Container::Next),
        "later" => Ok(Container::Later),
        "backlog" => Ok(Container::Backlog),
        "roadmap" => Ok(Container::Roadmap),
        other => Err(eyre::eyre!("unknown container {other:?}")),
    }
}

/// Splits a comma-separated list from a feature file.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
