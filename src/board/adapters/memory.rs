//! In-memory implementation of the [`TaskMutationApi`] port.
//!
//! Emulates the task service closely enough for tests: it enforces the
//! Inbox and Next caps, keeps a log of every call it received, and can be
//! told to fail calls to exercise retry and rollback paths.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::board::{
    domain::{
        CapacityLimits, Container, FieldValue, NewTask, Task, TaskField, TaskId, TaskPatch,
        TaskStatus,
    },
    ports::{PriorityUpdate, TaskMutationApi, TaskMutationError, TaskMutationResult},
};

/// One call received by the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// `update_task`.
    UpdateTask(TaskId, TaskPatch),
    /// `make_next`.
    MakeNext(TaskId),
    /// `move_to_inbox`.
    MoveToInbox(TaskId),
    /// `batch_update_priority`.
    BatchUpdatePriority(Vec<PriorityUpdate>),
    /// `refresh_tasks`.
    RefreshTasks,
    /// `create_task`.
    CreateTask(String),
}

/// Transport failure raised by failure injection.
#[derive(Debug)]
struct SimulatedOutage;

impl fmt::Display for SimulatedOutage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("simulated network outage")
    }
}

impl std::error::Error for SimulatedOutage {}

/// Lock failure inside the adapter, surfaced as a transport error.
#[derive(Debug)]
struct PoisonedState(String);

impl fmt::Display for PoisonedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock poisoned: {}", self.0)
    }
}

impl std::error::Error for PoisonedState {}

/// Thread-safe in-memory task service.
///
/// # Example
///
/// ```
/// use nextslot::board::adapters::memory::InMemoryTaskApi;
///
/// let api = InMemoryTaskApi::new();
/// assert!(api.tasks().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskApi {
    state: Arc<RwLock<InMemoryState>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    tasks: BTreeMap<TaskId, Task>,
    capacity: CapacityLimits,
    calls: Vec<RecordedCall>,
    failures_remaining: usize,
    offline: bool,
}

impl InMemoryState {
    fn count(&self, status: TaskStatus) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status() == status)
            .count()
    }

    fn check_outage(&mut self) -> TaskMutationResult<()> {
        if self.offline {
            return Err(TaskMutationError::transport(SimulatedOutage));
        }
        if self.failures_remaining > 0 {
            self.failures_remaining = self.failures_remaining.saturating_sub(1);
            return Err(TaskMutationError::transport(SimulatedOutage));
        }
        Ok(())
    }

    /// Rejects moving `task_id` into a full capped container.
    fn check_room(&self, task_id: Option<TaskId>, status: TaskStatus) -> TaskMutationResult<()> {
        let already_there = task_id
            .and_then(|id| self.tasks.get(&id))
            .is_some_and(|task| task.status() == status);
        if already_there {
            return Ok(());
        }
        let (container, error) = match status {
            TaskStatus::Inbox => (Container::Inbox, TaskMutationError::InboxFull),
            TaskStatus::Next => (Container::Next, TaskMutationError::NextFull),
            _ => return Ok(()),
        };
        match self.capacity.of(container) {
            Some(capacity) if self.count(status) >= capacity => Err(error),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, task_id: TaskId, status: TaskStatus) -> TaskMutationResult<Task> {
        self.check_room(Some(task_id), status)?;
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(TaskMutationError::NotFound(task_id))?;
        task.apply(&FieldValue::Status(status));
        normalize(task);
        Ok(task.clone())
    }

    fn next_sort_order(&self, status: TaskStatus) -> i64 {
        self.tasks
            .values()
            .filter(|task| task.status() == status)
            .map(Task::sort_order)
            .max()
            .map_or(0, |last| last.saturating_add(1))
    }
}

/// Clears fields that only make sense for certain statuses.
fn normalize(task: &mut Task) {
    if task.status() != TaskStatus::Scheduled {
        task.apply(&FieldValue::Schedule(None));
    }
    if task.status() != TaskStatus::Later {
        task.apply(&FieldValue::LaterSince(None));
    }
}

impl InMemoryTaskApi {
    /// Creates an empty service with default caps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service enforcing the given caps.
    #[must_use]
    pub fn with_capacity(capacity: CapacityLimits) -> Self {
        let api = Self::default();
        if let Ok(mut state) = api.state.write() {
            state.capacity = capacity;
        }
        api
    }

    /// Creates a service pre-populated with tasks.
    #[must_use]
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let api = Self::new();
        api.seed(tasks);
        api
    }

    /// Inserts or replaces tasks without recording a call. Capacity is not
    /// checked.
    pub fn seed(&self, tasks: impl IntoIterator<Item = Task>) {
        if let Ok(mut state) = self.state.write() {
            for task in tasks {
                state.tasks.insert(task.id(), task);
            }
        }
    }

    /// Returns every stored task in identifier order.
    ///
    /// Returns an empty list if the internal lock is poisoned.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state
            .read()
            .map(|state| state.tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a stored task.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<Task> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.tasks.get(&task_id).cloned())
    }

    /// Returns the calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .read()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.write() {
            state.calls.clear();
        }
    }

    /// Makes the next `count` calls fail with a transport error.
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut state) = self.state.write() {
            state.failures_remaining = count;
        }
    }

    /// Makes every call fail with a transport error until switched back.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.write() {
            state.offline = offline;
        }
    }

    fn with_state<T>(
        &self,
        call: RecordedCall,
        operation: impl FnOnce(&mut InMemoryState) -> TaskMutationResult<T>,
    ) -> TaskMutationResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|e| TaskMutationError::transport(PoisonedState(e.to_string())))?;
        state.calls.push(call);
        state.check_outage()?;
        operation(&mut state)
    }
}

#[async_trait]
impl TaskMutationApi for InMemoryTaskApi {
    async fn update_task(&self, task_id: TaskId, patch: TaskPatch) -> TaskMutationResult<Task> {
        self.with_state(RecordedCall::UpdateTask(task_id, patch.clone()), |state| {
            if let Some(FieldValue::Status(status)) = patch.get(TaskField::Status) {
                state.check_room(Some(task_id), *status)?;
            }
            let task = state
                .tasks
                .get_mut(&task_id)
                .ok_or(TaskMutationError::NotFound(task_id))?;
            patch.apply_to(task);
            normalize(task);
            Ok(task.clone())
        })
    }

    async fn make_next(&self, task_id: TaskId) -> TaskMutationResult<Task> {
        self.with_state(RecordedCall::MakeNext(task_id), |state| {
            state.transition(task_id, TaskStatus::Next)
        })
    }

    async fn move_to_inbox(&self, task_id: TaskId) -> TaskMutationResult<Task> {
        self.with_state(RecordedCall::MoveToInbox(task_id), |state| {
            state.transition(task_id, TaskStatus::Inbox)
        })
    }

    async fn batch_update_priority(&self, updates: Vec<PriorityUpdate>) -> TaskMutationResult<()> {
        self.with_state(
            RecordedCall::BatchUpdatePriority(updates.clone()),
            |state| {
                if let Some(missing) = updates
                    .iter()
                    .find(|update| !state.tasks.contains_key(&update.task_id))
                {
                    return Err(TaskMutationError::NotFound(missing.task_id));
                }
                for update in &updates {
                    if let Some(task) = state.tasks.get_mut(&update.task_id) {
                        task.apply(&FieldValue::Priority(update.priority));
                    }
                }
                Ok(())
            },
        )
    }

    async fn refresh_tasks(&self) -> TaskMutationResult<Vec<Task>> {
        self.with_state(RecordedCall::RefreshTasks, |state| {
            Ok(state.tasks.values().cloned().collect())
        })
    }

    async fn create_task(&self, request: &NewTask) -> TaskMutationResult<Task> {
        self.with_state(
            RecordedCall::CreateTask(request.title().to_owned()),
            |state| {
                state.check_room(None, request.status())?;
                let sort_order = state.next_sort_order(request.status());
                let task = Task::from_new(TaskId::new(), request, sort_order);
                state.tasks.insert(task.id(), task.clone());
                Ok(task)
            },
        )
    }
}
