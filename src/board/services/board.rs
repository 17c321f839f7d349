//! Board orchestration: pointer input, button actions and refreshes.

use super::{
    BoardServiceError, BoardServiceResult, DebounceKey, PersistenceEvent, PersistenceScheduler,
    SchedulerSettings,
};
use crate::board::{
    domain::{
        BoardDomainError, BoardSnapshot, Container, DragSession, DragUpdate, DropDescriptor,
        DropTarget, FieldValue, NewTask, PointerEvent, Priority, ReorderEngine, ReorderPlan,
        SlotKey, Task, TaskId, TaskStatus,
    },
    ports::{TaskMutationApi, TaskMutationError},
    store::{ReconciliationGuard, RefreshOutcome, StoreError, TaskStore},
};
use crate::config::BoardConfig;
use chrono::{Days, NaiveDate};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tracing::{debug, instrument, warn};

/// Board orchestration service.
pub struct BoardService<A, C>
where
    A: TaskMutationApi + 'static,
    C: Clock + Send + Sync,
{
    api: Arc<A>,
    clock: Arc<C>,
    config: BoardConfig,
    engine: ReorderEngine,
    store: Arc<TaskStore>,
    guard: Arc<ReconciliationGuard>,
    scheduler: PersistenceScheduler<A>,
    drag: Mutex<DragSession>,
}

impl<A, C> BoardService<A, C>
where
    A: TaskMutationApi + 'static,
    C: Clock + Send + Sync,
{
    /// Creates a service with an empty board. Call [`Self::load`] to fill it.
    #[must_use]
    pub fn new(api: Arc<A>, clock: Arc<C>, config: BoardConfig) -> Self {
        let store = Arc::new(TaskStore::new(BoardSnapshot::new(config.slot_grid())));
        let guard = Arc::new(ReconciliationGuard::new());
        let scheduler = PersistenceScheduler::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&guard),
            SchedulerSettings {
                debounce: config.debounce(),
                retry_delay: config.retry_delay(),
                max_retries: config.persistence.max_retries,
                event_buffer: config.persistence.event_buffer,
                capacity: config.capacity_limits(),
            },
        );
        Self {
            api,
            clock,
            engine: ReorderEngine::new(config.capacity_limits()),
            drag: Mutex::new(DragSession::new(config.drag_settings())),
            config,
            store,
            guard,
            scheduler,
        }
    }

    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Returns the reconciliation guard.
    #[must_use]
    pub const fn guard(&self) -> &Arc<ReconciliationGuard> {
        &self.guard
    }

    /// Returns the persistence scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &PersistenceScheduler<A> {
        &self.scheduler
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Subscribes to persistence outcomes.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.scheduler.subscribe()
    }

    /// Subscribes to board revisions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.store.subscribe()
    }

    /// Returns a container's tasks in display order.
    #[must_use]
    pub fn members(&self, container: Container) -> Vec<Task> {
        self.store.members(container)
    }

    /// Returns the occupied slots of one day.
    #[must_use]
    pub fn day_slots(&self, date: NaiveDate) -> BTreeMap<SlotKey, Vec<Task>> {
        self.slots_between(date, date)
    }

    /// Returns the occupied slots of the seven days starting at `first_day`.
    #[must_use]
    pub fn week_slots(&self, first_day: NaiveDate) -> BTreeMap<SlotKey, Vec<Task>> {
        let last_day = first_day
            .checked_add_days(Days::new(6))
            .unwrap_or(NaiveDate::MAX);
        self.slots_between(first_day, last_day)
    }

    fn slots_between(&self, from: NaiveDate, to: NaiveDate) -> BTreeMap<SlotKey, Vec<Task>> {
        self.store
            .snapshot()
            .slots_between(from, to)
            .into_iter()
            .map(|(slot, tasks)| (slot, tasks.into_iter().cloned().collect()))
            .collect()
    }

    /// Replaces the board with the server state, ignoring the guard.
    ///
    /// Intended for start-up, before any local change exists.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError`] when the fetch fails.
    #[instrument(skip(self))]
    pub async fn load(&self) -> BoardServiceResult<usize> {
        let tasks = self
            .api
            .refresh_tasks()
            .await
            .map_err(|err| self.mutation_error(err))?;
        let count = tasks.len();
        self.store
            .replace(BoardSnapshot::from_tasks(tasks, self.config.slot_grid()));
        debug!(count, "board loaded");
        Ok(count)
    }

    /// Fetches the server state and merges it into every scope that is not
    /// held by a pending batch or an active drag.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError`] when the fetch fails.
    pub async fn refresh(&self) -> BoardServiceResult<RefreshOutcome> {
        self.scheduler.refresh().await
    }

    /// Applies a single pushed task from the server unless its scope is
    /// held. Returns `false` when the update was deferred.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::Store`] if the guard lock is poisoned.
    pub fn apply_server_task(&self, task: Task) -> BoardServiceResult<bool> {
        let mut scopes = vec![task.status()];
        scopes.extend(self.store.task(task.id()).as_ref().map(Task::status));
        for scope in scopes {
            match self.guard.admit(scope) {
                Ok(()) => {}
                Err(StoreError::ConcurrentModification { scope: held }) => {
                    debug!(%held, task = %task.id(), "server update deferred");
                    self.guard.mark_stale(&[held].into())?;
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.store.upsert(task);
        Ok(true)
    }

    /// Feeds a pointer event to the drag session.
    ///
    /// A drop is applied at once. A drop the board cannot take is logged and
    /// reported as [`DragUpdate::Cancelled`]; capacity violations are
    /// returned as errors so the caller can tell the user.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError`] when a drop exceeds a capacity cap or
    /// the store rejects it.
    #[instrument(skip(self))]
    pub fn handle_pointer(&self, event: PointerEvent) -> BoardServiceResult<DragUpdate> {
        let now = self.clock.utc();
        let update = self
            .drag
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?
            .handle(event, now);
        match update {
            DragUpdate::Started { source, target, .. } => {
                let over = target.map(|candidate| candidate.container.status());
                self.guard
                    .set_dragging(std::iter::once(source.status()).chain(over))?;
            }
            DragUpdate::Over(Some(target)) => {
                self.guard.set_dragging([target.container.status()])?;
            }
            DragUpdate::Dropped(descriptor) => {
                let outcome = self.apply_drop(&descriptor);
                self.guard.clear_dragging()?;
                return match outcome {
                    Ok(()) => Ok(update),
                    Err(BoardServiceError::Domain(BoardDomainError::InvalidDrop(reason))) => {
                        warn!(%reason, task = %descriptor.task_id, "drop ignored");
                        Ok(DragUpdate::Cancelled)
                    }
                    Err(err) => Err(err),
                };
            }
            DragUpdate::Clicked(_) | DragUpdate::Cancelled => self.guard.clear_dragging()?,
            DragUpdate::Unchanged | DragUpdate::Armed | DragUpdate::Over(None) => {}
        }
        Ok(update)
    }

    /// Applies a committed drop and schedules its persistence.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::Domain`] when the engine rejects the
    /// drop; the store is unchanged in that case.
    pub fn apply_drop(&self, descriptor: &DropDescriptor) -> BoardServiceResult<()> {
        let plan = self
            .engine
            .apply_drop(&self.store.snapshot(), descriptor)?;
        self.submit_reorder(plan)
    }

    /// Moves a task to an explicit target, as a drop without a gesture.
    ///
    /// # Errors
    ///
    /// Same as [`Self::apply_drop`].
    pub fn move_task(&self, task_id: TaskId, target: DropTarget) -> BoardServiceResult<()> {
        let (source, source_index) = self
            .store
            .snapshot()
            .position_of(task_id)
            .ok_or(BoardDomainError::TaskNotFound(task_id))?;
        self.apply_drop(&DropDescriptor {
            task_id,
            source,
            source_index,
            destination: target.container,
            destination_index: target.index,
            evict: target.evict,
            at: self.clock.utc(),
        })
    }

    /// Creates a task on the server and adds it to the board.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidDuration`] for a zero duration and
    /// [`BoardDomainError::CapacityExceeded`] when the target container is
    /// full, locally or on the server.
    #[instrument(skip(self, request), fields(title = request.title()))]
    pub async fn create_task(&self, request: NewTask) -> BoardServiceResult<Task> {
        if request.duration_minutes() == 0 {
            return Err(BoardDomainError::InvalidDuration.into());
        }
        let minutes = self
            .config
            .slot_grid()
            .round_duration(request.duration_minutes());
        let container = match request.status() {
            TaskStatus::Next => Container::Next,
            _ => Container::Inbox,
        };
        self.engine
            .ensure_room(&self.store.snapshot(), container)?;
        let task = self
            .api
            .create_task(&request.with_duration(minutes))
            .await
            .map_err(|err| self.mutation_error(err))?;
        self.store.upsert(task.clone());
        Ok(task)
    }

    /// Makes a task the Next focus, swapping out `evict` when Next is full.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::CapacityExceeded`] when Next is occupied
    /// and no eviction is given.
    pub fn make_next(&self, task_id: TaskId, evict: Option<TaskId>) -> BoardServiceResult<()> {
        let target = DropTarget::new(Container::Next, 0);
        self.move_task(
            task_id,
            evict.map_or(target, |occupant| target.evicting(occupant)),
        )
    }

    /// Moves a task to the bottom of the Inbox.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::CapacityExceeded`] when the Inbox is full.
    pub fn move_to_inbox(&self, task_id: TaskId) -> BoardServiceResult<()> {
        self.move_task(task_id, DropTarget::new(Container::Inbox, usize::MAX))
    }

    /// Marks a task completed.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::Domain`] for unknown or already
    /// completed tasks.
    pub fn complete(&self, task_id: TaskId) -> BoardServiceResult<()> {
        self.move_task(task_id, DropTarget::new(Container::Completed, usize::MAX))
    }

    /// Defers a task to the bottom of Later.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::Domain`] for unknown or completed tasks.
    pub fn send_to_later(&self, task_id: TaskId) -> BoardServiceResult<()> {
        self.move_task(task_id, DropTarget::new(Container::Later, usize::MAX))
    }

    /// Sets a priority explicitly. The ladder is not re-derived.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidPriority`] outside `1..=4`.
    pub fn set_priority(&self, task_id: TaskId, value: u8) -> BoardServiceResult<()> {
        let priority = Priority::new(value)?;
        let plan =
            self.engine
                .set_field(&self.store.snapshot(), task_id, FieldValue::Priority(priority))?;
        self.submit(DebounceKey::task(task_id), plan)
    }

    /// Sets a duration, rounded up to the slot granularity.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::InvalidDuration`] for zero minutes.
    pub fn set_duration(&self, task_id: TaskId, minutes: u32) -> BoardServiceResult<()> {
        if minutes == 0 {
            return Err(BoardDomainError::InvalidDuration.into());
        }
        let rounded = self.config.slot_grid().round_duration(minutes);
        let plan =
            self.engine
                .set_field(&self.store.snapshot(), task_id, FieldValue::Duration(rounded))?;
        self.submit(DebounceKey::task(task_id), plan)
    }

    /// Moves every expired Later task to the Backlog and returns how many
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError`] when the store rejects the change.
    #[instrument(skip(self))]
    pub fn expire_later(&self) -> BoardServiceResult<usize> {
        let plan = self.engine.expire_later(
            &self.store.snapshot(),
            self.clock.utc(),
            self.config.later_ttl(),
        )?;
        let expired = plan
            .changes
            .iter()
            .filter(|(_, change)| change.before == FieldValue::Status(TaskStatus::Later))
            .count();
        self.submit_reorder(plan)?;
        Ok(expired)
    }

    /// Dispatches every parked batch immediately.
    pub async fn flush(&self) {
        self.scheduler.flush().await;
    }

    fn submit_reorder(&self, plan: ReorderPlan) -> BoardServiceResult<()> {
        let key = DebounceKey::reorder(&plan.scopes);
        self.submit(key, plan)
    }

    fn submit(&self, key: DebounceKey, plan: ReorderPlan) -> BoardServiceResult<()> {
        if plan.is_empty() {
            return Ok(());
        }
        self.scheduler.submit(key, plan)?;
        Ok(())
    }

    fn mutation_error(&self, err: TaskMutationError) -> BoardServiceError {
        BoardServiceError::from_mutation(err, self.config.capacity_limits())
    }
}
