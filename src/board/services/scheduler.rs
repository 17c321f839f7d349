//! Debounced, batched persistence of optimistic board changes.
//!
//! A submission is applied to the store at once and then parked under its
//! [`DebounceKey`]. A later submission composes into every parked batch on
//! the same key or touching one of its scopes, restarting the timer, so
//! parked batches never share a scope. When the timer fires the batch is
//! dispatched in two phases:
//!
//! 1. Status transitions, one call at a time: plain `update_task` status
//!    changes first, then a Next occupant being swapped into the Inbox is
//!    staged in the Backlog, then `make_next`, then `move_to_inbox`. A
//!    task therefore always leaves a capped container before another
//!    enters it.
//! 2. Everything else concurrently: one `batch_update_priority` call plus
//!    one `update_task` patch per task.
//!
//! Dispatch holds a gate per scope, so batches touching a common scope
//! reach the service one after another.
//!
//! A failed call is retried after a fixed delay when the error is
//! transient. If the batch still fails, the inverse of the whole batch,
//! together with every parked batch touching its scopes, is applied to the
//! store and a [`PersistenceEvent::RolledBack`] is broadcast.

use super::{BoardServiceError, error::BoardServiceResult};
use crate::board::{
    domain::{
        CapacityLimits, ChangeSet, FieldValue, ReorderPlan, TaskField, TaskId, TaskPatch,
        TaskStatus,
    },
    ports::{PriorityUpdate, TaskMutationApi, TaskMutationError, TaskMutationResult},
    store::{ReconciliationGuard, RefreshOutcome, StoreError, TaskStore},
};
use futures::future::{join, join_all};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Coalescing key for debounced batches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebounceKey(String);

impl DebounceKey {
    /// Creates a key from an arbitrary label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Key shared by reorders touching exactly these container scopes.
    #[must_use]
    pub fn reorder(scopes: &BTreeSet<TaskStatus>) -> Self {
        let names: Vec<&str> = scopes.iter().map(|scope| scope.as_str()).collect();
        Self(format!("reorder:{}", names.join("+")))
    }

    /// Key for edits of a single task.
    #[must_use]
    pub fn task(task_id: TaskId) -> Self {
        Self(format!("task:{task_id}"))
    }

    /// Returns the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DebounceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome notifications broadcast by the scheduler.
#[derive(Debug, Clone)]
pub enum PersistenceEvent {
    /// A parked batch absorbed a newer submission.
    Superseded {
        /// Key of the batch.
        key: DebounceKey,
    },
    /// A batch reached the task service.
    Persisted {
        /// Key of the batch.
        key: DebounceKey,
        /// Number of field changes shipped.
        changes: usize,
    },
    /// A batch failed and its changes were reverted locally.
    RolledBack {
        /// Key of the batch.
        key: DebounceKey,
        /// Why persisting failed.
        error: BoardServiceError,
    },
    /// A gated refresh was merged into the store.
    Refreshed(RefreshOutcome),
    /// The refresh after a successful batch failed.
    RefreshFailed(TaskMutationError),
}

/// Timing and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Quiet period before dispatch.
    pub debounce: Duration,
    /// Pause before a retry.
    pub retry_delay: Duration,
    /// Retries per failed call.
    pub max_retries: u32,
    /// Capacity of the event channel.
    pub event_buffer: usize,
    /// Caps used to translate service capacity rejections.
    pub capacity: CapacityLimits,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(600),
            retry_delay: Duration::from_secs(1),
            max_retries: 1,
            event_buffer: 64,
            capacity: CapacityLimits::default(),
        }
    }
}

/// A batch waiting for its debounce timer. Every submission folded into it
/// keeps its own guard hold until the batch settles.
struct ParkedBatch {
    generation: u64,
    changes: ChangeSet,
    holds: Vec<BTreeSet<TaskStatus>>,
    timer: JoinHandle<()>,
}

impl ParkedBatch {
    fn scopes(&self) -> BTreeSet<TaskStatus> {
        self.holds.iter().flatten().copied().collect()
    }
}

struct SchedulerInner<A> {
    api: Arc<A>,
    store: Arc<TaskStore>,
    guard: Arc<ReconciliationGuard>,
    settings: SchedulerSettings,
    parked: Mutex<HashMap<DebounceKey, ParkedBatch>>,
    gates: Mutex<HashMap<TaskStatus, Arc<tokio::sync::Mutex<()>>>>,
    generations: Mutex<u64>,
    events: broadcast::Sender<PersistenceEvent>,
}

/// Debouncing persistence scheduler.
pub struct PersistenceScheduler<A> {
    inner: Arc<SchedulerInner<A>>,
}

impl<A> Clone for PersistenceScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for PersistenceScheduler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceScheduler")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

fn poisoned<T>(err: &std::sync::PoisonError<T>) -> StoreError {
    StoreError::Poisoned(err.to_string())
}

/// Removes the parked batches that must compose with a batch on `key`
/// touching `scopes`, oldest first.
fn take_overlapping(
    parked: &mut HashMap<DebounceKey, ParkedBatch>,
    key: &DebounceKey,
    scopes: &BTreeSet<TaskStatus>,
) -> Vec<(DebounceKey, ParkedBatch)> {
    let keys: Vec<DebounceKey> = parked
        .iter()
        .filter(|&(parked_key, batch)| parked_key == key || !batch.scopes().is_disjoint(scopes))
        .map(|(parked_key, _)| parked_key.clone())
        .collect();
    let mut taken: Vec<(DebounceKey, ParkedBatch)> = keys
        .into_iter()
        .filter_map(|parked_key| {
            parked
                .remove(&parked_key)
                .map(|batch| (parked_key, batch))
        })
        .collect();
    taken.sort_by_key(|(_, batch)| batch.generation);
    taken
}

impl<A> PersistenceScheduler<A>
where
    A: TaskMutationApi + 'static,
{
    /// Creates a scheduler writing through `api` and reverting into `store`.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        store: Arc<TaskStore>,
        guard: Arc<ReconciliationGuard>,
        settings: SchedulerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        Self {
            inner: Arc::new(SchedulerInner {
                api,
                store,
                guard,
                settings,
                parked: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
                generations: Mutex::new(0),
                events,
            }),
        }
    }

    /// Subscribes to outcome events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the active settings.
    #[must_use]
    pub fn settings(&self) -> SchedulerSettings {
        self.inner.settings
    }

    /// Returns the keys with a parked batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the internal lock is poisoned.
    pub fn parked_keys(&self) -> Result<BTreeSet<DebounceKey>, StoreError> {
        Ok(self.inner.lock_parked()?.keys().cloned().collect())
    }

    /// Applies a plan optimistically and parks it for persistence.
    ///
    /// Must be called from within a Tokio runtime; the debounce timer is a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the plan no longer fits the store. The
    /// store is unchanged in that case.
    #[instrument(skip(self, plan), fields(changes = plan.changes.len()))]
    pub fn submit(&self, key: DebounceKey, plan: ReorderPlan) -> Result<(), StoreError> {
        if plan.is_empty() {
            debug!("nothing to persist");
            return Ok(());
        }
        self.inner.guard.hold(&plan.scopes)?;
        if let Err(err) = self.inner.store.apply(&plan.changes.forward()) {
            self.inner.release(&plan.scopes);
            return Err(err);
        }

        let generation = self.inner.next_generation()?;
        let mut parked = self.inner.lock_parked()?;
        let mut changes = ChangeSet::new();
        let mut holds = Vec::new();
        for (absorbed, previous) in take_overlapping(&mut parked, &key, &plan.scopes) {
            previous.timer.abort();
            self.inner
                .emit(PersistenceEvent::Superseded { key: absorbed });
            changes = changes.compose(previous.changes);
            holds.extend(previous.holds);
        }
        changes = changes.compose(plan.changes);
        holds.push(plan.scopes);

        let worker = self.clone();
        let timer_key = key.clone();
        let debounce = self.inner.settings.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            worker.dispatch_parked(timer_key, Some(generation)).await;
        });
        parked.insert(
            key,
            ParkedBatch {
                generation,
                changes,
                holds,
                timer,
            },
        );
        Ok(())
    }

    /// Dispatches every parked batch now, skipping the debounce wait.
    pub async fn flush(&self) {
        let keys: Vec<DebounceKey> = match self.inner.lock_parked() {
            Ok(parked) => parked.keys().cloned().collect(),
            Err(err) => {
                warn!(error = %err, "cannot flush parked batches");
                return;
            }
        };
        for key in keys {
            self.dispatch_parked(key, None).await;
        }
    }

    /// Fetches the server state and merges it into the unheld scopes.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError`] when the fetch or the merge fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> BoardServiceResult<RefreshOutcome> {
        let tasks = self
            .inner
            .api
            .refresh_tasks()
            .await
            .map_err(|err| BoardServiceError::from_mutation(err, self.inner.settings.capacity))?;
        let outcome = self.inner.guard.reconcile(&self.inner.store, tasks)?;
        self.inner
            .emit(PersistenceEvent::Refreshed(outcome.clone()));
        Ok(outcome)
    }

    /// Dispatches the batch parked on `key`. A timer passes the generation
    /// it was started for and gives up once a newer submission replaced it.
    #[instrument(skip(self))]
    async fn dispatch_parked(&self, key: DebounceKey, generation: Option<u64>) {
        loop {
            let Some((current, scopes)) = self.inner.peek_parked(&key) else {
                return;
            };
            if generation.is_some_and(|expected| expected != current) {
                debug!(%key, "timer superseded");
                return;
            }
            let _serial = match self.inner.lock_scopes(&scopes).await {
                Ok(gates) => gates,
                Err(err) => {
                    warn!(error = %err, "cannot serialize dispatch");
                    return;
                }
            };
            // The batch may have grown while waiting for its scopes.
            let Some(batch) = self.inner.take_parked(&key, current) else {
                continue;
            };
            self.settle(key, batch).await;
            return;
        }
    }

    async fn settle(&self, key: DebounceKey, batch: ParkedBatch) {
        let changes = batch.changes.len();
        match self.inner.dispatch(&batch.changes).await {
            Ok(()) => {
                info!(%key, changes, "batch persisted");
                self.inner.release_all(&batch.holds);
                self.inner
                    .emit(PersistenceEvent::Persisted { key, changes });
                if let Err(err) = self.refresh().await {
                    warn!(error = %err, "refresh after persist failed");
                    if let BoardServiceError::Mutation(cause) = err {
                        self.inner.emit(PersistenceEvent::RefreshFailed(cause));
                    }
                }
            }
            Err(err) => self.inner.roll_back(key, batch, err),
        }
    }
}

impl<A> SchedulerInner<A>
where
    A: TaskMutationApi + 'static,
{
    fn lock_parked(&self) -> Result<MutexGuard<'_, HashMap<DebounceKey, ParkedBatch>>, StoreError> {
        self.parked.lock().map_err(|e| poisoned(&e))
    }

    fn next_generation(&self) -> Result<u64, StoreError> {
        let mut counter = self.generations.lock().map_err(|e| poisoned(&e))?;
        *counter = counter.wrapping_add(1);
        Ok(*counter)
    }

    /// Locks the dispatch gate of every scope, in scope order.
    async fn lock_scopes(
        &self,
        scopes: &BTreeSet<TaskStatus>,
    ) -> Result<Vec<OwnedMutexGuard<()>>, StoreError> {
        let gates: Vec<Arc<tokio::sync::Mutex<()>>> = {
            let mut registry = self.gates.lock().map_err(|e| poisoned(&e))?;
            scopes
                .iter()
                .map(|scope| Arc::clone(registry.entry(*scope).or_default()))
                .collect()
        };
        let mut held = Vec::with_capacity(gates.len());
        for gate in gates {
            held.push(gate.lock_owned().await);
        }
        Ok(held)
    }

    fn peek_parked(&self, key: &DebounceKey) -> Option<(u64, BTreeSet<TaskStatus>)> {
        match self.lock_parked() {
            Ok(parked) => parked
                .get(key)
                .map(|batch| (batch.generation, batch.scopes())),
            Err(err) => {
                warn!(error = %err, "cannot read parked batch");
                None
            }
        }
    }

    fn take_parked(&self, key: &DebounceKey, generation: u64) -> Option<ParkedBatch> {
        let mut parked = match self.lock_parked() {
            Ok(parked) => parked,
            Err(err) => {
                warn!(error = %err, "cannot take parked batch");
                return None;
            }
        };
        if parked.get(key)?.generation != generation {
            return None;
        }
        parked.remove(key)
    }

    fn emit(&self, event: PersistenceEvent) {
        if self.events.send(event).is_err() {
            debug!("no persistence event subscribers");
        }
    }

    fn release(&self, scopes: &BTreeSet<TaskStatus>) {
        if let Err(err) = self.guard.release(scopes) {
            warn!(error = %err, "cannot release guard");
        }
    }

    fn release_all(&self, holds: &[BTreeSet<TaskStatus>]) {
        for scopes in holds {
            self.release(scopes);
        }
    }

    fn roll_back(&self, key: DebounceKey, batch: ParkedBatch, cause: TaskMutationError) {
        let mut scopes = batch.scopes();
        let mut changes = batch.changes;
        let mut holds = batch.holds;
        let newer = match self.lock_parked() {
            Ok(mut parked) => take_overlapping(&mut parked, &key, &scopes),
            Err(err) => {
                warn!(error = %err, "cannot collect pending batches");
                Vec::new()
            }
        };
        for (newer_key, pending) in newer {
            pending.timer.abort();
            debug!(%newer_key, "pending batch reverted with the failed one");
            scopes.extend(pending.scopes());
            changes = changes.compose(pending.changes);
            holds.extend(pending.holds);
        }
        if let Err(err) = self.store.apply(&changes.inverse()) {
            warn!(%key, error = %err, "rollback could not be applied");
        }
        self.release_all(&holds);
        if let Err(err) = self.guard.mark_stale(&scopes) {
            warn!(error = %err, "cannot mark scopes stale");
        }
        warn!(%key, error = %cause, "batch rolled back");
        let error = match cause {
            TaskMutationError::Transport(_) => BoardServiceError::NetworkFailure {
                key: key.clone(),
                source: cause,
            },
            other => BoardServiceError::from_mutation(other, self.settings.capacity),
        };
        self.emit(PersistenceEvent::RolledBack { key, error });
    }

    async fn dispatch(&self, changes: &ChangeSet) -> TaskMutationResult<()> {
        let plan = DispatchPlan::from_changes(changes);

        for (task_id, patch) in &plan.plain_transitions {
            self.attempt(|| self.api.update_task(*task_id, patch.clone()))
                .await?;
        }
        for task_id in &plan.staged {
            let staging = TaskPatch::new().with(FieldValue::Status(TaskStatus::Backlog));
            self.attempt(|| self.api.update_task(*task_id, staging.clone()))
                .await?;
        }
        for task_id in &plan.to_next {
            self.attempt(|| self.api.make_next(*task_id)).await?;
        }
        for task_id in &plan.to_inbox {
            self.attempt(|| self.api.move_to_inbox(*task_id)).await?;
        }

        let priorities = async {
            if plan.priorities.is_empty() {
                return Ok(());
            }
            self.attempt(|| self.api.batch_update_priority(plan.priorities.clone()))
                .await
        };
        let patches = join_all(plan.patches.iter().map(|(task_id, patch)| {
            self.attempt(move || self.api.update_task(*task_id, patch.clone()))
        }));
        let (priority_result, patch_results) = join(priorities, patches).await;
        priority_result?;
        for result in patch_results {
            result?;
        }
        Ok(())
    }

    async fn attempt<T, F, Fut>(&self, mut call: F) -> TaskMutationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TaskMutationResult<T>>,
    {
        let mut retries = 0_u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retries < self.settings.max_retries => {
                    retries = retries.saturating_add(1);
                    warn!(error = %err, retries, "task service call failed, retrying");
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// A change set split into port calls.
#[derive(Debug, Default)]
struct DispatchPlan {
    plain_transitions: BTreeMap<TaskId, TaskPatch>,
    /// Next occupants moving to the Inbox while another task takes Next.
    staged: Vec<TaskId>,
    to_next: Vec<TaskId>,
    to_inbox: Vec<TaskId>,
    priorities: Vec<PriorityUpdate>,
    patches: BTreeMap<TaskId, TaskPatch>,
}

impl DispatchPlan {
    fn from_changes(changes: &ChangeSet) -> Self {
        let mut plan = Self::default();
        let mut leaving_next = Vec::new();
        for (task_id, mut patch) in changes.forward_patches() {
            if let Some(FieldValue::Priority(priority)) = patch.take(TaskField::Priority) {
                plan.priorities.push(PriorityUpdate { task_id, priority });
            }
            let status = patch.get(TaskField::Status).copied();
            match status {
                Some(FieldValue::Status(TaskStatus::Inbox)) => {
                    patch.take(TaskField::Status);
                    plan.to_inbox.push(task_id);
                    let before = changes
                        .get(task_id, TaskField::Status)
                        .map(|change| change.before);
                    if before == Some(FieldValue::Status(TaskStatus::Next)) {
                        leaving_next.push(task_id);
                    }
                }
                Some(FieldValue::Status(TaskStatus::Next)) => {
                    patch.take(TaskField::Status);
                    plan.to_next.push(task_id);
                }
                Some(_) => {
                    plan.plain_transitions.insert(task_id, patch);
                    continue;
                }
                None => {}
            }
            if !patch.is_empty() {
                plan.patches.insert(task_id, patch);
            }
        }
        if !plan.to_next.is_empty() {
            plan.staged = leaving_next;
        }
        plan
    }
}
