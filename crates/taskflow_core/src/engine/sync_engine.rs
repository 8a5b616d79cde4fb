//! Optimistic task synchronization engine.
//!
//! # Responsibility
//! - Load the durable local list, then merge remote-only tasks in the
//!   background (local wins on id conflict).
//! - Apply add/update/delete to memory and the durable store synchronously,
//!   then mirror each mutation to the remote source on a spawned task.
//! - Offer an explicit, remote-wins `sync_with_server`.
//!
//! # Invariants
//! - Task ids are unique in memory and in the store; duplicate adds are
//!   rejected before any state changes.
//! - The state lock is never held across an `.await`; each operation computes
//!   its new list from the current one inside a single critical section.
//! - Remote failures only set the error slot; local state is never rolled back.
//! - Update/delete on an unknown id is a silent no-op without a remote call.

use crate::engine::status::{
    EngineSnapshot, StatusReporter, CREATE_SYNC_FAILED, DELETE_SYNC_FAILED, MANUAL_SYNC_FAILED,
    STARTUP_SYNC_FAILED, UPDATE_SYNC_FAILED,
};
use crate::model::patch::TaskPatch;
use crate::model::task::{Task, TaskId};
use crate::remote::source::{DeleteAck, RemoteOperation, RemoteResult, RemoteTaskSource};
use crate::store::task_list::TaskListStore;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Default "quick update" threshold: a completion toggle plus its timestamp.
pub const DEFAULT_QUICK_UPDATE_MAX_FIELDS: usize = 2;

/// Tunable engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Updates touching at most this many fields never raise `loading`.
    pub quick_update_max_fields: usize,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            quick_update_max_fields: DEFAULT_QUICK_UPDATE_MAX_FIELDS,
        }
    }
}

impl SyncPolicy {
    pub fn is_quick_update(&self, patch: &TaskPatch) -> bool {
        patch.field_count() <= self.quick_update_max_fields
    }
}

/// Result of one background remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote call succeeded and its effects were applied.
    Synced,
    /// Remote call failed; the message is the underlying remote error.
    Failed(String),
    /// No remote call was needed (unknown id).
    Skipped,
}

/// Handle on the background half of an engine operation.
///
/// Dropping the handle does not cancel the remote call.
#[derive(Debug)]
pub struct SyncHandle {
    join: Option<JoinHandle<SyncOutcome>>,
}

impl SyncHandle {
    fn skipped() -> Self {
        Self { join: None }
    }

    fn spawned(join: JoinHandle<SyncOutcome>) -> Self {
        Self { join: Some(join) }
    }

    /// Waits for the remote call and its local follow-up to finish.
    pub async fn settled(self) -> SyncOutcome {
        match self.join {
            None => SyncOutcome::Skipped,
            Some(join) => match join.await {
                Ok(outcome) => outcome,
                Err(err) => SyncOutcome::Failed(format!("background sync aborted: {err}")),
            },
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

/// Caller-facing engine error. Remote failures are never reported here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    DuplicateTaskId(TaskId),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTaskId(id) => write!(f, "task id already exists: {id}"),
        }
    }
}

impl Error for EngineError {}

#[derive(Debug, Clone, Copy)]
enum LoadingMode {
    /// Raised when the operation starts, cleared when its call settles.
    Raised,
    /// Never raised; cleared only if the call fails.
    Quiet,
}

struct EngineState {
    tasks: Vec<Task>,
    status: StatusReporter,
    // Ids deleted locally this session; keeps the startup merge from
    // resurrecting them from a remote list fetched before the delete.
    deleted: HashSet<TaskId>,
}

struct EngineInner {
    state: Mutex<EngineState>,
    store: TaskListStore,
    remote: Arc<dyn RemoteTaskSource>,
    policy: SyncPolicy,
}

impl EngineInner {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, operation: &str, tasks: &[Task]) {
        match self.store.save(tasks) {
            Ok(()) => debug!(
                "event=store_write module=engine status=ok operation={} key={} count={}",
                operation,
                self.store.key(),
                tasks.len()
            ),
            Err(err) => error!(
                "event=store_write module=engine status=error operation={} key={} error={}",
                operation,
                self.store.key(),
                err
            ),
        }
    }
}

/// Session-scoped owner of the task list.
///
/// Cloning yields another handle on the same session. All methods that spawn
/// background work must be called from within a tokio runtime.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Starts a session from the durable store's current list.
    ///
    /// `tasks()` reflects the stored list as soon as this returns; the
    /// returned handle settles once the remote merge has finished or failed.
    pub fn start(
        store: TaskListStore,
        remote: Arc<dyn RemoteTaskSource>,
        policy: SyncPolicy,
    ) -> (Self, SyncHandle) {
        let local = store.load();
        Self::with_initial(local, store, remote, policy)
    }

    /// Starts a session from an injected snapshot instead of reading the store.
    pub fn with_initial(
        initial: Vec<Task>,
        store: TaskListStore,
        remote: Arc<dyn RemoteTaskSource>,
        policy: SyncPolicy,
    ) -> (Self, SyncHandle) {
        info!(
            "event=engine_start module=engine status=start key={} local_count={} quick_update_max_fields={}",
            store.key(),
            initial.len(),
            policy.quick_update_max_fields
        );
        let engine = Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    tasks: initial,
                    status: StatusReporter::default(),
                    deleted: HashSet::new(),
                }),
                store,
                remote,
                policy,
            }),
        };
        let handle = engine.merge_remote();
        (engine, handle)
    }

    /// Current task list in display order.
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state().tasks.clone()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.inner
            .state()
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub fn loading(&self) -> bool {
        self.inner.state().status.loading()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state().status.error().map(str::to_string)
    }

    pub fn clear_error(&self) {
        self.inner.state().status.clear_error();
    }

    pub fn policy(&self) -> SyncPolicy {
        self.inner.policy
    }

    /// Consistent copy of tasks, loading and error taken under one lock.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.inner.state();
        EngineSnapshot {
            tasks: state.tasks.clone(),
            loading: state.status.loading(),
            error: state.status.error().map(str::to_string),
        }
    }

    /// Appends `task` locally and persists it, then creates it remotely.
    ///
    /// # Errors
    /// - `DuplicateTaskId` when a task with the same id exists; nothing changes.
    pub fn add_task(&self, task: Task) -> Result<SyncHandle, EngineError> {
        {
            let mut state = self.inner.state();
            if state.tasks.iter().any(|existing| existing.id == task.id) {
                warn!(
                    "event=task_add module=engine status=error task_id={} error_code=duplicate_id",
                    task.id
                );
                return Err(EngineError::DuplicateTaskId(task.id));
            }
            state.status.begin(true);
            state.deleted.remove(&task.id);
            state.tasks.push(task.clone());
            self.inner.persist("add", &state.tasks);
        }
        info!("event=task_add module=engine status=ok task_id={}", task.id);

        let remote = Arc::clone(&self.inner.remote);
        let task_id = task.id;
        Ok(self.spawn_sync(
            RemoteOperation::Create,
            Some(task_id),
            LoadingMode::Raised,
            CREATE_SYNC_FAILED,
            async move { remote.create(&task).await },
            |_, _, _| {},
        ))
    }

    /// Applies `patch` to task `id` locally, then mirrors the full task.
    ///
    /// Quick updates (see `SyncPolicy`) never raise `loading`.
    pub fn update_task(&self, id: TaskId, patch: TaskPatch) -> SyncHandle {
        let quick = self.inner.policy.is_quick_update(&patch);
        let updated = {
            let mut state = self.inner.state();
            let Some(slot) = state.tasks.iter_mut().find(|task| task.id == id) else {
                debug!("event=task_update module=engine status=skipped task_id={id} reason=not_found");
                return SyncHandle::skipped();
            };
            patch.apply_to(slot);
            let updated = slot.clone();
            state.status.begin(!quick);
            self.inner.persist("update", &state.tasks);
            updated
        };
        info!(
            "event=task_update module=engine status=ok task_id={} fields={} quick={}",
            id,
            patch.field_count(),
            quick
        );

        let remote = Arc::clone(&self.inner.remote);
        let loading = if quick {
            LoadingMode::Quiet
        } else {
            LoadingMode::Raised
        };
        self.spawn_sync(
            RemoteOperation::Update,
            Some(id),
            loading,
            UPDATE_SYNC_FAILED,
            async move { remote.update(id, &updated).await },
            |_, _, _| {},
        )
    }

    /// Removes task `id` locally, then deletes it remotely.
    ///
    /// The removal is final: a failed or refused remote delete does not
    /// restore it.
    pub fn delete_task(&self, id: TaskId) -> SyncHandle {
        {
            let mut state = self.inner.state();
            let Some(index) = state.tasks.iter().position(|task| task.id == id) else {
                debug!("event=task_delete module=engine status=skipped task_id={id} reason=not_found");
                return SyncHandle::skipped();
            };
            state.tasks.remove(index);
            state.deleted.insert(id);
            state.status.begin(true);
            self.inner.persist("delete", &state.tasks);
        }
        info!("event=task_delete module=engine status=ok task_id={id}");

        let remote = Arc::clone(&self.inner.remote);
        self.spawn_sync(
            RemoteOperation::Delete,
            Some(id),
            LoadingMode::Raised,
            DELETE_SYNC_FAILED,
            async move { remote.delete(id).await.and_then(DeleteAck::into_result) },
            |_, _, _| {},
        )
    }

    /// Replaces local state with the remote list (remote wins).
    pub fn sync_with_server(&self) -> SyncHandle {
        self.inner.state().status.begin(true);
        info!("event=manual_sync module=engine status=start");

        let remote = Arc::clone(&self.inner.remote);
        self.spawn_sync(
            RemoteOperation::List,
            None,
            LoadingMode::Raised,
            MANUAL_SYNC_FAILED,
            async move { remote.list().await },
            |inner, state, remote_tasks| {
                info!(
                    "event=manual_sync module=engine status=ok replaced={} remote_count={}",
                    state.tasks.len(),
                    remote_tasks.len()
                );
                state.tasks = remote_tasks;
                state.deleted.clear();
                inner.persist("manual_sync", &state.tasks);
            },
        )
    }

    /// Follows changes to the engine's key made by other writing contexts.
    ///
    /// Valid task lists replace in-memory state; removals and invalid JSON
    /// are ignored. The listener stops when the engine is dropped or the
    /// store's channel closes.
    pub fn watch_store(&self) -> JoinHandle<()> {
        let mut events = self.inner.store.subscribe();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let received = events.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match received {
                    Ok(event) => {
                        if let Some(tasks) = inner.store.parse_event(&event) {
                            info!(
                                "event=store_external_change module=engine status=ok key={} count={}",
                                event.key,
                                tasks.len()
                            );
                            inner.state().tasks = tasks;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // The store holds the latest write from any context.
                        warn!(
                            "event=store_external_change module=engine status=lagged skipped={skipped}"
                        );
                        let tasks = inner.store.load();
                        inner.state().tasks = tasks;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn merge_remote(&self) -> SyncHandle {
        self.inner.state().status.begin(true);

        let remote = Arc::clone(&self.inner.remote);
        self.spawn_sync(
            RemoteOperation::List,
            None,
            LoadingMode::Raised,
            STARTUP_SYNC_FAILED,
            async move { remote.list().await },
            |inner, state, remote_tasks| {
                let before = state.tasks.len();
                let merged = merge_preferring_local(&state.tasks, remote_tasks, &state.deleted);
                info!(
                    "event=engine_start module=engine status=ok local_count={} merged_count={}",
                    before,
                    merged.len()
                );
                state.tasks = merged;
                inner.persist("startup_merge", &state.tasks);
            },
        )
    }

    fn spawn_sync<T, F, S>(
        &self,
        operation: RemoteOperation,
        task_id: Option<TaskId>,
        loading: LoadingMode,
        failure_message: &'static str,
        call: F,
        on_success: S,
    ) -> SyncHandle
    where
        T: Send + 'static,
        F: Future<Output = RemoteResult<T>> + Send + 'static,
        S: FnOnce(&EngineInner, &mut EngineState, T) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            let result = call.await;
            let mut state = inner.state();
            let outcome = match result {
                Ok(value) => {
                    on_success(&*inner, &mut *state, value);
                    debug!(
                        "event=remote_sync module=engine status=ok operation={} task_id={}",
                        operation,
                        id_label(task_id)
                    );
                    SyncOutcome::Synced
                }
                Err(err) => {
                    warn!(
                        "event=remote_sync module=engine status=error operation={} task_id={} error={}",
                        operation,
                        id_label(task_id),
                        err
                    );
                    state.status.set_error(failure_message);
                    SyncOutcome::Failed(err.to_string())
                }
            };
            let failed = matches!(outcome, SyncOutcome::Failed(_));
            match loading {
                LoadingMode::Raised => state.status.finish_loading(),
                LoadingMode::Quiet if failed => state.status.finish_loading(),
                LoadingMode::Quiet => {}
            }
            outcome
        });
        SyncHandle::spawned(join)
    }
}

/// Keeps every local task in order, then appends remote tasks whose id is
/// neither present locally nor deleted locally.
pub(crate) fn merge_preferring_local(
    local: &[Task],
    remote: Vec<Task>,
    deleted: &HashSet<TaskId>,
) -> Vec<Task> {
    let mut seen: HashSet<TaskId> = local.iter().map(|task| task.id).collect();
    let mut merged = local.to_vec();
    for task in remote {
        if deleted.contains(&task.id) || !seen.insert(task.id) {
            continue;
        }
        merged.push(task);
    }
    merged
}

fn id_label(task_id: Option<TaskId>) -> String {
    task_id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::{merge_preferring_local, SyncPolicy};
    use crate::model::patch::TaskPatch;
    use crate::model::task::{Task, TaskCategory, TaskId};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn task(id: i64, title: &str) -> Task {
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        Task::new(TaskId(id), title, TaskCategory::Work, created)
    }

    #[test]
    fn merge_keeps_local_version_and_appends_remote_only() {
        let local = vec![task(1, "local edit")];
        let remote = vec![task(1, "remote version"), task(2, "remote only")];

        let merged = merge_preferring_local(&local, remote, &HashSet::new());
        assert_eq!(merged, vec![task(1, "local edit"), task(2, "remote only")]);
    }

    #[test]
    fn merge_skips_locally_deleted_and_duplicate_remote_ids() {
        let deleted = HashSet::from([TaskId(3)]);
        let remote = vec![task(3, "deleted"), task(4, "new"), task(4, "dup")];

        let merged = merge_preferring_local(&[], remote, &deleted);
        assert_eq!(merged, vec![task(4, "new")]);
    }

    #[test]
    fn quick_update_threshold_is_configurable() {
        let toggle = TaskPatch::new().completed(true).completed_at(None);
        let form = TaskPatch::new()
            .title("t")
            .description("d")
            .category(TaskCategory::Urgent);

        let default_policy = SyncPolicy::default();
        assert!(default_policy.is_quick_update(&toggle));
        assert!(!default_policy.is_quick_update(&form));

        let strict = SyncPolicy {
            quick_update_max_fields: 0,
        };
        assert!(!strict.is_quick_update(&toggle));
    }
}
