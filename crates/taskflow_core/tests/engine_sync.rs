use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use taskflow_core::remote::RemoteOperation;
use taskflow_core::{
    DeleteAck, EngineError, InMemoryTaskSource, KeyValueStore, MemoryKeyValueStore, RemoteError,
    RemoteResult, RemoteTaskSource, SyncEngine, SyncOutcome, SyncPolicy, Task, TaskCategory,
    TaskId, TaskListStore, TaskPatch,
};

/// Remote whose calls never complete.
struct PendingSource;

#[async_trait]
impl RemoteTaskSource for PendingSource {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        std::future::pending().await
    }

    async fn create(&self, _task: &Task) -> RemoteResult<Task> {
        std::future::pending().await
    }

    async fn update(&self, _id: TaskId, _task: &Task) -> RemoteResult<Task> {
        std::future::pending().await
    }

    async fn delete(&self, _id: TaskId) -> RemoteResult<DeleteAck> {
        std::future::pending().await
    }
}

/// Remote that accepts everything but answers deletes with `success: false`.
struct RefusingDeleteSource;

#[async_trait]
impl RemoteTaskSource for RefusingDeleteSource {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        Ok(Vec::new())
    }

    async fn create(&self, task: &Task) -> RemoteResult<Task> {
        Ok(task.clone())
    }

    async fn update(&self, _id: TaskId, task: &Task) -> RemoteResult<Task> {
        Ok(task.clone())
    }

    async fn delete(&self, _id: TaskId) -> RemoteResult<DeleteAck> {
        Ok(DeleteAck { success: false })
    }
}

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn task(id: i64, title: &str) -> Task {
    Task::new(TaskId(id), title, TaskCategory::Work, created_at())
}

fn memory_store() -> (Arc<dyn KeyValueStore>, TaskListStore) {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let store = TaskListStore::with_default_key(backend.clone());
    (backend, store)
}

fn sibling(backend: &Arc<dyn KeyValueStore>) -> TaskListStore {
    TaskListStore::with_default_key(backend.clone())
}

async fn started(
    store: TaskListStore,
    remote: Arc<dyn RemoteTaskSource>,
) -> SyncEngine {
    let (engine, startup) = SyncEngine::start(store, remote, SyncPolicy::default());
    startup.settled().await;
    engine
}

#[tokio::test]
async fn added_task_is_visible_before_remote_responds() {
    let (backend, store) = memory_store();
    let (engine, _startup) = SyncEngine::start(store, Arc::new(PendingSource), SyncPolicy::default());

    let handle = engine.add_task(task(1, "Write report")).unwrap();

    assert_eq!(engine.tasks(), vec![task(1, "Write report")]);
    assert_eq!(sibling(&backend).load(), vec![task(1, "Write report")]);
    assert!(engine.loading());
    assert!(!handle.is_finished());
}

#[tokio::test]
async fn startup_merge_prefers_local_and_appends_remote_only() {
    let (backend, store) = memory_store();
    store.save(&[task(1, "local edit")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![
        task(1, "remote version"),
        task(2, "remote only"),
    ]));

    let (engine, startup) = SyncEngine::start(store, remote, SyncPolicy::default());
    assert_eq!(engine.tasks(), vec![task(1, "local edit")]);
    assert!(engine.loading());

    assert_eq!(startup.settled().await, SyncOutcome::Synced);
    let expected = vec![task(1, "local edit"), task(2, "remote only")];
    assert_eq!(engine.tasks(), expected);
    assert_eq!(sibling(&backend).load(), expected);
    assert!(!engine.loading());
    assert_eq!(engine.error(), None);
}

#[tokio::test]
async fn startup_failure_keeps_local_data_and_reports_error() {
    let (_backend, store) = memory_store();
    store.save(&[task(3, "offline")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::new());
    remote.fail_on(RemoteOperation::List);

    let (engine, startup) = SyncEngine::start(store, remote, SyncPolicy::default());
    assert!(matches!(startup.settled().await, SyncOutcome::Failed(_)));

    assert_eq!(engine.tasks(), vec![task(3, "offline")]);
    assert_eq!(
        engine.error().as_deref(),
        Some("Failed to sync with server. Using local data.")
    );
    assert!(!engine.loading());
}

#[tokio::test]
async fn failed_create_keeps_task_locally_and_sets_error() {
    let (backend, store) = memory_store();
    let remote = Arc::new(InMemoryTaskSource::new());
    remote.fail_on(RemoteOperation::Create);
    let engine = started(store, remote.clone()).await;

    let outcome = engine
        .add_task(task(7, "Call plumber"))
        .unwrap()
        .settled()
        .await;

    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert_eq!(engine.tasks(), vec![task(7, "Call plumber")]);
    assert_eq!(sibling(&backend).load(), vec![task(7, "Call plumber")]);
    let error = engine.error().expect("error should be set");
    assert!(!error.is_empty());
    assert_eq!(error, "Failed to sync with server. Task saved locally.");
    assert!(!engine.loading());
    assert!(remote.tasks().is_empty());
}

#[tokio::test]
async fn successful_create_reaches_remote_and_clears_loading() {
    let (_backend, store) = memory_store();
    let remote = Arc::new(InMemoryTaskSource::new());
    let engine = started(store, remote.clone()).await;

    let handle = engine.add_task(task(8, "Plan sprint")).unwrap();
    assert!(engine.loading());
    assert_eq!(handle.settled().await, SyncOutcome::Synced);

    assert!(!engine.loading());
    assert_eq!(remote.tasks(), vec![task(8, "Plan sprint")]);
}

#[tokio::test]
async fn duplicate_id_is_rejected_without_changes() {
    let (_backend, store) = memory_store();
    let remote = Arc::new(InMemoryTaskSource::new());
    let engine = started(store, remote.clone()).await;
    engine.add_task(task(1, "first")).unwrap().settled().await;

    let err = engine.add_task(task(1, "second")).unwrap_err();

    assert_eq!(err, EngineError::DuplicateTaskId(TaskId(1)));
    assert_eq!(engine.tasks(), vec![task(1, "first")]);
    assert_eq!(remote.call_count(RemoteOperation::Create), 1);
}

#[tokio::test]
async fn delete_is_final_even_when_remote_fails() {
    let (backend, store) = memory_store();
    store.save(&[task(1, "keep"), task(2, "drop")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![task(2, "drop")]));
    remote.fail_on(RemoteOperation::Delete);
    let engine = started(store, remote).await;

    let handle = engine.delete_task(TaskId(2));
    assert_eq!(engine.tasks(), vec![task(1, "keep")]);

    assert!(matches!(handle.settled().await, SyncOutcome::Failed(_)));
    assert_eq!(engine.tasks(), vec![task(1, "keep")]);
    assert_eq!(sibling(&backend).load(), vec![task(1, "keep")]);
    assert_eq!(
        engine.error().as_deref(),
        Some("Failed to sync with server. Task deleted locally.")
    );
}

#[tokio::test]
async fn refused_remote_delete_reports_error_but_stays_deleted() {
    let (backend, store) = memory_store();
    store.save(&[task(1, "obsolete"), task(2, "keep")]).unwrap();
    let engine = started(store, Arc::new(RefusingDeleteSource)).await;

    let outcome = engine.delete_task(TaskId(1)).settled().await;

    assert_eq!(
        outcome,
        SyncOutcome::Failed(RemoteError::Rejected(RemoteOperation::Delete).to_string())
    );
    assert_eq!(engine.tasks(), vec![task(2, "keep")]);
    assert_eq!(sibling(&backend).load(), vec![task(2, "keep")]);
    assert_eq!(
        engine.error().as_deref(),
        Some("Failed to sync with server. Task deleted locally.")
    );
    assert!(!engine.loading());
}

#[tokio::test]
async fn startup_merge_does_not_resurrect_tasks_deleted_meanwhile() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "local")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![task(1, "remote")]));

    let (engine, startup) = SyncEngine::start(store, remote, SyncPolicy::default());
    let delete = engine.delete_task(TaskId(1));
    startup.settled().await;
    delete.settled().await;

    assert!(engine.tasks().is_empty());
}

#[tokio::test]
async fn quick_update_never_raises_loading() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "toggle me")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![task(1, "toggle me")]));
    let engine = started(store, remote.clone()).await;
    assert!(!engine.loading());

    let current = engine.task(TaskId(1)).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 2, 10, 0, 0).unwrap();
    let handle = engine.update_task(TaskId(1), TaskPatch::with_completion(&current, true, now));
    assert!(!engine.loading());
    assert!(engine.task(TaskId(1)).unwrap().completed);

    assert_eq!(handle.settled().await, SyncOutcome::Synced);
    assert!(!engine.loading());
    assert_eq!(remote.tasks()[0].completed_at, Some(now));
}

#[tokio::test]
async fn form_update_raises_loading_until_settled() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "draft")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![task(1, "draft")]));
    let engine = started(store, remote.clone()).await;

    let patch = TaskPatch::new()
        .title("final")
        .description("ready for review")
        .category(TaskCategory::Urgent);
    let handle = engine.update_task(TaskId(1), patch);
    assert!(engine.loading());
    assert_eq!(engine.task(TaskId(1)).unwrap().title, "final");

    assert_eq!(handle.settled().await, SyncOutcome::Synced);
    assert!(!engine.loading());
    assert_eq!(remote.tasks()[0].category, TaskCategory::Urgent);
}

#[tokio::test]
async fn failed_quick_update_keeps_change_and_reports_error() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "toggle")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::new());
    remote.fail_on(RemoteOperation::Update);
    let engine = started(store, remote).await;

    let outcome = engine
        .update_task(TaskId(1), TaskPatch::new().completed(true))
        .settled()
        .await;

    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert!(engine.task(TaskId(1)).unwrap().completed);
    assert_eq!(
        engine.error().as_deref(),
        Some("Failed to sync with server. Changes saved locally.")
    );
    assert!(!engine.loading());
}

#[tokio::test]
async fn unknown_id_update_and_delete_are_skipped() {
    let (_backend, store) = memory_store();
    let remote = Arc::new(InMemoryTaskSource::new());
    let engine = started(store, remote.clone()).await;

    let update = engine.update_task(TaskId(42), TaskPatch::new().title("ghost"));
    let delete = engine.delete_task(TaskId(42));

    assert!(update.is_finished());
    assert_eq!(update.settled().await, SyncOutcome::Skipped);
    assert_eq!(delete.settled().await, SyncOutcome::Skipped);
    assert_eq!(remote.call_count(RemoteOperation::Update), 0);
    assert_eq!(remote.call_count(RemoteOperation::Delete), 0);
    assert!(engine.tasks().is_empty());
}

#[tokio::test]
async fn sync_with_server_overwrites_local_edits() {
    let (backend, store) = memory_store();
    store.save(&[task(1, "local edit"), task(3, "local only")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![task(1, "remote version")]));
    let engine = started(store, remote).await;
    assert_eq!(engine.tasks().len(), 2);

    let handle = engine.sync_with_server();
    assert!(engine.loading());
    assert_eq!(handle.settled().await, SyncOutcome::Synced);

    assert_eq!(engine.tasks(), vec![task(1, "remote version")]);
    assert_eq!(sibling(&backend).load(), vec![task(1, "remote version")]);
    assert!(!engine.loading());
}

#[tokio::test]
async fn failed_sync_with_server_keeps_local_list() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "local")]).unwrap();
    let remote = Arc::new(InMemoryTaskSource::new());
    let engine = started(store, remote.clone()).await;
    remote.fail_on(RemoteOperation::List);

    let outcome = engine.sync_with_server().settled().await;

    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert_eq!(engine.tasks(), vec![task(1, "local")]);
    assert_eq!(engine.error().as_deref(), Some("Failed to sync with server."));
}

#[tokio::test]
async fn new_operation_clears_previous_error_and_clear_error_works() {
    let (_backend, store) = memory_store();
    let remote = Arc::new(InMemoryTaskSource::new());
    remote.fail_on(RemoteOperation::Create);
    let engine = started(store, remote.clone()).await;

    engine.add_task(task(1, "a")).unwrap().settled().await;
    assert!(engine.error().is_some());

    remote.recover(RemoteOperation::Create);
    let handle = engine.add_task(task(2, "b")).unwrap();
    assert_eq!(engine.error(), None);
    handle.settled().await;

    remote.fail_on(RemoteOperation::Create);
    engine.add_task(task(3, "c")).unwrap().settled().await;
    assert!(engine.error().is_some());
    engine.clear_error();
    assert_eq!(engine.snapshot().error, None);
}

#[tokio::test]
async fn remote_error_details_surface_in_outcome() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "local only")]).unwrap();
    let engine = started(store, Arc::new(InMemoryTaskSource::new())).await;

    // The remote never saw task 1, so the mirrored update is rejected.
    let outcome = engine
        .update_task(TaskId(1), TaskPatch::new().title("renamed"))
        .settled()
        .await;

    let expected = RemoteError::NotFound(TaskId(1)).to_string();
    assert_eq!(outcome, SyncOutcome::Failed(expected));
    assert_eq!(engine.task(TaskId(1)).unwrap().title, "renamed");
}

#[tokio::test]
async fn watch_store_applies_sibling_writes_and_ignores_own() {
    let (backend, store) = memory_store();
    let engine = started(store, Arc::new(InMemoryTaskSource::new())).await;
    let watcher = engine.watch_store();

    engine.add_task(task(1, "mine")).unwrap().settled().await;
    tokio::task::yield_now().await;
    assert_eq!(engine.tasks(), vec![task(1, "mine")]);

    sibling(&backend)
        .save(&[task(1, "mine"), task(2, "from another window")])
        .unwrap();
    for _ in 0..10 {
        if engine.tasks().len() == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(
        engine.tasks(),
        vec![task(1, "mine"), task(2, "from another window")]
    );

    drop(engine);
    backend.write_raw("tasks", "[]").unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), watcher)
        .await
        .expect("watcher should stop once the engine is dropped")
        .unwrap();
}

#[tokio::test]
async fn watch_store_ignores_removals_and_invalid_json() {
    let backend = Arc::new(MemoryKeyValueStore::new());
    let store = TaskListStore::with_default_key(backend.clone());
    store.save(&[task(1, "stable")]).unwrap();
    let engine = started(store, Arc::new(InMemoryTaskSource::new())).await;
    let _watcher = engine.watch_store();

    backend.emit_external("tasks", None).unwrap();
    backend.emit_external("tasks", Some("invalid-json")).unwrap();
    backend.emit_external("theme", Some("[]")).unwrap();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert_eq!(engine.tasks(), vec![task(1, "stable")]);
}

#[tokio::test]
async fn corrupted_store_starts_empty_and_merges_remote() {
    let backend = Arc::new(MemoryKeyValueStore::new().with_entry("tasks", "invalid-json"));
    let store = TaskListStore::with_default_key(backend);
    let remote = Arc::new(InMemoryTaskSource::with_tasks(vec![task(9, "from server")]));

    let engine = started(store, remote).await;

    assert_eq!(engine.tasks(), vec![task(9, "from server")]);
}

#[tokio::test]
async fn quick_threshold_follows_policy() {
    let (_backend, store) = memory_store();
    store.save(&[task(1, "strict")]).unwrap();
    let policy = SyncPolicy {
        quick_update_max_fields: 0,
    };
    let (engine, startup) = SyncEngine::start(store, Arc::new(InMemoryTaskSource::new()), policy);
    startup.settled().await;
    assert_eq!(engine.policy(), policy);

    let handle = engine.update_task(TaskId(1), TaskPatch::new().completed(true));
    assert!(engine.loading());
    handle.settled().await;
    assert!(!engine.loading());
}

#[tokio::test]
async fn with_initial_uses_injected_snapshot() {
    let (backend, store) = memory_store();
    store.save(&[task(1, "stored")]).unwrap();

    let (engine, startup) = SyncEngine::with_initial(
        vec![task(5, "injected")],
        store,
        Arc::new(InMemoryTaskSource::new()),
        SyncPolicy::default(),
    );
    startup.settled().await;

    assert_eq!(engine.tasks(), vec![task(5, "injected")]);
    assert_eq!(sibling(&backend).load(), vec![task(5, "injected")]);
}

#[tokio::test(start_paused = true)]
async fn remote_timeout_clears_loading_and_reports_error() {
    let (backend, store) = memory_store();
    let remote = Arc::new(
        InMemoryTaskSource::new()
            .with_latency(std::time::Duration::from_secs(2))
            .with_timeout(std::time::Duration::from_millis(200)),
    );
    let (engine, startup) = SyncEngine::start(store, remote.clone(), SyncPolicy::default());
    assert!(engine.loading());
    assert_eq!(
        startup.settled().await,
        SyncOutcome::Failed(RemoteError::Timeout(RemoteOperation::List).to_string())
    );
    assert!(!engine.loading());

    let handle = engine.add_task(task(1, "Slow network")).unwrap();
    assert!(engine.loading());
    assert_eq!(engine.error(), None);

    assert_eq!(
        handle.settled().await,
        SyncOutcome::Failed(RemoteError::Timeout(RemoteOperation::Create).to_string())
    );
    assert!(!engine.loading());
    assert_eq!(
        engine.error().as_deref(),
        Some("Failed to sync with server. Task saved locally.")
    );
    assert_eq!(sibling(&backend).load(), vec![task(1, "Slow network")]);
    assert!(remote.tasks().is_empty());
}
