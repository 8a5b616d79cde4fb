//! Typed task-list view over one key of a `KeyValueStore`.
//!
//! # Responsibility
//! - Encode the full task list as a JSON array under a single key.
//! - Recover from missing or corrupted content by reporting an empty list.
//! - Translate raw storage events into task lists for the engine.
//!
//! # Invariants
//! - `load` never fails; corruption is logged with `event=store_read`.
//! - Saving the same list twice yields identical reads.
//! - Events caused by this store's own saves are never re-applied.

use crate::model::task::Task;
use crate::store::kv::{KeyValueStore, StorageEvent, WriterId};
use crate::store::{StoreError, StoreResult};
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default storage key for the task list.
pub const DEFAULT_TASKS_KEY: &str = "tasks";

/// Task list bound to one storage key.
///
/// Each instance is one writing context; clones share that identity.
#[derive(Clone)]
pub struct TaskListStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    writer: WriterId,
}

impl TaskListStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            writer: WriterId::next(),
        }
    }

    /// Uses `DEFAULT_TASKS_KEY`.
    pub fn with_default_key(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::new(backend, DEFAULT_TASKS_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    pub fn writer(&self) -> WriterId {
        self.writer
    }

    /// Reads the stored list.
    ///
    /// Missing key, backend failure and unparseable content all yield an
    /// empty list; the latter two are logged.
    pub fn load(&self) -> Vec<Task> {
        let raw = match self.backend.read_raw(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!(
                    "event=store_read module=store status=error key={} error_code=backend_read_failed error={}",
                    self.key, err
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                debug!(
                    "event=store_read module=store status=ok key={} count={}",
                    self.key,
                    tasks.len()
                );
                tasks
            }
            Err(err) => {
                error!(
                    "event=store_read module=store status=error key={} error_code=corrupted_value error={}",
                    self.key, err
                );
                Vec::new()
            }
        }
    }

    /// Replaces the stored list.
    pub fn save(&self, tasks: &[Task]) -> StoreResult<()> {
        let raw =
            serde_json::to_string(tasks).map_err(|err| StoreError::Serialize(err.to_string()))?;
        self.backend.write_raw_as(&self.key, &raw, Some(self.writer))
    }

    /// Subscribes to raw change events on the backing store.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.backend.subscribe()
    }

    /// Decodes an external change event for this key.
    ///
    /// Returns `None` for other keys, for this context's own writes, for
    /// removals and for invalid JSON.
    pub fn parse_event(&self, event: &StorageEvent) -> Option<Vec<Task>> {
        if event.key != self.key || event.writer == Some(self.writer) {
            return None;
        }
        let raw = event.new_value.as_deref()?;
        match serde_json::from_str::<Vec<Task>>(raw) {
            Ok(tasks) => Some(tasks),
            Err(err) => {
                warn!(
                    "event=store_event module=store status=error key={} error_code=invalid_json error={}",
                    self.key, err
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TaskListStore;
    use crate::model::task::{Task, TaskCategory, TaskId};
    use crate::store::kv::{KeyValueStore, StorageEvent};
    use crate::store::memory_kv::MemoryKeyValueStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn task(id: i64, title: &str) -> Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        Task::new(TaskId(id), title, TaskCategory::Personal, created)
    }

    #[test]
    fn corrupted_content_loads_as_empty() {
        let backend = Arc::new(MemoryKeyValueStore::new().with_entry("tasks", "invalid-json"));
        let store = TaskListStore::with_default_key(backend);
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_writes_json_array_under_key() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let store = TaskListStore::new(backend.clone(), "tasks");
        store.save(&[task(1, "Water plants")]).unwrap();

        let raw = backend.read_raw("tasks").unwrap().unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.contains("\"title\":\"Water plants\""));
    }

    #[test]
    fn parse_event_applies_key_null_and_json_policies() {
        let store = TaskListStore::with_default_key(Arc::new(MemoryKeyValueStore::new()));
        let payload = serde_json::to_string(&vec![task(5, "Book flights")]).unwrap();

        assert!(store
            .parse_event(&StorageEvent::written("theme", payload.clone()))
            .is_none());
        assert!(store.parse_event(&StorageEvent::removed("tasks")).is_none());
        assert!(store
            .parse_event(&StorageEvent::written("tasks", "invalid-json"))
            .is_none());

        let parsed = store
            .parse_event(&StorageEvent::written("tasks", payload))
            .unwrap();
        assert_eq!(parsed, vec![task(5, "Book flights")]);
    }

    #[test]
    fn own_saves_are_skipped_but_sibling_saves_are_seen() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let mine = TaskListStore::with_default_key(backend.clone());
        let sibling = TaskListStore::with_default_key(backend);
        let mut events = mine.subscribe();

        mine.save(&[task(1, "Mine")]).unwrap();
        sibling.save(&[task(2, "Sibling")]).unwrap();

        let own = events.try_recv().unwrap();
        assert!(mine.parse_event(&own).is_none());
        let other = events.try_recv().unwrap();
        assert_eq!(mine.parse_event(&other), Some(vec![task(2, "Sibling")]));
    }
}
