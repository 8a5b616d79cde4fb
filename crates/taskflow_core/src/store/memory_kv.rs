//! In-memory key-value store for tests and ephemeral sessions.

use crate::store::kv::{KeyValueStore, StorageEvent, WriterId, EVENT_CHANNEL_CAPACITY};
use crate::store::StoreResult;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Process-local store with the same notification semantics as SQLite.
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one raw value without emitting an event.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries().insert(key.into(), value.into());
        self
    }

    /// Simulates a change made by another context sharing the same storage.
    ///
    /// Goes through the regular write/remove path with no writer attached,
    /// so subscribers see exactly what a sibling writer would produce.
    pub fn emit_external(&self, key: &str, new_value: Option<&str>) -> StoreResult<()> {
        match new_value {
            Some(value) => self.write_raw_as(key, value, None),
            None => self.remove_as(key, None),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn read_raw(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn write_raw_as(&self, key: &str, value: &str, writer: Option<WriterId>) -> StoreResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        let _ = self.events.send(StorageEvent::written(key, value).by(writer));
        Ok(())
    }

    fn remove_as(&self, key: &str, writer: Option<WriterId>) -> StoreResult<()> {
        if self.entries().remove(key).is_some() {
            let _ = self.events.send(StorageEvent::removed(key).by(writer));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
