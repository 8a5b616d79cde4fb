//! Key-value persistence contract consumed by the sync engine.

use crate::store::StoreResult;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Capacity of per-store change notification channels.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

static NEXT_WRITER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one writing context (one engine/session) sharing a store.
///
/// Lets a context recognize and skip notifications for its own writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(u64);

impl WriterId {
    /// Allocates a process-unique writer id.
    pub fn next() -> Self {
        Self(NEXT_WRITER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Change notification for one key.
///
/// `new_value = None` means the key was removed. `writer = None` marks a
/// change with no attributed context (raw writes, other processes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
    pub writer: Option<WriterId>,
}

impl StorageEvent {
    pub fn written(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: Some(value.into()),
            writer: None,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: None,
            writer: None,
        }
    }

    pub fn by(mut self, writer: Option<WriterId>) -> Self {
        self.writer = writer;
        self
    }
}

/// Synchronous string key-value store that survives reloads.
///
/// Values are opaque strings; typed JSON handling lives in `TaskListStore`.
pub trait KeyValueStore: Send + Sync {
    fn read_raw(&self, key: &str) -> StoreResult<Option<String>>;

    /// Upserts `value` and notifies subscribers, attributed to `writer`.
    fn write_raw_as(&self, key: &str, value: &str, writer: Option<WriterId>) -> StoreResult<()>;

    /// Removes `key` (no-op when absent) and notifies subscribers on change.
    fn remove_as(&self, key: &str, writer: Option<WriterId>) -> StoreResult<()>;

    /// Subscribes to every write/remove made through this store.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    fn write_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        self.write_raw_as(key, value, None)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.remove_as(key, None)
    }
}
