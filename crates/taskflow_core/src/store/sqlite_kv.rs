//! SQLite-backed key-value store.
//!
//! # Responsibility
//! - Persist string values per key in the `kv_entries` table.
//! - Broadcast a `StorageEvent` after every committed mutation.
//!
//! # Invariants
//! - Writes are upserts; the latest write for a key wins.
//! - Events are only sent after the SQL statement succeeded.

use crate::db::{open_db, open_db_in_memory};
use crate::store::kv::{KeyValueStore, StorageEvent, WriterId, EVENT_CHANNEL_CAPACITY};
use crate::store::StoreResult;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Durable key-value store over one SQLite connection.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
    events: broadcast::Sender<StorageEvent>,
}

impl SqliteKeyValueStore {
    /// Opens (or creates) a store file and ensures the key-value schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory store; contents vanish on drop.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection whose schema was already ensured.
    pub fn from_connection(conn: Connection) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            conn: Mutex::new(conn),
            events,
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StorageEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn read_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_raw_as(&self, key: &str, value: &str, writer: Option<WriterId>) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        debug!(
            "event=kv_write module=store status=ok backend=sqlite key={} bytes={}",
            key,
            value.len()
        );
        self.notify(StorageEvent::written(key, value).by(writer));
        Ok(())
    }

    fn remove_as(&self, key: &str, writer: Option<WriterId>) -> StoreResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        if changed > 0 {
            self.notify(StorageEvent::removed(key).by(writer));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
