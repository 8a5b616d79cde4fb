//! Durable local store.
//!
//! # Responsibility
//! - Provide a synchronous key-value persistence contract (`KeyValueStore`).
//! - Offer SQLite-backed and in-memory implementations.
//! - Bind one key to a typed task list (`TaskListStore`).
//!
//! # Invariants
//! - Every write/remove emits one `StorageEvent` to subscribers.
//! - Corrupted stored content is reported as absent, never as a caller error.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod kv;
pub mod memory_kv;
pub mod sqlite_kv;
pub mod task_list;

pub use kv::{KeyValueStore, StorageEvent, WriterId};
pub use memory_kv::MemoryKeyValueStore;
pub use sqlite_kv::SqliteKeyValueStore;
pub use task_list::{TaskListStore, DEFAULT_TASKS_KEY};

pub type StoreResult<T> = Result<T, StoreError>;

/// Local persistence failure.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// The store file was written by a newer schema than this binary knows.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The key-value table exists but lacks a column the store relies on.
    SchemaMismatch {
        table: &'static str,
        missing_column: &'static str,
    },
    Serialize(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::SchemaMismatch {
                table,
                missing_column,
            } => write!(f, "store table `{table}` is missing column `{missing_column}`"),
            Self::Serialize(message) => write!(f, "failed to serialize stored value: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
