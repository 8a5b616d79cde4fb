//! Core of Taskflow: a local-first task list with optimistic remote sync.
//! This crate owns task invariants, durable storage and the sync engine.

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod query;
pub mod remote;
pub mod store;

pub use config::{ConfigError, RemoteConfig, TaskflowConfig};
pub use engine::{
    EngineError, EngineSnapshot, SyncEngine, SyncHandle, SyncOutcome, SyncPolicy,
};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::patch::TaskPatch;
pub use model::task::{
    Task, TaskCategory, TaskDraft, TaskId, TaskIdGenerator, TaskValidationError,
};
pub use query::{time_remaining, StatusFilter, TaskFilter, TaskStats, TimeRemaining};
pub use remote::{
    DeleteAck, HttpTaskSource, InMemoryTaskSource, RemoteError, RemoteOperation, RemoteResult,
    RemoteTaskSource,
};
pub use store::{
    KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StoreError, StoreResult,
    TaskListStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
