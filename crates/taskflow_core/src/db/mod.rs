//! SQLite bootstrap for the durable key-value store.
//!
//! # Responsibility
//! - Open and configure SQLite connections backing `SqliteKeyValueStore`.
//! - Bring the `kv_entries` schema to the version this binary understands.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - No key-value entry is read or written before the schema is verified.
//! - Failures surface as `StoreError`; there is no separate database error.

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory};
pub use schema::{latest_schema_version, KV_TABLE};
