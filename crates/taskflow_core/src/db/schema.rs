//! Key-value table schema: versioned upgrades plus a shape check.
//!
//! # Invariants
//! - Upgrade steps run in one transaction, in ascending version order.
//! - After upgrading, `kv_entries` must expose every column the store reads
//!   or writes; otherwise the connection is refused.

use crate::store::{StoreError, StoreResult};
use log::{error, info};
use rusqlite::Connection;

/// Table holding one row per storage key.
pub const KV_TABLE: &str = "kv_entries";

/// Columns `SqliteKeyValueStore` depends on.
const KV_COLUMNS: [&str; 3] = ["key", "value", "updated_at"];

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "create_kv_entries",
    sql: include_str!("kv_entries_v1.sql"),
}];

/// Schema version written by the newest upgrade step.
pub fn latest_schema_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Upgrades the key-value schema and verifies the table shape.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer binary.
/// - `SchemaMismatch` when `kv_entries` lacks a required column.
/// - `Sqlite` for any statement failure.
pub fn ensure_kv_schema(conn: &mut Connection) -> StoreResult<()> {
    let found = stored_version(conn)?;
    let latest = latest_schema_version();
    if found > latest {
        error!(
            "event=kv_schema module=db status=error error_code=schema_too_new found={} latest={}",
            found, latest
        );
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    if found < latest {
        let tx = conn.transaction()?;
        for step in STEPS.iter().filter(|step| step.version > found) {
            tx.execute_batch(step.sql)?;
            tx.pragma_update(None, "user_version", step.version)?;
            info!(
                "event=kv_schema module=db status=ok step={} version={}",
                step.name, step.version
            );
        }
        tx.commit()?;
    }

    verify_kv_columns(conn)
}

fn stored_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

fn verify_kv_columns(conn: &Connection) -> StoreResult<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({KV_TABLE});"))?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    match KV_COLUMNS
        .into_iter()
        .find(|column| !present.iter().any(|name| name == column))
    {
        Some(column) => {
            error!(
                "event=kv_schema module=db status=error error_code=missing_column table={} column={}",
                KV_TABLE, column
            );
            Err(StoreError::SchemaMismatch {
                table: KV_TABLE,
                missing_column: column,
            })
        }
        None => Ok(()),
    }
}
