//! Internal schema versions for record storage.
//!
//! Only bookkeeping tables (`record_catalog`) are versioned here; model
//! tables grow on demand through `RecordRepository::ensure_table`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// One forward-only schema step, identified by its `user_version`.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    sql: include_str!("0001_record_catalog.sql"),
}];

/// Schema version record storage expects.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Applies every step newer than the connection's version in one transaction.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the database is ahead of this build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=ok from_version={} version={}",
            from_version, step.version
        );
    }
    tx.commit()?;
    Ok(())
}

/// Reads the schema version stored in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Checks that `conn` is at exactly the schema version record storage expects.
pub fn ensure_ready(conn: &Connection) -> DbResult<()> {
    let db_version = current_user_version(conn)?;
    let expected = latest_version();
    if db_version != expected {
        return Err(DbError::SchemaNotReady {
            db_version,
            expected,
        });
    }
    Ok(())
}
