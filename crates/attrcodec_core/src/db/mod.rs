//! SQLite connection bootstrap for record storage.
//!
//! # Responsibility
//! - Open connections with the pragmas record storage relies on.
//! - Bring the internal bookkeeping schema up to date before any model
//!   table is touched.
//! - Keep the catalog of model tables created on demand.
//!
//! # Invariants
//! - Internal schema version lives in `PRAGMA user_version`.
//! - Model tables are never created by migrations, only by the repository.
//! - A connection whose schema is behind or ahead of this build is refused
//!   for record storage.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog;
pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Database was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Record storage was requested on a connection without current migrations.
    SchemaNotReady { db_version: u32, expected: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::SchemaNotReady {
                db_version,
                expected,
            } => write!(
                f,
                "record storage needs schema version {expected}, connection is at {db_version}; open it through open_db"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::SchemaNotReady { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
