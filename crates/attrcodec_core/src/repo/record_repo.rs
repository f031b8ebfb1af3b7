//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist records of any `ModelClass` into its table, one row per record.
//! - Run the model's lifecycle hooks around every load and save.
//!
//! # Invariants
//! - `AfterFind` runs once for every record materialized from storage.
//! - `BeforeSave`, the row write and `AfterSave` share one transaction.
//! - A failed save rolls back the row and restores the in-memory record to
//!   its pre-save state, so the same record can be saved again once fixed.
//! - A successful save leaves no changed attributes.

use crate::db::{catalog, migrations, DbError};
use crate::hooks::{HookError, HookOutcome, LifecyclePhase};
use crate::model::class::{ModelClass, ID_COLUMN};
use crate::model::record::{Record, RecordId};
use log::{debug, error, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Number, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Hook {
        phase: LifecyclePhase,
        source: HookError,
    },
    NotFound {
        table: String,
        id: RecordId,
    },
    /// A `BeforeSave` hook returned `HookOutcome::Halt`.
    SaveHalted {
        model: String,
    },
    /// Attribute value has no column representation (arrays and objects).
    UnsupportedValue {
        attribute: String,
        kind: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Hook { phase, source } => write!(f, "{phase} hook failed: {source}"),
            Self::NotFound { table, id } => write!(f, "record not found in {table}: {id}"),
            Self::SaveHalted { model } => write!(f, "save of {model} halted by before_save hook"),
            Self::UnsupportedValue { attribute, kind } => write!(
                f,
                "attribute `{attribute}` holds an {kind} value that cannot be stored; register a codec for it"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Hook { source, .. } => Some(source),
            Self::NotFound { .. }
            | Self::SaveHalted { .. }
            | Self::UnsupportedValue { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for record persistence.
pub trait RecordRepository {
    /// Creates the model table or adds columns it is missing.
    fn ensure_table(&self, class: &ModelClass) -> RepoResult<()>;
    /// Inserts a new record or updates an existing one; returns its id.
    fn save(&self, record: &mut Record) -> RepoResult<RecordId>;
    fn find(&self, class: &Arc<ModelClass>, id: RecordId) -> RepoResult<Option<Record>>;
    /// Loads every record of the model ordered by id.
    fn list(&self, class: &Arc<ModelClass>) -> RepoResult<Vec<Record>>;
    fn delete(&self, class: &ModelClass, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Constructs a repository from a connection with migrations applied.
    ///
    /// # Errors
    /// - `DbError::SchemaNotReady` when the connection was not opened through
    ///   `open_db`/`open_db_in_memory`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        migrations::ensure_ready(conn)?;
        Ok(Self { conn })
    }

    /// Table names registered through `ensure_table`, sorted.
    pub fn catalog_tables(&self) -> RepoResult<Vec<String>> {
        Ok(catalog::registered_tables(self.conn)?)
    }

    /// Column names of `table`, lowercased; SQLite compares them case-insensitively.
    fn existing_columns(&self, table: &str) -> RepoResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({});", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>("name"))?
            .map(|name| name.map(|name| name.to_ascii_lowercase()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(columns)
    }

    fn write_row(&self, record: &Record, id: RecordId, is_new: bool) -> RepoResult<()> {
        let class = record.class();
        let table = quote_ident(class.table());
        let mut columns = Vec::with_capacity(class.attributes().len());
        let mut values = Vec::with_capacity(class.attributes().len() + 1);
        for (attribute, value) in record.values() {
            columns.push(quote_ident(attribute));
            values.push(to_sql_value(attribute, value)?);
        }
        values.push(SqlValue::Text(id.to_string()));

        if is_new {
            let placeholders = (1..=values.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>();
            let mut column_list = columns.clone();
            column_list.push(quote_ident(ID_COLUMN));
            self.conn.execute(
                &format!(
                    "INSERT INTO {table} ({}) VALUES ({});",
                    column_list.join(", "),
                    placeholders.join(", ")
                ),
                params_from_iter(values),
            )?;
            return Ok(());
        }

        let id_index = values.len();
        let mut assignments = columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>();
        if assignments.is_empty() {
            // Touch the id so a record without attributes still reports NotFound.
            assignments.push(format!("{} = {}", quote_ident(ID_COLUMN), quote_ident(ID_COLUMN)));
        }
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table} SET {} WHERE {} = ?{id_index};",
                assignments.join(", "),
                quote_ident(ID_COLUMN)
            ),
            params_from_iter(values),
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: class.table().to_string(),
                id,
            });
        }
        Ok(())
    }

    fn save_in_transaction(&self, record: &mut Record) -> RepoResult<RecordId> {
        let class = Arc::clone(record.class());
        let tx = self.conn.unchecked_transaction()?;

        let outcome = class
            .hooks()
            .run(LifecyclePhase::BeforeSave, record)
            .map_err(|source| RepoError::Hook {
                phase: LifecyclePhase::BeforeSave,
                source,
            })?;
        if outcome == HookOutcome::Halt {
            return Err(RepoError::SaveHalted {
                model: class.name().to_string(),
            });
        }

        let is_new = record.is_new_record();
        let id = record.id().unwrap_or_else(Uuid::new_v4);
        self.write_row(record, id, is_new)?;
        record.assign_id(id);

        class
            .hooks()
            .run(LifecyclePhase::AfterSave, record)
            .map_err(|source| RepoError::Hook {
                phase: LifecyclePhase::AfterSave,
                source,
            })?;

        tx.commit()?;
        Ok(id)
    }

    fn materialize(&self, class: &Arc<ModelClass>, row: &Row<'_>) -> RepoResult<Record> {
        let id_text: String = row.get(ID_COLUMN)?;
        let id = Uuid::parse_str(&id_text).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid id value `{id_text}` in {}.{ID_COLUMN}",
                class.table()
            ))
        })?;

        let mut raw = Vec::with_capacity(class.attributes().len());
        for attribute in class.attributes() {
            let value = from_sql_value(class.table(), attribute, row.get(attribute.as_str())?)?;
            raw.push((attribute.clone(), value));
        }

        let mut record = Record::from_storage(Arc::clone(class), id, raw);
        class
            .hooks()
            .run(LifecyclePhase::AfterFind, &mut record)
            .map_err(|source| RepoError::Hook {
                phase: LifecyclePhase::AfterFind,
                source,
            })?;
        Ok(record)
    }

    fn select_sql(class: &ModelClass) -> String {
        let mut columns = vec![quote_ident(ID_COLUMN)];
        columns.extend(class.attributes().iter().map(|name| quote_ident(name)));
        format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(class.table())
        )
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn ensure_table(&self, class: &ModelClass) -> RepoResult<()> {
        let table = quote_ident(class.table());
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({} TEXT PRIMARY KEY NOT NULL);",
            quote_ident(ID_COLUMN)
        ))?;

        let existing = self.existing_columns(class.table())?;
        let mut added = 0usize;
        for attribute in class.attributes() {
            if existing.contains(&attribute.to_ascii_lowercase()) {
                continue;
            }
            // Untyped columns keep whatever value kind the codec produced.
            self.conn.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {};",
                quote_ident(attribute)
            ))?;
            added += 1;
        }

        catalog::register_table(
            self.conn,
            class.table(),
            class.name(),
            class.attributes().len(),
        )?;

        info!(
            "event=table_ensure module=repo status=ok table={} columns_added={}",
            class.table(),
            added
        );
        Ok(())
    }

    fn save(&self, record: &mut Record) -> RepoResult<RecordId> {
        let started_at = Instant::now();
        let before = record.capture_state();

        match self.save_in_transaction(record) {
            Ok(id) => {
                record.clear_all_changed();
                info!(
                    "event=record_save module=repo status=ok model={} duration_ms={}",
                    record.class().name(),
                    started_at.elapsed().as_millis()
                );
                Ok(id)
            }
            Err(err) => {
                record.restore_state(before);
                error!(
                    "event=record_save module=repo status=error model={} duration_ms={} error={}",
                    record.class().name(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn find(&self, class: &Arc<ModelClass>, id: RecordId) -> RepoResult<Option<Record>> {
        let sql = format!(
            "{} WHERE {} = ?1;",
            Self::select_sql(class),
            quote_ident(ID_COLUMN)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let record = stmt
            .query_row([id.to_string()], |row| Ok(self.materialize(class, row)))
            .optional()?
            .transpose()?;

        debug!(
            "event=record_find module=repo status=ok model={} found={}",
            class.name(),
            record.is_some()
        );
        Ok(record)
    }

    fn list(&self, class: &Arc<ModelClass>) -> RepoResult<Vec<Record>> {
        let sql = format!(
            "{} ORDER BY {} ASC;",
            Self::select_sql(class),
            quote_ident(ID_COLUMN)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.materialize(class, row)?);
        }
        Ok(records)
    }

    fn delete(&self, class: &ModelClass, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1;",
                quote_ident(class.table()),
                quote_ident(ID_COLUMN)
            ),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: class.table().to_string(),
                id,
            });
        }
        Ok(())
    }
}

/// Quotes an identifier already checked by `is_valid_identifier`.
fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn to_sql_value(attribute: &str, value: &Value) -> RepoResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(integer), _) => Ok(SqlValue::Integer(integer)),
            // SQLite integers are i64; a wider u64 would silently become a REAL.
            _ if number.is_u64() => Err(RepoError::UnsupportedValue {
                attribute: attribute.to_string(),
                kind: "out-of-range integer",
            }),
            (None, Some(real)) => Ok(SqlValue::Real(real)),
            (None, None) => Err(RepoError::UnsupportedValue {
                attribute: attribute.to_string(),
                kind: "out-of-range number",
            }),
        },
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Array(_) => Err(RepoError::UnsupportedValue {
            attribute: attribute.to_string(),
            kind: "array",
        }),
        Value::Object(_) => Err(RepoError::UnsupportedValue {
            attribute: attribute.to_string(),
            kind: "object",
        }),
    }
}

fn from_sql_value(table: &str, attribute: &str, value: SqlValue) -> RepoResult<Value> {
    match value {
        SqlValue::Null => Ok(Value::Null),
        SqlValue::Integer(integer) => Ok(Value::from(integer)),
        SqlValue::Real(real) => Number::from_f64(real).map(Value::Number).ok_or_else(|| {
            RepoError::InvalidData(format!("non-finite real in {table}.{attribute}"))
        }),
        SqlValue::Text(text) => Ok(Value::String(text)),
        SqlValue::Blob(_) => Err(RepoError::InvalidData(format!(
            "blob value in {table}.{attribute} is not supported"
        ))),
    }
}
