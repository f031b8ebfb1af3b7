//! Catalog of model tables created through the record repository.

use crate::db::DbResult;
use rusqlite::{params, Connection};

/// Upserts `table` into `record_catalog`.
///
/// Several models may share one table; the catalog keeps the latest model
/// name and the widest attribute count seen.
pub fn register_table(
    conn: &Connection,
    table: &str,
    model: &str,
    attribute_count: usize,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO record_catalog (table_name, model_name, attribute_count)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(table_name) DO UPDATE SET
            model_name = excluded.model_name,
            attribute_count = MAX(attribute_count, excluded.attribute_count),
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            table,
            model,
            i64::try_from(attribute_count).unwrap_or(i64::MAX)
        ],
    )?;
    Ok(())
}

/// Registered table names, sorted.
pub fn registered_tables(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT table_name FROM record_catalog ORDER BY table_name ASC;")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
