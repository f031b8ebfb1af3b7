//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `attrcodec_core` linkage.
//! - Run one in-memory save/load cycle through a custom codec and print the
//!   stored column next to the decoded record.

use attrcodec_core::db::open_db_in_memory;
use attrcodec_core::{
    comma_separated_integers, ModelClassBuilder, Record, RecordRepository, SqliteRecordRepository,
};
use rusqlite::Connection;
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("attrcodec_core ping={}", attrcodec_core::ping());
    println!("attrcodec_core version={}", attrcodec_core::core_version());

    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory()?;
    let repo = SqliteRecordRepository::try_new(&conn)?;
    let alliance = ModelClassBuilder::new("Alliance", "alliances")
        .attributes(["name", "planet_player_ids"])
        .custom_serialize(["planet_player_ids"], comma_separated_integers().into())
        .build()?;
    repo.ensure_table(&alliance)?;

    let mut record = Record::new(Arc::clone(&alliance));
    record.set("name", json!("Orion"))?;
    record.set("planet_player_ids", json!([4, 5, 6]))?;
    let id = repo.save(&mut record)?;

    println!("stored planet_player_ids={}", stored_column(&conn, &id.to_string())?);
    if let Some(loaded) = repo.find(&alliance, id)? {
        println!("{}", serde_json::to_string_pretty(&loaded.view())?);
    }
    Ok(())
}

fn stored_column(conn: &Connection, id: &str) -> rusqlite::Result<String> {
    conn.query_row(
        "SELECT planet_player_ids FROM alliances WHERE id = ?1;",
        [id],
        |row| row.get(0),
    )
}
