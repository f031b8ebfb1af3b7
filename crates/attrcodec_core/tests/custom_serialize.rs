use attrcodec_core::db::open_db_in_memory;
use attrcodec_core::{
    comma_separated_integers, AttributeCodec, CodecError, CodecOptions, HookError, HookOutcome,
    ModelClass, ModelClassBuilder, Record, RecordId, RecordRepository, RepoError,
    SqliteRecordRepository,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;

fn raw_column(conn: &Connection, table: &str, column: &str, id: RecordId) -> Value {
    let raw: rusqlite::types::Value = conn
        .query_row(
            &format!("SELECT \"{column}\" FROM \"{table}\" WHERE id = ?1;"),
            [id.to_string()],
            |row| row.get(0),
        )
        .expect("query row");
    match raw {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(value) => json!(value),
        rusqlite::types::Value::Text(value) => json!(value),
        other => panic!("unexpected raw column value: {other:?}"),
    }
}

fn alliance_model() -> Arc<ModelClass> {
    ModelClassBuilder::new("Alliance", "alliances")
        .attributes(["name", "planet_player_ids", "ship_player_ids"])
        .custom_serialize(
            ["planet_player_ids", "ship_player_ids"],
            comma_separated_integers().into(),
        )
        .build()
        .expect("model should build")
}

fn nullable_list_options() -> CodecOptions {
    CodecOptions::new()
        .serialize(|value| match value.as_array() {
            Some(items) if !items.is_empty() => Ok(json!(items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(","))),
            _ => Ok(Value::Null),
        })
        .unserialize(|raw| match raw {
            Value::Null => Ok(json!([])),
            Value::String(text) => Ok(Value::Array(
                text.split(',')
                    .map(|part| {
                        part.parse::<i64>()
                            .map(Value::from)
                            .map_err(|err| CodecError::InvalidValue(err.to_string()))
                    })
                    .collect::<Result<_, _>>()?,
            )),
            _ => Err(CodecError::InvalidValue("unexpected raw".to_string())),
        })
}

#[test]
fn default_json_codec_stores_text_and_reloads_structure() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = ModelClassBuilder::new("Planet", "planets")
        .attribute("resource_ids")
        .custom_serialize(["resource_ids"], CodecOptions::default())
        .build()
        .expect("model should build");
    repo.ensure_table(&class).expect("ensure table");

    let mut planet = Record::new(Arc::clone(&class));
    planet.set("resource_ids", json!([1, 2, 3])).expect("set attribute");
    let id = repo.save(&mut planet).expect("save record");

    assert_eq!(raw_column(&conn, "planets", "resource_ids", id), json!("[1,2,3]"));
    assert_eq!(planet.get("resource_ids").expect("read attribute"), &json!([1, 2, 3]));

    let loaded = repo.find(&class, id).expect("find record").expect("record should exist");
    assert_eq!(loaded.get("resource_ids").expect("read attribute"), &json!([1, 2, 3]));
}

#[test]
fn custom_codec_stores_comma_joined_integers() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = alliance_model();
    repo.ensure_table(&class).expect("ensure table");

    let mut alliance = Record::new(Arc::clone(&class));
    alliance.set("name", json!("Orion")).expect("set attribute");
    alliance.set("planet_player_ids", json!([4, 5])).expect("set attribute");
    let id = repo.save(&mut alliance).expect("save record");

    assert_eq!(raw_column(&conn, "alliances", "planet_player_ids", id), json!("4,5"));
    assert_eq!(raw_column(&conn, "alliances", "name", id), json!("Orion"));

    let loaded = repo.find(&class, id).expect("find record").expect("record should exist");
    assert_eq!(loaded.get("planet_player_ids").expect("read attribute"), &json!([4, 5]));
    assert_eq!(loaded.get("name").expect("read attribute"), &json!("Orion"));
}

#[test]
fn empty_list_round_trips_through_null_storage() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = ModelClassBuilder::new("Alliance", "alliances")
        .attribute("planet_player_ids")
        .custom_serialize(["planet_player_ids"], nullable_list_options())
        .build()
        .expect("model should build");
    repo.ensure_table(&class).expect("ensure table");

    let mut alliance = Record::new(Arc::clone(&class));
    alliance.set("planet_player_ids", json!([])).expect("set attribute");
    let id = repo.save(&mut alliance).expect("save record");

    assert_eq!(raw_column(&conn, "alliances", "planet_player_ids", id), Value::Null);
    assert_eq!(alliance.get("planet_player_ids").expect("read attribute"), &json!([]));

    let loaded = repo.find(&class, id).expect("find record").expect("record should exist");
    assert_eq!(loaded.get("planet_player_ids").expect("read attribute"), &json!([]));
}

#[test]
fn loaded_and_saved_records_have_no_changed_attributes() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = alliance_model();
    repo.ensure_table(&class).expect("ensure table");

    let mut alliance = Record::new(Arc::clone(&class));
    alliance.set("ship_player_ids", json!([7])).expect("set attribute");
    assert!(alliance.is_changed("ship_player_ids").expect("attribute should be declared"));

    let id = repo.save(&mut alliance).expect("save record");
    assert!(!alliance.has_changes());

    let loaded = repo.find(&class, id).expect("find record").expect("record should exist");
    for attribute in ["planet_player_ids", "ship_player_ids"] {
        assert!(!loaded.is_changed(attribute).expect("attribute should be declared"));
    }
}

#[test]
fn listed_records_are_decoded_and_unchanged() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = alliance_model();
    repo.ensure_table(&class).expect("ensure alliances table");

    let mut expected = Vec::new();
    for (planets, ships) in [(json!([4, 5]), json!([])), (json!([7]), json!([8, 9]))] {
        let mut alliance = Record::new(Arc::clone(&class));
        alliance
            .set("planet_player_ids", planets.clone())
            .expect("set planet_player_ids");
        alliance
            .set("ship_player_ids", ships.clone())
            .expect("set ship_player_ids");
        let id = repo.save(&mut alliance).expect("save alliance");
        expected.push((id, planets, ships));
    }
    expected.sort_by_key(|(id, _, _)| *id);

    let listed = repo.list(&class).expect("list alliances");
    assert_eq!(listed.len(), 2);
    for (record, (id, planets, ships)) in listed.iter().zip(&expected) {
        assert_eq!(record.id(), Some(*id));
        assert_eq!(
            record.get("planet_player_ids").expect("read planet_player_ids"),
            planets
        );
        assert_eq!(
            record.get("ship_player_ids").expect("read ship_player_ids"),
            ships
        );
        assert!(record.changed_attributes().is_empty());
    }
}

#[test]
fn repeated_saves_keep_structured_values_stable() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = alliance_model();
    repo.ensure_table(&class).expect("ensure table");

    let mut alliance = Record::new(Arc::clone(&class));
    alliance.set("planet_player_ids", json!([1, 2])).expect("set attribute");
    let id = repo.save(&mut alliance).expect("save record");
    repo.save(&mut alliance).expect("save record");

    alliance.set("planet_player_ids", json!([1, 2, 3])).expect("set attribute");
    repo.save(&mut alliance).expect("save record");

    assert_eq!(alliance.get("planet_player_ids").expect("read attribute"), &json!([1, 2, 3]));
    assert_eq!(raw_column(&conn, "alliances", "planet_player_ids", id), json!("1,2,3"));
    assert_eq!(repo.list(&class).expect("list records").len(), 1);
}

#[test]
fn parent_after_find_hook_and_codec_both_run_on_load() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let unit = ModelClassBuilder::new("Unit", "units")
        .attributes(["label", "cargo_ids"])
        .after_find(|record| {
            let label = record.get("label")?.as_str().unwrap_or_default().to_uppercase();
            record.set("label", json!(label))?;
            record.clear_changed("label")?;
            Ok(HookOutcome::Continue)
        })
        .build()
        .expect("model should build");
    let ship = ModelClassBuilder::extends("Ship", &unit)
        .custom_serialize(["cargo_ids"], comma_separated_integers().into())
        .build()
        .expect("model should build");
    repo.ensure_table(&ship).expect("ensure table");

    let mut record = Record::new(Arc::clone(&ship));
    record.set("label", json!("frigate")).expect("set attribute");
    record.set("cargo_ids", json!([9, 8])).expect("set attribute");
    let id = repo.save(&mut record).expect("save record");

    let loaded = repo.find(&ship, id).expect("find record").expect("record should exist");
    assert_eq!(loaded.get("label").expect("read attribute"), &json!("FRIGATE"));
    assert_eq!(loaded.get("cargo_ids").expect("read attribute"), &json!([9, 8]));
    assert!(!loaded.has_changes());

    let parent_view = repo.find(&unit, id).expect("find record").expect("record should exist");
    assert_eq!(parent_view.get("cargo_ids").expect("read attribute"), &json!("9,8"));
}

#[test]
fn codec_decode_runs_before_previously_declared_after_find_hooks() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = ModelClassBuilder::new("Fleet", "fleets")
        .attributes(["ship_ids", "ship_count"])
        .after_find(|record| {
            let count = record
                .get("ship_ids")?
                .as_array()
                .map(Vec::len)
                .ok_or_else(|| HookError::Message("ship_ids not decoded".to_string()))?;
            record.set("ship_count", json!(count))?;
            Ok(HookOutcome::Continue)
        })
        .custom_serialize(["ship_ids"], comma_separated_integers().into())
        .build()
        .expect("model should build");
    repo.ensure_table(&class).expect("ensure table");

    let mut fleet = Record::new(Arc::clone(&class));
    fleet.set("ship_ids", json!([3, 4, 5])).expect("set attribute");
    let id = repo.save(&mut fleet).expect("save record");

    let loaded = repo.find(&class, id).expect("find record").expect("record should exist");
    assert_eq!(loaded.get("ship_count").expect("read attribute"), &json!(3));
}

#[test]
fn failing_encode_aborts_save_and_retry_succeeds() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = alliance_model();
    repo.ensure_table(&class).expect("ensure table");

    let mut alliance = Record::new(Arc::clone(&class));
    alliance.set("planet_player_ids", json!([1])).expect("set attribute");
    alliance.set("ship_player_ids", json!([2, "x"])).expect("set attribute");

    let err = repo.save(&mut alliance).expect_err("save should fail");
    match err {
        RepoError::Hook {
            source: HookError::Codec { attribute, source },
            ..
        } => {
            assert_eq!(attribute, "ship_player_ids");
            assert!(matches!(source, CodecError::InvalidValue(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(alliance.is_new_record());
    assert_eq!(alliance.get("planet_player_ids").expect("read attribute"), &json!([1]));
    assert!(repo.list(&class).expect("list records").is_empty());

    alliance.set("ship_player_ids", json!([2, 3])).expect("set attribute");
    let id = repo.save(&mut alliance).expect("save record");
    assert_eq!(raw_column(&conn, "alliances", "planet_player_ids", id), json!("1"));
    assert_eq!(raw_column(&conn, "alliances", "ship_player_ids", id), json!("2,3"));
}

#[test]
fn malformed_stored_data_fails_the_load() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = ModelClassBuilder::new("Planet", "planets")
        .attribute("resource_ids")
        .custom_serialize(["resource_ids"], CodecOptions::default())
        .build()
        .expect("model should build");
    repo.ensure_table(&class).expect("ensure table");

    let mut planet = Record::new(Arc::clone(&class));
    planet.set("resource_ids", json!([1])).expect("set attribute");
    let id = repo.save(&mut planet).expect("save record");
    conn.execute(
        "UPDATE planets SET resource_ids = '[1,' WHERE id = ?1;",
        [id.to_string()],
    )
    .expect("execute sql");

    let err = repo.find(&class, id).expect_err("load should fail");
    assert!(matches!(
        err,
        RepoError::Hook {
            source: HookError::Codec {
                source: CodecError::Json(_),
                ..
            },
            ..
        }
    ));
}

#[test]
fn unknown_codec_attribute_fails_when_saving() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let repo = SqliteRecordRepository::try_new(&conn).expect("repo should be ready");
    let class = ModelClassBuilder::new("Planet", "planets")
        .attribute("name")
        .custom_serialize(["moons"], CodecOptions::default())
        .build()
        .expect("model should build");
    repo.ensure_table(&class).expect("ensure table");

    let mut planet = Record::new(Arc::clone(&class));
    let err = repo.save(&mut planet).expect_err("save should fail");
    assert!(err.to_string().contains("unknown attribute `moons`"));
}

#[test]
fn caller_supplied_codec_round_trips() {
    let codec = AttributeCodec::new(
        |value| Ok(json!(value.as_str().map(|text| text.chars().rev().collect::<String>()))),
        |raw| Ok(json!(raw.as_str().map(|text| text.chars().rev().collect::<String>()))),
    );
    for value in [json!("abc"), json!("a,b"), json!("")] {
        let raw = codec.encode(&value).expect("encode value");
        assert_eq!(codec.decode(&raw).expect("decode value"), value);
    }

    let ints = comma_separated_integers();
    for value in [json!([]), json!([0]), json!([-5, 10, 300])] {
        let raw = ints.encode(&value).expect("encode value");
        assert_eq!(ints.decode(&raw).expect("decode value"), value);
    }
}
