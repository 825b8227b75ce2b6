mod common;

use std::{cell::Cell, rc::Rc};

use chrono::NaiveDateTime;
use common::RecordingDriver;
use entitymap::{
    AccessMode, Collection, ConnectionConfig, Dialect, EntityMapError, Field, LifecycleState, Object, PersistenceContext,
    Record, RecordProvider, SqliteDriver, Value,
};
use serde_json::json;

fn project(name: &str) -> Object {
    let project = Object::record("Project");
    project.set("Name", name);
    project
}

fn bug(title: &str, severity: i64) -> Object {
    Object::new(
        "Bug",
        Record::new("Bug")
            .with("Title", title)
            .with("Severity", severity),
    )
}

#[test]
fn test_save_inserts_and_assigns_generated_key() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    assert_eq!(alpha.state(), LifecycleState::Transient);
    ctx.save(&alpha).expect("save");
    assert_eq!(alpha.state(), LifecycleState::Managed);
    assert_eq!(alpha.value("ProjectID"), Value::Int(1));
    assert_eq!(alpha.value("StatusID"), Value::Int(1));

    let beta = project("Beta");
    ctx.save(&beta).expect("save");
    assert_eq!(beta.value("ProjectID"), Value::Int(2));
    assert_eq!(common::count_rows(&ctx, "SELECT COUNT(*) FROM {Project}"), 2);
}

#[test]
fn test_load_returns_cached_identity() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");

    let loaded = ctx.load("Project", 1).expect("load").expect("row");
    assert!(Object::ptr_eq(&alpha, &loaded));

    ctx.clear_cache();
    let fresh = ctx.load("Project", 1).expect("load").expect("row");
    assert!(!Object::ptr_eq(&alpha, &fresh));
    assert_eq!(fresh.value("Name"), Value::from("Alpha"));
    let again = ctx.load("Project", 1).expect("load").expect("row");
    assert_eq!(fresh, again);
}

#[test]
fn test_find_and_load_share_identity() {
    let ctx = common::sqlite_context();
    ctx.save(&project("Alpha")).expect("save");
    ctx.clear_cache();

    let found = ctx
        .from("Project p")
        .filter_with("{p.Name} = ?", ["Alpha"])
        .find(&ctx)
        .expect("find");
    assert_eq!(found.len(), 1);
    let loaded = ctx.load("Project", 1).expect("load").expect("row");
    assert!(Object::ptr_eq(&found[0], &loaded));
}

#[test]
fn test_cached_load_issues_no_select() {
    let ctx = common::sqlite_context();
    ctx.save(&project("Alpha")).expect("save");
    ctx.reset_metrics().expect("reset");
    ctx.load("Project", 1).expect("load");
    assert_eq!(ctx.metrics().expect("metrics").select_count, 0);
    ctx.clear_cache();
    ctx.load("Project", 1).expect("load");
    assert_eq!(ctx.metrics().expect("metrics").select_count, 1);
}

#[test]
fn test_load_missing_row_returns_none() {
    let ctx = common::sqlite_context();
    assert!(ctx.load("Project", 99).expect("load").is_none());
}

#[test]
fn test_round_trip_preserves_values() {
    let ctx = common::sqlite_context();
    let crash = bug("Crash on start", 5);
    ctx.save(&crash).expect("save");
    ctx.clear_cache();

    let loaded = ctx.load("Bug", 1).expect("load").expect("row");
    assert_eq!(loaded.value("Title"), Value::from("Crash on start"));
    assert_eq!(loaded.value("Severity"), Value::Int(5));
    assert_eq!(loaded.value("ProjectID"), Value::Null);
    assert!(matches!(loaded.value("Reported"), Value::DateTime(_)));
}

#[test]
fn test_default_expression_applies_only_to_null_values() {
    let ctx = common::sqlite_context();
    let reported = NaiveDateTime::parse_from_str("2024-03-01 10:30:00", "%Y-%m-%d %H:%M:%S")
        .expect("datetime");
    let dated = bug("Dated", 2);
    dated.set("Reported", reported);
    ctx.save(&dated).expect("save");
    ctx.clear_cache();
    let loaded = ctx.load("Bug", 1).expect("load").expect("row");
    assert_eq!(loaded.value("Reported"), Value::DateTime(reported));
}

#[test]
fn test_unchanged_save_issues_no_update() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");
    ctx.reset_metrics().expect("reset");
    ctx.save(&alpha).expect("save again");
    let metrics = ctx.metrics().expect("metrics");
    assert_eq!(metrics.update_count, 0);
    assert_eq!(metrics.insert_count, 0);
}

#[test]
fn test_update_writes_only_changed_columns() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");
    alpha.set("Name", "Alpha 2");
    ctx.reset_metrics().expect("reset");
    ctx.save(&alpha).expect("save");
    assert_eq!(
        common::history(&ctx),
        vec!["UPDATE projects SET name = ? WHERE id = ?"]
    );

    ctx.clear_cache();
    let loaded = ctx.load("Project", 1).expect("load").expect("row");
    assert_eq!(loaded.value("Name"), Value::from("Alpha 2"));
    assert_eq!(loaded.value("StatusID"), Value::Int(1));
}

#[test]
fn test_update_without_snapshot_writes_every_column() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");
    ctx.clear_cache();
    ctx.reset_metrics().expect("reset");
    ctx.save(&alpha).expect("save");
    assert_eq!(
        common::history(&ctx),
        vec!["UPDATE projects SET name = ?, status_id = ? WHERE id = ?"]
    );
}

#[test]
fn test_refresh_reads_storage_and_replaces_cache_entry() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");
    ctx.with_connection(|conn| conn.execute("UPDATE projects SET name = 'Renamed' WHERE id = 1", &[]))
        .expect("raw update");

    let refreshed = ctx.refresh(&alpha).expect("refresh").expect("row");
    assert!(!Object::ptr_eq(&alpha, &refreshed));
    assert_eq!(refreshed.value("Name"), Value::from("Renamed"));
    assert_eq!(alpha.value("Name"), Value::from("Alpha"));

    let cached = ctx.load("Project", 1).expect("load").expect("row");
    assert!(Object::ptr_eq(&refreshed, &cached));
}

#[test]
fn test_delete_object_removes_row_and_cache_entry() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");
    ctx.delete_object(&alpha).expect("delete");
    assert_eq!(alpha.state(), LifecycleState::Removed);
    assert!(ctx.cache().is_empty());
    assert!(ctx.load("Project", 1).expect("load").is_none());
}

#[test]
fn test_delete_by_key() {
    let ctx = common::sqlite_context();
    ctx.save(&project("Alpha")).expect("save");
    ctx.save(&project("Beta")).expect("save");
    ctx.delete("Project", 1).expect("delete");
    assert_eq!(common::count_rows(&ctx, "SELECT COUNT(*) FROM {Project}"), 1);
}

#[test]
fn test_load_requires_complete_primary_key() {
    let ctx = common::sqlite_context();
    assert!(matches!(
        ctx.load("Project", Value::Null).unwrap_err(),
        EntityMapError::Precondition(_)
    ));
    assert!(matches!(
        ctx.load("Membership", 1).unwrap_err(),
        EntityMapError::Precondition(_)
    ));
    assert!(matches!(
        ctx.delete("Project", Vec::<Value>::new()).unwrap_err(),
        EntityMapError::Precondition(_)
    ));
}

#[test]
fn test_composite_primary_key_round_trip() {
    let ctx = common::sqlite_context();
    let membership = Object::new(
        "Membership",
        Record::new("Membership")
            .with("ProjectID", 1)
            .with("UserID", 2)
            .with("Role", "owner"),
    );
    ctx.save(&membership).expect("save");
    assert!(
        ctx.cache()
            .retrieve("Membership", &[Value::Int(1), Value::Int(2)])
            .is_some()
    );

    ctx.clear_cache();
    let loaded = ctx
        .load("Membership", vec![Value::Int(1), Value::Int(2)])
        .expect("load")
        .expect("row");
    assert_eq!(loaded.value("Role"), Value::from("owner"));
}

#[test]
fn test_embedded_defaults_and_population() {
    let ctx = common::sqlite_context();
    let user = Object::new(
        "User",
        Record::new("User")
            .with("Name", "Ann")
            .with("Address", Record::new("Address").with("Street", "Main St")),
    );
    ctx.save(&user).expect("save");
    match user.get("Address") {
        Some(Field::Embedded(address)) => assert_eq!(address.value("City"), Value::from("Springfield")),
        other => panic!("unexpected address {other:?}"),
    }

    ctx.clear_cache();
    let loaded = ctx.load("User", 1).expect("load").expect("row");
    match loaded.get("Address") {
        Some(Field::Embedded(address)) => {
            assert_eq!(address.value("Street"), Value::from("Main St"));
            assert_eq!(address.value("City"), Value::from("Springfield"));
        }
        other => panic!("unexpected address {other:?}"),
    }
    let address = ctx.registry().embeddable("Address").expect("address");
    assert_eq!(address.access().mode("City"), AccessMode::DirectField);
}

#[test]
fn test_select_filters_and_counts() {
    let ctx = common::sqlite_context();
    for (title, severity) in [("a", 1), ("b", 3), ("c", 4), ("d", 5)] {
        ctx.save(&bug(title, severity)).expect("save");
    }
    let severe = ctx
        .select("Bug", "{Bug.Severity} >= ?", &[Value::Int(3)])
        .expect("select");
    assert_eq!(severe.len(), 3);

    let first = ctx
        .select_one("Bug", "{Bug.Severity} = ?", &[Value::Int(4)])
        .expect("select")
        .expect("row");
    assert_eq!(first.value("Title"), Value::from("c"));

    let query = ctx
        .from("Bug b")
        .filter_with("{b.Severity} > ?", [1])
        .order_by("{b.Severity} DESC")
        .limit(2);
    assert_eq!(query.count(&ctx).expect("count"), 3);
    let page = query.find(&ctx).expect("find");
    let titles: Vec<Value> = page.iter().map(|b| b.value("Title")).collect();
    assert_eq!(titles, vec![Value::from("d"), Value::from("c")]);
}

#[test]
fn test_hydrate_hook_runs_for_fresh_objects() {
    let hydrated = Rc::new(Cell::new(0));
    let counter = hydrated.clone();
    let driver = SqliteDriver::open_in_memory().expect("sqlite");
    driver.execute_batch(common::SCHEMA).expect("schema");
    let ctx = PersistenceContext::new(
        common::registry(),
        ConnectionConfig::from_driver(Dialect::Sqlite, driver),
        RecordProvider,
    )
    .expect("context")
    .on_hydrate(move |obj| {
        counter.set(counter.get() + 1);
        obj.set("Loaded", true);
        Ok(())
    });

    ctx.save(&project("Alpha")).expect("save");
    assert_eq!(hydrated.get(), 0);
    ctx.clear_cache();
    let loaded = ctx.load("Project", 1).expect("load").expect("row");
    ctx.load("Project", 1).expect("load");
    assert_eq!(hydrated.get(), 1);
    assert_eq!(loaded.value("Loaded"), Value::Bool(true));
}

#[test]
fn test_to_json_nests_embedded_groups() {
    let ctx = common::sqlite_context();
    let user = Object::new(
        "User",
        Record::new("User")
            .with("Name", "Ann")
            .with("Address", Record::new("Address").with("Street", "Main St")),
    );
    ctx.save(&user).expect("save");
    assert_eq!(
        ctx.to_json(&user).expect("json"),
        json!({
            "UserID": 1,
            "Name": "Ann",
            "Address": { "Street": "Main St", "City": "Springfield" },
            "ProfileID": null
        })
    );
}

#[test]
fn test_failed_save_rolls_back_and_stays_transient() {
    let ctx = common::sqlite_context();
    let untitled = Object::record("Bug");
    let err = ctx.save(&untitled).unwrap_err();
    assert!(err.is_driver_error());
    assert_eq!(untitled.state(), LifecycleState::Transient);
    let level = ctx
        .with_connection(|conn| Ok(conn.transaction_level()))
        .expect("connection");
    assert_eq!(level, 0);
    assert_eq!(ctx.metrics().expect("metrics").tx_rollback_count, 1);
}

#[test]
fn test_failed_cascade_restores_objects_and_cache() {
    let ctx = common::sqlite_context();
    let alpha = project("Alpha");
    let titled = Object::new("Bug", Record::new("Bug").with("Title", "good"));
    let untitled = Object::record("Bug");
    alpha.set("Bugs", Collection::from_iter([titled.clone(), untitled.clone()]));

    let err = ctx.save(&alpha).unwrap_err();
    assert!(err.is_driver_error());
    assert_eq!(common::count_rows(&ctx, "SELECT COUNT(*) FROM {Project}"), 0);
    assert_eq!(common::count_rows(&ctx, "SELECT COUNT(*) FROM {Bug}"), 0);
    for obj in [&alpha, &titled, &untitled] {
        assert_eq!(obj.state(), LifecycleState::Transient);
    }
    assert_eq!(alpha.value("ProjectID"), Value::Null);
    assert_eq!(titled.value("ID"), Value::Null);
    assert_eq!(titled.value("ProjectID"), Value::Null);
    assert!(ctx.cache().is_empty());
    assert!(ctx.load("Bug", 1).expect("load").is_none());

    untitled.set("Title", "fixed");
    ctx.save(&alpha).expect("retry");
    assert_eq!(common::count_rows(&ctx, "SELECT COUNT(*) FROM {Project}"), 1);
    assert_eq!(common::count_rows(&ctx, "SELECT COUNT(*) FROM {Bug}"), 2);
    assert_eq!(titled.value("ProjectID"), alpha.value("ProjectID"));
    assert_eq!(untitled.value("ProjectID"), alpha.value("ProjectID"));
}

#[test]
fn test_save_statement_sequence() {
    let (driver, log) = RecordingDriver::new();
    let ctx = common::recording_context(Dialect::PgSql, driver);
    let alpha = project("Alpha");
    ctx.save(&alpha).expect("save");
    assert_eq!(
        log.statements(),
        vec![
            "native:begin",
            "INSERT INTO projects (name, status_id) VALUES (?, ?)",
            "last_insert_id:projects_id_seq",
            "native:commit",
        ]
    );
    assert_eq!(
        log.params(1),
        vec![
            entitymap::SqlValue::Text("Alpha".into()),
            entitymap::SqlValue::Integer(1)
        ]
    );
    assert_eq!(alpha.value("ProjectID"), Value::Int(1));
}

#[test]
fn test_insert_inlines_default_expression() {
    let (driver, log) = RecordingDriver::new();
    let ctx = common::recording_context(Dialect::Sqlite, driver);
    ctx.save(&bug("Crash", 3)).expect("save");
    assert_eq!(
        log.statements()[1],
        "INSERT INTO bugs (title, severity, project_id, reported_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)"
    );
}

#[test]
fn test_driver_failure_rolls_back() {
    let (driver, log) = RecordingDriver::new();
    let ctx = common::recording_context(Dialect::Sqlite, driver.failing_on("INSERT"));
    let alpha = project("Alpha");
    assert!(ctx.save(&alpha).unwrap_err().is_driver_error());
    assert_eq!(log.statements().last().map(String::as_str), Some("native:rollback"));
    assert_eq!(log.count("native:commit"), 0);
    assert_eq!(alpha.state(), LifecycleState::Transient);
}
