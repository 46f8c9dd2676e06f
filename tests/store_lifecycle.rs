//! End-to-end behavior of the flight store: ingestion, queries, schema
//! introspection and type reconciliation through the public API.

use flightdb::{Cell, ErrorKind, FlightStore, TelemetryPayload};
use serde_json::json;

fn payload(value: serde_json::Value) -> TelemetryPayload {
    TelemetryPayload::from_value(value).unwrap()
}

fn scalar(db: &FlightStore, session: &str, sql: &str) -> Cell {
    let result = db.query(session, sql).unwrap();
    result.columns[0].values[0].clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingestion
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn attitude_rows_are_queryable_in_order() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    db.store(
        "s1",
        &payload(json!({"ATTITUDE": {"time_boot_ms": [100, 200], "roll": [0.1, 0.2]}})),
    )
    .unwrap();

    let result = db
        .query("s1", "SELECT roll FROM ATTITUDE ORDER BY time_boot_ms")
        .unwrap();
    assert_eq!(result.row_count, 2);
    assert_eq!(
        result.column("roll").unwrap().values,
        vec![Cell::Float(0.1), Cell::Float(0.2)]
    );
}

#[test]
fn nested_time_field_stores_first_inner_element() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    db.store("s1", &payload(json!({"SYSTEM_TIME": {"time_unix_usec": [[[5]]]}})))
        .unwrap();

    assert_eq!(
        scalar(&db, "s1", "SELECT time_unix_usec FROM SYSTEM_TIME"),
        Cell::Integer(5)
    );
    let info = db.database_info("s1").unwrap();
    assert_eq!(info[0].columns[0].declared_type, "BIGINT");
}

#[test]
fn ragged_columns_fill_missing_cells_with_null() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    let report = db
        .store("s1", &payload(json!({"GPS": {"TimeUS": [1, 2, 3], "lat": [10.5]}})))
        .unwrap();
    assert_eq!(report.total_rows(), 3);

    let result = db.query("s1", "SELECT lat FROM GPS ORDER BY TimeUS").unwrap();
    assert_eq!(
        result.column("lat").unwrap().values,
        vec![Cell::Float(10.5), Cell::Null, Cell::Null]
    );
}

#[test]
fn nested_mapping_fails_but_earlier_messages_persist() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    let err = db
        .store(
            "s1",
            &payload(json!({
                "HEARTBEAT": {"type": [1]},
                "BAD": {"x": [{"a": 1}]}
            })),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("unsupported nested mapping"));

    assert_eq!(
        scalar(&db, "s1", "SELECT COUNT(*) FROM HEARTBEAT"),
        Cell::Integer(1)
    );
    let tables: Vec<String> = db
        .database_info("s1")
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tables, vec!["HEARTBEAT"]);
}

#[test]
fn repeated_messages_append_to_the_same_table() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());
    let batch = payload(json!({"VFR_HUD": {"airspeed": [12.0, 12.5]}}));

    let first = db.store("s1", &batch).unwrap();
    let second = db.store("s1", &batch).unwrap();
    assert!(first.messages[0].first_seen);
    assert!(!second.messages[0].first_seen);

    assert_eq!(
        scalar(&db, "s1", "SELECT COUNT(*) FROM VFR_HUD"),
        Cell::Integer(4)
    );
}

#[test]
fn unknown_field_on_known_table_is_a_schema_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());
    db.store("s1", &payload(json!({"GPS": {"lat": [1.0]}}))).unwrap();

    let err = db
        .store("s1", &payload(json!({"GPS": {"lat": [2.0], "lon": [3.0]}})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn invalid_sql_is_a_query_error_with_diagnostic() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    let err = db.query("s1", "SELECT * FROM NOPE").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
    assert!(err.to_string().contains("NOPE"));
}

#[test]
fn gps_and_global_position_join_on_timestamps() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    db.store(
        "test_session",
        &payload(json!({
            "GPS_RAW_INT": {
                "time_usec": [608_463_000, 608_464_000, 608_465_000],
                "lat": [37.7749, 37.7750, 37.7751],
                "lon": [-122.4194, -122.4195, -122.4196],
                "alt": [100, 101, 102],
                "satellites_visible": [8, 9, 10]
            },
            "GLOBAL_POSITION_INT": {
                "time_boot_ms": [608_463_000, 608_464_000, 608_465_000],
                "lat": [37.7749, 37.7750, 37.7751],
                "relative_alt": [50, 51, 52],
                "hdg": [180, 181, 182]
            }
        })),
    )
    .unwrap();

    let result = db
        .query(
            "test_session",
            "SELECT g.time_usec AS gps_time_usec, g.satellites_visible AS sats, \
             p.relative_alt AS rel_alt, p.hdg AS heading \
             FROM GPS_RAW_INT g \
             JOIN GLOBAL_POSITION_INT p ON g.time_usec = p.time_boot_ms \
             ORDER BY g.time_usec",
        )
        .unwrap();

    assert_eq!(result.row_count, 3);
    assert_eq!(
        result.column_names(),
        vec!["gps_time_usec", "sats", "rel_alt", "heading"]
    );
    assert_eq!(
        result.row(2).unwrap(),
        vec![
            &Cell::Integer(608_465_000),
            &Cell::Integer(10),
            &Cell::Integer(52),
            &Cell::Integer(182)
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconciliation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reconcile_repairs_encoded_arrays_in_numeric_columns() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());

    // First sample decides BIGINT; the later nested list lands as JSON text.
    db.store(
        "s1",
        &payload(json!({"RC": {"hits": [3, [[7, 8]]], "label": ["a", "b"]}})),
    )
    .unwrap();
    assert_eq!(
        scalar(&db, "s1", "SELECT hits FROM RC WHERE label = 'b'"),
        Cell::Text("[[7,8]]".into())
    );

    let report = db.reconcile("s1").unwrap();
    assert_eq!(report.rebuilt, vec!["RC"]);
    assert!(report.failed.is_empty());

    assert_eq!(
        scalar(&db, "s1", "SELECT hits FROM RC WHERE label = 'b'"),
        Cell::Integer(7)
    );
    assert_eq!(
        scalar(&db, "s1", "SELECT COUNT(*) FROM RC"),
        Cell::Integer(2)
    );
    assert_eq!(
        scalar(
            &db,
            "s1",
            "SELECT COUNT(*) FROM RC WHERE typeof(hits) NOT IN ('integer', 'null')"
        ),
        Cell::Integer(0)
    );

    let again = db.reconcile("s1").unwrap();
    assert!(again.rebuilt.is_empty());
    assert_eq!(again.clean, vec!["RC"]);
}

#[test]
fn reconcile_keeps_schema_and_later_ingestion_working() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db = FlightStore::new(tmp.path());
    db.store("s1", &payload(json!({"GPS": {"TimeUS": [1, [2, 3]], "lat": [1.5, 2.5]}})))
        .unwrap();

    let before = db.database_info("s1").unwrap();
    db.reconcile("s1").unwrap();
    let after = db.database_info("s1").unwrap();
    assert_eq!(before, after);

    db.store("s1", &payload(json!({"GPS": {"TimeUS": [4], "lat": [3.5]}})))
        .unwrap();
    let result = db.query("s1", "SELECT TimeUS FROM GPS ORDER BY rowid").unwrap();
    assert_eq!(
        result.column("TimeUS").unwrap().values,
        vec![Cell::Integer(1), Cell::Integer(2), Cell::Integer(4)]
    );
}
