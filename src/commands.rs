//! Command implementations behind the CLI. Each returns a JSON document so
//! the binary only has to print it.

use anyhow::{Context, Result};
use flightdb_store::{FlightStore, TelemetryPayload};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

/// Ingest a JSON payload file into `session_id`.
pub fn store(db: &FlightStore, session_id: &str, payload_path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read payload {}", payload_path.display()))?;
    let payload = TelemetryPayload::from_json_str(&contents)?;
    let report = db
        .store(session_id, &payload)
        .with_context(|| format!("Failed to store flight data for session {session_id}"))?;
    Ok(serde_json::to_value(report)?)
}

/// Run a statement and render rows as JSON records.
pub fn query(db: &FlightStore, session_id: &str, statement: &str) -> Result<Value> {
    let result = db.query(session_id, statement)?;
    Ok(json!({
        "columns": result.column_names(),
        "row_count": result.row_count,
        "rows": result.to_records(),
    }))
}

/// Tables, declared columns and descriptions of a session.
pub fn schema(db: &FlightStore, session_id: &str) -> Result<Value> {
    let tables = db.database_info(session_id)?;
    Ok(serde_json::to_value(tables)?)
}

/// Reconcile column types, then summarize what the session now contains.
pub fn reconcile(db: &FlightStore, session_id: &str) -> Result<Value> {
    info!("Starting database cleanup for session: {session_id}");
    let report = db
        .reconcile(session_id)
        .with_context(|| format!("Failed to clean up session {session_id}"))?;

    // Verification is best-effort: the repair already happened.
    let tables = match db.database_info(session_id) {
        Ok(tables) => {
            info!("Database contains {} tables", tables.len());
            tables
                .iter()
                .map(|t| json!({"name": t.name, "columns": t.columns.len()}))
                .collect()
        }
        Err(e) => {
            warn!("Could not verify database structure: {e}");
            Vec::new()
        }
    };

    Ok(json!({ "report": report, "tables": tables }))
}

/// Session ids with a store file under the configured base directory.
pub fn sessions(db: &FlightStore) -> Value {
    json!(db.sessions().stored_sessions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_payload(dir: &Path, body: &Value) -> std::path::PathBuf {
        let path = dir.join("payload.json");
        std::fs::write(&path, serde_json::to_string(body).unwrap()).unwrap();
        path
    }

    #[test]
    fn store_then_query_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let db = FlightStore::new(&tmp.path().join("data"));
        let path = write_payload(
            tmp.path(),
            &json!({"ATTITUDE": {"time_boot_ms": [100, 200], "roll": [0.1, 0.2]}}),
        );

        let report = store(&db, "s1", &path).unwrap();
        assert_eq!(report["messages"][0]["rows_inserted"], 2);

        let out = query(&db, "s1", "SELECT roll FROM ATTITUDE ORDER BY time_boot_ms").unwrap();
        assert_eq!(out["row_count"], 2);
        assert_eq!(out["rows"], json!([{"roll": 0.1}, {"roll": 0.2}]));
    }

    #[test]
    fn store_reports_unreadable_payload() {
        let tmp = TempDir::new().unwrap();
        let db = FlightStore::new(tmp.path());
        let err = store(&db, "s1", &tmp.path().join("missing.json")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read payload"));
    }

    #[test]
    fn reconcile_summarizes_tables() {
        let tmp = TempDir::new().unwrap();
        let db = FlightStore::new(tmp.path());
        let path = write_payload(tmp.path(), &json!({"GPS": {"TimeUS": [[1, 2]], "lat": [1.5]}}));
        store(&db, "s1", &path).unwrap();

        let out = reconcile(&db, "s1").unwrap();
        assert_eq!(out["report"]["rebuilt"], json!(["GPS"]));
        assert_eq!(out["tables"], json!([{"name": "GPS", "columns": 2}]));
        assert_eq!(sessions(&db), json!(["s1"]));
    }

    #[test]
    fn schema_lists_declared_types() {
        let tmp = TempDir::new().unwrap();
        let db = FlightStore::new(tmp.path());
        let path = write_payload(tmp.path(), &json!({"MODE": {"name": ["AUTO"], "armed": [true]}}));
        store(&db, "s1", &path).unwrap();

        let out = schema(&db, "s1").unwrap();
        assert_eq!(
            out,
            json!([{
                "name": "MODE",
                "description": null,
                "columns": [
                    {"name": "name", "declared_type": "VARCHAR"},
                    {"name": "armed", "declared_type": "BOOLEAN"}
                ]
            }])
        );
    }
}
