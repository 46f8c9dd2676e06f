//! Type reconciliation: rewrite tables whose numeric columns hold text-encoded
//! arrays (or other unparsable text) left by an earlier normalization pass.
//!
//! Each table is repaired independently. A table that fails is logged and
//! skipped; the pass as a whole still succeeds.

use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::{quote_ident, read_table_columns, ColumnInfo};
use crate::error::{Result, StoreError};
use crate::session::Session;
use crate::types::{Cell, ColumnType};

/// Table-level outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Tables rewritten through a shadow table.
    pub rebuilt: Vec<String>,
    /// Tables that were empty or already consistent.
    pub clean: Vec<String>,
    /// Tables whose repair failed and were left untouched.
    pub failed: Vec<String>,
}

enum TableOutcome {
    Rebuilt,
    Clean,
}

/// Repair every table the session knows about.
pub fn reconcile(session: &mut Session) -> ReconcileReport {
    let session_id = session.id().to_string();
    let tables = session.catalog().table_names();
    info!(session = %session_id, tables = tables.len(), "reconciling column types");

    let mut report = ReconcileReport::default();
    for table in tables {
        match reconcile_table(session.conn_mut(), &session_id, &table) {
            Ok(TableOutcome::Rebuilt) => {
                info!(session = %session_id, table = %table, "rebuilt table");
                report.rebuilt.push(table);
            }
            Ok(TableOutcome::Clean) => report.clean.push(table),
            Err(e) => {
                error!(session = %session_id, table = %table, "error reconciling table: {e}");
                report.failed.push(table);
            }
        }
    }

    info!(
        session = %session_id,
        rebuilt = report.rebuilt.len(),
        failed = report.failed.len(),
        "reconciliation complete"
    );
    report
}

fn reconcile_table(conn: &mut Connection, session_id: &str, table: &str) -> Result<TableOutcome> {
    let columns = read_table_columns(conn, session_id, table)?;
    let mut rows = read_rows(conn, session_id, table, &columns)?;
    if rows.is_empty() {
        return Ok(TableOutcome::Clean);
    }

    let mut changed = false;
    for row in &mut rows {
        for (cell, column) in row.iter_mut().zip(&columns) {
            let repaired = repair_cell(cell, column.column_type, table, &column.name);
            if repaired != *cell {
                *cell = repaired;
                changed = true;
            }
        }
    }
    if !changed {
        return Ok(TableOutcome::Clean);
    }

    rebuild_table(conn, table, &columns, &rows)
        .map_err(|e| StoreError::connection(session_id, format!("rebuilding table {table}"), e))?;
    Ok(TableOutcome::Rebuilt)
}

fn read_rows(
    conn: &Connection,
    session_id: &str,
    table: &str,
    columns: &[ColumnInfo],
) -> Result<Vec<Vec<Cell>>> {
    let select = format!(
        "SELECT {} FROM {} ORDER BY rowid",
        columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", "),
        quote_ident(table)
    );
    let read = || -> rusqlite::Result<Vec<Vec<Cell>>> {
        let mut stmt = conn.prepare(&select)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                cells.push(Cell::from(row.get_ref(index)?));
            }
            out.push(cells);
        }
        Ok(out)
    };
    read().map_err(|e| StoreError::connection(session_id, format!("reading table {table}"), e))
}

/// Swap in a shadow copy with identical declared columns, all in one
/// transaction: the original is either fully replaced or untouched.
fn rebuild_table(
    conn: &mut Connection,
    table: &str,
    columns: &[ColumnInfo],
    rows: &[Vec<Cell>],
) -> rusqlite::Result<()> {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.declared_type))
        .collect();
    let column_names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();

    let tx = conn.transaction()?;
    let shadow = free_shadow_name(&tx, table)?;
    tx.execute_batch(&format!(
        "CREATE TABLE {} ({})",
        quote_ident(&shadow),
        column_defs.join(", ")
    ))?;
    {
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&shadow),
            column_names.join(", "),
            placeholders.join(", ")
        ))?;
        for row in rows {
            insert.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.execute_batch(&format!(
        "DROP TABLE {original};
         ALTER TABLE {shadow_q} RENAME TO {original};",
        original = quote_ident(table),
        shadow_q = quote_ident(&shadow)
    ))?;
    tx.commit()
}

/// First `{table}__reconcile[N]` name not taken by any table in the store.
/// Table names compare case-insensitively in SQLite.
fn free_shadow_name(conn: &Connection, table: &str) -> rusqlite::Result<String> {
    let mut taken = conn.prepare(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE)",
    )?;
    let mut suffix = 0_u32;
    loop {
        let candidate = if suffix == 0 {
            format!("{table}__reconcile")
        } else {
            format!("{table}__reconcile{suffix}")
        };
        if !taken.query_row([&candidate], |row| row.get::<_, bool>(0))? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// Bring one stored cell in line with its column's declared type.
///
/// Only Integer and Float columns are touched. Text shaped like an encoded
/// array is reduced to its first element (one level deeper when that element
/// is itself an array); whatever cannot then be read as the declared number
/// becomes NULL with a warning.
pub fn repair_cell(cell: &Cell, target: ColumnType, table: &str, column: &str) -> Cell {
    if !target.is_numeric() {
        return cell.clone();
    }

    let value = match cell {
        Cell::Text(text) if looks_like_encoded_array(text) => match first_array_element(text) {
            Some(first) => first,
            None => {
                warn!(table, column, "could not decode array value {text:?}, storing NULL");
                return Cell::Null;
            }
        },
        other => other.clone(),
    };

    let repaired = match target {
        ColumnType::Integer => to_integer(&value),
        _ => to_float(&value),
    };
    match repaired {
        Some(cell) => cell,
        None => {
            warn!(table, column, "could not convert {value} to {target}, storing NULL");
            Cell::Null
        }
    }
}

fn looks_like_encoded_array(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('[') && trimmed.ends_with(']')
}

fn first_array_element(text: &str) -> Option<Cell> {
    let serde_json::Value::Array(items) = serde_json::from_str::<serde_json::Value>(text.trim()).ok()? else {
        return None;
    };
    let first = match items.into_iter().next()? {
        serde_json::Value::Array(inner) => inner.into_iter().next()?,
        scalar => scalar,
    };
    match first {
        serde_json::Value::Null => Some(Cell::Null),
        serde_json::Value::Bool(b) => Some(Cell::Boolean(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Cell::Integer(i)),
            None => n.as_f64().map(Cell::Float),
        },
        serde_json::Value::String(s) => Some(Cell::Text(s)),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

/// 2^63: the first magnitude an `i64` cannot hold.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Cell) -> Option<Cell> {
    // Out-of-range values would saturate through `as`; treat them as unparsable.
    let truncate = |f: f64| {
        let whole = f.trunc();
        (whole >= -I64_LIMIT && whole < I64_LIMIT).then(|| Cell::Integer(whole as i64))
    };
    match value {
        Cell::Null => Some(Cell::Null),
        Cell::Integer(i) => Some(Cell::Integer(*i)),
        Cell::Boolean(b) => Some(Cell::Integer(i64::from(*b))),
        Cell::Float(f) => truncate(*f),
        Cell::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Cell::Integer)
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        Cell::Blob(_) => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: &Cell) -> Option<Cell> {
    match value {
        Cell::Null => Some(Cell::Null),
        Cell::Float(f) => Some(Cell::Float(*f)),
        Cell::Integer(i) => Some(Cell::Float(*i as f64)),
        Cell::Boolean(b) => Some(Cell::Float(if *b { 1.0 } else { 0.0 })),
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Cell::Float),
        Cell::Blob(_) => None,
    }
}
