//! Ingestion: columnar message batches → normalized rows → per-message tables.
//!
//! Durability is deliberately partial. A bad cell aborts its message before
//! anything is written; messages earlier in the same call stay committed. An
//! insert failure keeps the rows inserted before it.

use rusqlite::params_from_iter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{quote_ident, TableSchema};
use crate::error::{Result, StoreError};
use crate::normalize::normalize;
use crate::reconcile::repair_cell;
use crate::session::Session;
use crate::types::{Cell, MessageBatch, RawValue, Row, TelemetryPayload};

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Coerce numeric cells to the declared column type before inserting.
    pub coerce_to_declared_types: bool,
}

/// What one message batch contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageOutcome {
    pub message: String,
    pub rows_inserted: usize,
    /// The catalog did not know this message before the call.
    pub first_seen: bool,
    /// Every column was empty, nothing was written.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub session_id: String,
    pub messages: Vec<MessageOutcome>,
}

impl IngestReport {
    pub fn total_rows(&self) -> usize {
        self.messages.iter().map(|m| m.rows_inserted).sum()
    }
}

/// Store every message of `payload`, in order, into the session.
pub fn ingest(
    session: &mut Session,
    payload: &TelemetryPayload,
    options: IngestOptions,
) -> Result<IngestReport> {
    info!(session = session.id(), "storing flight data");
    let mut outcomes = Vec::with_capacity(payload.messages().len());
    for message in payload.messages() {
        outcomes.push(ingest_message(session, message, options)?);
    }

    let report = IngestReport {
        session_id: session.id().to_string(),
        messages: outcomes,
    };
    info!(
        session = session.id(),
        messages = report.messages.len(),
        rows = report.total_rows(),
        "stored flight data"
    );
    Ok(report)
}

fn ingest_message(
    session: &mut Session,
    message: &MessageBatch,
    options: IngestOptions,
) -> Result<MessageOutcome> {
    if message.fields.is_empty() {
        return Err(StoreError::validation(format!(
            "no fields found for message {}",
            message.name
        )));
    }

    let row_count = message.row_count();
    if row_count == 0 {
        warn!(session = session.id(), "no data rows found for message {}", message.name);
        return Ok(MessageOutcome {
            message: message.name.clone(),
            rows_inserted: 0,
            first_seen: !session.catalog().is_known(&message.name),
            skipped: true,
        });
    }

    let rows = build_rows(message, row_count).map_err(|e| match e {
        StoreError::Validation(reason) => {
            StoreError::Validation(format!("session '{}': {reason}", session.id()))
        }
        other => other,
    })?;

    let first_seen = !session.catalog().is_known(&message.name);
    if first_seen {
        session.ensure_table(&message.name, &message.field_names(), &rows[0])?;
    }

    let schema = session
        .catalog()
        .get(&message.name)
        .cloned()
        .ok_or_else(|| {
            StoreError::schema(session.id(), &message.name, "table missing from catalog")
        })?;
    for field in &message.fields {
        if schema.column(&field.name).is_none() {
            return Err(StoreError::schema(
                session.id(),
                &message.name,
                format!("field '{}' is not a column of the table", field.name),
            ));
        }
    }

    let rows_inserted = insert_rows(session, &schema, &rows, options)?;
    debug!(
        session = session.id(),
        table = %message.name,
        rows = rows_inserted,
        "inserted rows"
    );

    Ok(MessageOutcome {
        message: message.name.clone(),
        rows_inserted,
        first_seen,
        skipped: false,
    })
}

/// Transpose columns into rows, normalizing every present cell. Indices past
/// a short column's end leave that field out of the row.
pub fn build_rows(message: &MessageBatch, row_count: usize) -> Result<Vec<Row>> {
    let mut rows = Vec::with_capacity(row_count);
    for index in 0..row_count {
        let mut row = Row::new();
        for field in &message.fields {
            if let Some(value) = field.values.get(index) {
                let raw = RawValue::from(value.clone());
                row.push(field.name.clone(), normalize(&raw, &field.name, &message.name)?);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Insert rows one statement each. The batch shares a transaction that is
/// committed even when an insert fails, so exactly the rows before the
/// failure persist.
fn insert_rows(
    session: &mut Session,
    schema: &TableSchema,
    rows: &[Row],
    options: IngestOptions,
) -> Result<usize> {
    let session_id = session.id().to_string();
    let table = schema.name.as_str();
    let columns: Vec<String> = schema.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    );

    let tx = session
        .conn_mut()
        .transaction()
        .map_err(|e| StoreError::connection(&session_id, format!("starting insert into {table}"), e))?;

    let mut inserted = 0;
    let failure = {
        let mut stmt = tx.prepare(&sql).map_err(|e| {
            StoreError::connection(&session_id, format!("preparing insert into {table}"), e)
        })?;

        let mut failure = None;
        for (index, row) in rows.iter().enumerate() {
            let values: Vec<Cell> = schema
                .columns
                .iter()
                .map(|column| {
                    let cell = row.get(&column.name).cloned().unwrap_or(Cell::Null);
                    if options.coerce_to_declared_types {
                        repair_cell(&cell, column.column_type, table, &column.name)
                    } else {
                        cell
                    }
                })
                .collect();

            if let Err(e) = stmt.execute(params_from_iter(values.iter())) {
                failure = Some((index, e));
                break;
            }
            inserted += 1;
        }
        failure
    };

    tx.commit()
        .map_err(|e| StoreError::connection(&session_id, format!("committing rows into {table}"), e))?;

    match failure {
        Some((index, e)) => {
            warn!(session = %session_id, table, "failed to insert row {index}: {e}");
            Err(StoreError::connection(
                &session_id,
                format!("inserting row {index} into {table} ({inserted} rows kept)"),
                e,
            ))
        }
        None => Ok(inserted),
    }
}
