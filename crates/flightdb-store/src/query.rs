//! Query executor: runs a statement verbatim against a session store.
//!
//! No inspection or rewriting happens here; restricting statements to
//! read-only intent is the caller's job.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::types::Cell;

/// One result column with its values in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultColumn {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Column-oriented query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ResultColumn>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn column(&self, name: &str) -> Option<&ResultColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        (index < self.row_count).then(|| {
            self.columns
                .iter()
                .map(|c| &c.values[index])
                .collect()
        })
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.row_count)
            .map(|index| {
                self.columns
                    .iter()
                    .map(|c| {
                        let value = serde_json::to_value(&c.values[index])
                            .unwrap_or(serde_json::Value::Null);
                        (c.name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

pub fn execute(conn: &Connection, session_id: &str, statement: &str) -> Result<QueryResult> {
    if statement.trim().is_empty() {
        return Err(StoreError::validation(
            "invalid SQL query: must be a non-empty string",
        ));
    }

    run(conn, statement).map_err(|e| {
        tracing::error!(session = session_id, "query execution failed: {e}");
        StoreError::Query {
            session: session_id.to_string(),
            diagnostic: e.to_string(),
        }
    })
}

fn run(conn: &Connection, statement: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(statement)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut columns: Vec<ResultColumn> = names
        .into_iter()
        .map(|name| ResultColumn {
            name,
            values: Vec::new(),
        })
        .collect();

    let mut row_count = 0;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for (index, column) in columns.iter_mut().enumerate() {
            column.values.push(Cell::from(row.get_ref(index)?));
        }
        row_count += 1;
    }

    Ok(QueryResult { columns, row_count })
}
