//! Per-session registry of message tables, plus idempotent table creation
//! and structure introspection.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::infer::column_type_for;
use crate::types::{ColumnType, RawValue, Row};

/// A column as declared in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    #[serde(skip)]
    pub column_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            column_type: ColumnType::from_declared(&declared_type),
            declared_type,
        }
    }
}

/// Ordered column list of one message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Message tables known to one session. Lives in memory only.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    tables: HashMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from every user table already present in the store.
    pub fn hydrate(conn: &Connection, session_id: &str) -> Result<Self> {
        let mut catalog = Self::new();
        for table in list_tables(conn, session_id)? {
            let columns = read_table_columns(conn, session_id, &table)?;
            catalog.register(TableSchema {
                name: table,
                columns,
            });
        }
        Ok(catalog)
    }

    pub fn is_known(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.tables.get(table)
    }

    pub fn register(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    /// Known table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Quote an identifier so message and field names may contain any character.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// User tables physically present in the store.
pub fn list_tables(conn: &Connection, session_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(|e| StoreError::connection(session_id, "listing tables", e))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| StoreError::connection(session_id, "listing tables", e))?;
    Ok(names)
}

/// Declared columns of `table`, in table order.
pub fn read_table_columns(
    conn: &Connection,
    session_id: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let introspect = || -> rusqlite::Result<Vec<ColumnInfo>> {
        let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([table], |row| {
            Ok(ColumnInfo::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;
        rows.collect()
    };

    let columns = introspect().map_err(|e| {
        StoreError::schema(session_id, table, format!("failed to read table structure: {e}"))
    })?;
    if columns.is_empty() {
        return Err(StoreError::schema(session_id, table, "table does not exist"));
    }
    Ok(columns)
}

/// Create the backing table for `message` unless the catalog already knows it.
///
/// Column types come from `sample`, one value per field. The statement is
/// `CREATE TABLE IF NOT EXISTS`, so a catalog that starts cold against an
/// existing file still succeeds; the recorded schema is always read back from
/// the store afterwards. On any failure the message stays unknown.
pub fn ensure_table(
    conn: &Connection,
    catalog: &mut SchemaCatalog,
    session_id: &str,
    message: &str,
    fields: &[String],
    sample: &Row,
) -> Result<()> {
    if catalog.is_known(message) {
        return Ok(());
    }
    if fields.is_empty() {
        return Err(StoreError::schema(session_id, message, "no fields to create"));
    }

    let mut columns = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(value) = sample.get(field) else {
            return Err(StoreError::schema(
                session_id,
                message,
                format!("field '{field}' not found in sample row"),
            ));
        };
        let column_type = column_type_for(field, &RawValue::from(value));
        columns.push(format!("{} {}", quote_ident(field), column_type.sql_type()));
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(message),
        columns.join(", ")
    );
    debug!(session = session_id, table = message, "ensuring table: {sql}");
    conn.execute_batch(&sql).map_err(|e| {
        StoreError::schema(session_id, message, format!("failed to create table: {e}"))
    })?;

    let columns = read_table_columns(conn, session_id, message)?;
    catalog.register(TableSchema {
        name: message.to_string(),
        columns,
    });
    debug!(session = session_id, table = message, "table ready");
    Ok(())
}
