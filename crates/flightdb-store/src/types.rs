//! Value model: raw input cells, normalized storage cells, rows, column types
//! and the ingest payload.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Serialize, Serializer};
use serde_json::Map;
use std::fmt;

use crate::error::{Result, StoreError};

// ── Raw input ────────────────────────────────────────────────────

/// One incoming field value, classified once at the ingestion boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    List(Vec<RawValue>),
    /// Nested mapping. Never storable as a cell; kept so it can be rejected
    /// with field context, or re-encoded when it sits inside a list.
    Object(Map<String, serde_json::Value>),
}

impl RawValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// The storable scalar this value represents, if it is one.
    pub fn as_scalar(&self) -> Option<Cell> {
        match self {
            Self::Integer(i) => Some(Cell::Integer(*i)),
            Self::Float(f) => Some(Cell::Float(*f)),
            Self::Text(s) => Some(Cell::Text(s.clone())),
            Self::Boolean(b) => Some(Cell::Boolean(*b)),
            Self::Null | Self::List(_) | Self::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::from(s.as_str()),
            Self::Boolean(b) => serde_json::Value::from(*b),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(RawValue::to_json).collect())
            }
            Self::Object(map) => serde_json::Value::Object(map.clone()),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(map),
        }
    }
}

impl From<&Cell> for RawValue {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => Self::Null,
            Cell::Integer(i) => Self::Integer(*i),
            Cell::Float(f) => Self::Float(*f),
            Cell::Text(s) => Self::Text(s.clone()),
            Cell::Boolean(b) => Self::Boolean(*b),
            Cell::Blob(_) => Self::Null,
        }
    }
}

// ── Storage cells ────────────────────────────────────────────────

/// A normalized scalar as written to, or read back from, a session store.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    /// Only produced when reading back; the normalizer never emits blobs.
    Blob(Vec<u8>),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Blob(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            Self::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes.as_slice())),
        })
    }
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(v) => Self::Float(v),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

// ── Rows ─────────────────────────────────────────────────────────

/// One row-major record: field name → normalized cell, in field order.
/// A field missing from the row had no value at this index (ragged column).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, cell: Cell) {
        self.cells.push((field.into(), cell));
    }

    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, cell)| cell)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }
}

impl<S: Into<String>> FromIterator<(S, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Cell)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ── Column types ─────────────────────────────────────────────────

/// Storage type of a message-table column, fixed at table creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ColumnType {
    /// Declared type used in `CREATE TABLE`.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "BIGINT",
            Self::Float => "DOUBLE",
            Self::Text => "VARCHAR",
            Self::Boolean => "BOOLEAN",
        }
    }

    /// Classify a declared column type the way SQLite derives affinity.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("BOOL") {
            Self::Boolean
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Float
        } else {
            Self::Text
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

// ── Ingest payload ───────────────────────────────────────────────

/// One field's ordered value sequence within a message batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldColumn {
    pub name: String,
    pub values: Vec<serde_json::Value>,
}

/// All columns received for one message type.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBatch {
    pub name: String,
    pub fields: Vec<FieldColumn>,
}

impl MessageBatch {
    /// Longest column length; shorter columns are sparse past their end.
    pub fn row_count(&self) -> usize {
        self.fields.iter().map(|f| f.values.len()).max().unwrap_or(0)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Columnar telemetry for one ingest call, in arrival order:
/// `{message_name: {field_name: [values...]}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    messages: Vec<MessageBatch>,
}

impl TelemetryPayload {
    pub fn messages(&self) -> &[MessageBatch] {
        &self.messages
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| StoreError::validation(format!("payload is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate the payload shape: a non-empty object whose values are
    /// non-empty objects of arrays.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(root) = value else {
            return Err(StoreError::validation(
                "payload must be a non-empty mapping of message names",
            ));
        };
        if root.is_empty() {
            return Err(StoreError::validation(
                "payload must be a non-empty mapping of message names",
            ));
        }

        let mut messages = Vec::with_capacity(root.len());
        for (name, body) in root {
            let fields = match body {
                serde_json::Value::Object(fields) if !fields.is_empty() => fields,
                _ => {
                    return Err(StoreError::validation(format!(
                        "invalid message data for {name}: must be a non-empty mapping of fields"
                    )));
                }
            };

            let mut columns = Vec::with_capacity(fields.len());
            for (field, values) in fields {
                let serde_json::Value::Array(values) = values else {
                    return Err(StoreError::validation(format!(
                        "field '{field}' in message {name} must be a list of values"
                    )));
                };
                columns.push(FieldColumn {
                    name: field,
                    values,
                });
            }
            messages.push(MessageBatch {
                name,
                fields: columns,
            });
        }

        Ok(Self { messages })
    }
}
