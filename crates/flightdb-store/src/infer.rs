//! Column type inference from a single representative sample value.

use crate::types::{ColumnType, RawValue};

/// Field names (compared case-insensitively) whose column is always Integer.
/// Producers disagree on whether time fields arrive as integers, floats or
/// singleton arrays; time-ordering queries need one stable integer column.
pub const INTEGER_OVERRIDE_FIELDS: &[&str] = &["timeus", "time_boot_ms", "timestamp"];

pub fn is_integer_override(field: &str) -> bool {
    INTEGER_OVERRIDE_FIELDS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(field))
}

/// Derive a column type from one sample value. Total: anything unrecognized
/// is Text.
pub fn infer(sample: &RawValue) -> ColumnType {
    match sample {
        RawValue::Integer(_) => ColumnType::Integer,
        RawValue::Float(_) => ColumnType::Float,
        RawValue::Text(_) => ColumnType::Text,
        RawValue::Boolean(_) => ColumnType::Boolean,
        RawValue::List(items) => infer_list(items),
        RawValue::Null | RawValue::Object(_) => ColumnType::Text,
    }
}

fn infer_list(items: &[RawValue]) -> ColumnType {
    let Some(first) = items.first() else {
        // Holds the encoded empty marker.
        return ColumnType::Text;
    };

    // List of arrays (e.g. time_unix_usec): decided by the first inner element.
    if let RawValue::List(inner) = first {
        if let Some(head) = inner.first() {
            return if head.is_numeric() {
                ColumnType::Integer
            } else {
                ColumnType::Text
            };
        }
    }

    if items.iter().all(RawValue::is_numeric) {
        ColumnType::Integer
    } else {
        // Uniform strings, and mixed lists that get JSON-encoded.
        ColumnType::Text
    }
}

/// Column type for `field`, applying the name override on top of inference.
pub fn column_type_for(field: &str, sample: &RawValue) -> ColumnType {
    if is_integer_override(field) {
        ColumnType::Integer
    } else {
        infer(sample)
    }
}
