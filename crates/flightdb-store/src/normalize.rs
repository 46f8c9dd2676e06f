//! Cell normalization: one raw field value → one storable scalar.

use crate::error::{Result, StoreError};
use crate::types::{Cell, RawValue};

/// Fields delivered as a list of arrays whose true scalar is the first
/// element of the first inner array.
pub const NESTED_TIME_FIELDS: &[&str] = &["time_unix_usec"];

pub fn is_nested_time_field(field: &str) -> bool {
    NESTED_TIME_FIELDS.contains(&field)
}

/// Normalize one raw value for storage. Deterministic and side-effect free.
///
/// Lists other than empty, singleton-scalar and nested-time shapes are
/// stored as JSON text; their element types are not preserved.
pub fn normalize(raw: &RawValue, field: &str, message: &str) -> Result<Cell> {
    match raw {
        RawValue::Null => Ok(Cell::Null),
        RawValue::Integer(i) => Ok(Cell::Integer(*i)),
        RawValue::Float(f) => Ok(Cell::Float(*f)),
        RawValue::Text(s) => Ok(Cell::Text(s.clone())),
        RawValue::Boolean(b) => Ok(Cell::Boolean(*b)),
        RawValue::List(items) => normalize_list(raw, items, field, message),
        RawValue::Object(_) => Err(StoreError::validation(format!(
            "unsupported nested mapping for field '{field}' in message {message}"
        ))),
    }
}

fn normalize_list(raw: &RawValue, items: &[RawValue], field: &str, message: &str) -> Result<Cell> {
    let Some(first) = items.first() else {
        return Ok(Cell::Null);
    };

    if is_nested_time_field(field) {
        if let RawValue::List(inner) = first {
            return match inner.first() {
                Some(head @ (RawValue::Integer(_) | RawValue::Float(_))) => {
                    Ok(head.as_scalar().unwrap_or(Cell::Null))
                }
                _ => Err(StoreError::validation(format!(
                    "invalid {field} format in message {message}: expected list of numeric arrays"
                ))),
            };
        }
    }

    if items.len() == 1 {
        if let Some(cell) = first.as_scalar() {
            return Ok(cell);
        }
    }

    serde_json::to_string(&raw.to_json())
        .map(Cell::Text)
        .map_err(|e| {
            StoreError::validation(format!(
                "failed to encode list for field '{field}' in message {message}: {e}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn norm(field: &str, value: serde_json::Value) -> Result<Cell> {
        normalize(&RawValue::from(value), field, "TEST_MSG")
    }

    #[test]
    fn null_and_empty_list_become_null() {
        assert_eq!(norm("x", json!(null)).unwrap(), Cell::Null);
        assert_eq!(norm("x", json!([])).unwrap(), Cell::Null);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(norm("x", json!(7)).unwrap(), Cell::Integer(7));
        assert_eq!(norm("x", json!(7.5)).unwrap(), Cell::Float(7.5));
        assert_eq!(norm("x", json!("a")).unwrap(), Cell::Text("a".into()));
        assert_eq!(norm("x", json!(true)).unwrap(), Cell::Boolean(true));
    }

    #[test]
    fn singleton_scalar_list_unwraps() {
        assert_eq!(norm("x", json!([3])).unwrap(), Cell::Integer(3));
        assert_eq!(norm("x", json!(["GPS"])).unwrap(), Cell::Text("GPS".into()));
        assert_eq!(norm("x", json!([false])).unwrap(), Cell::Boolean(false));
    }

    #[test]
    fn other_lists_are_json_encoded() {
        assert_eq!(norm("x", json!([1, 2])).unwrap(), Cell::Text("[1,2]".into()));
        assert_eq!(norm("x", json!([[5]])).unwrap(), Cell::Text("[[5]]".into()));
        assert_eq!(norm("x", json!([null])).unwrap(), Cell::Text("[null]".into()));
        assert_eq!(
            norm("x", json!([{"a": 1}])).unwrap(),
            Cell::Text(r#"[{"a":1}]"#.into())
        );
    }

    #[test]
    fn nested_time_field_takes_first_inner_element() {
        assert_eq!(
            norm("time_unix_usec", json!([[5]])).unwrap(),
            Cell::Integer(5)
        );
        assert_eq!(
            norm("time_unix_usec", json!([[1700000000123456_i64, 9], [3]])).unwrap(),
            Cell::Integer(1_700_000_000_123_456)
        );
    }

    #[test]
    fn nested_time_field_rejects_malformed_inner_arrays() {
        for bad in [json!([[]]), json!([["soon"]]), json!([[null]])] {
            let err = norm("time_unix_usec", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert!(err.to_string().contains("TEST_MSG"));
        }
    }

    #[test]
    fn nested_time_field_accepts_flat_shapes() {
        assert_eq!(norm("time_unix_usec", json!(5)).unwrap(), Cell::Integer(5));
        assert_eq!(norm("time_unix_usec", json!([5])).unwrap(), Cell::Integer(5));
    }

    #[test]
    fn nested_mapping_is_rejected_with_context() {
        let err = norm("attitude", json!({"roll": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let text = err.to_string();
        assert!(text.contains("attitude"));
        assert!(text.contains("TEST_MSG"));
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = RawValue::from(json!([1.5, "a", [2]]));
        let a = normalize(&raw, "f", "M").unwrap();
        let b = normalize(&raw, "f", "M").unwrap();
        assert_eq!(a, b);
    }
}
