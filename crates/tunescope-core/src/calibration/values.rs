//! Tolerant numeric coercion
//!
//! Calibration files in the wild store the same table several ways: plain
//! numeric arrays, arrays of comma-separated strings, nested arrays, or rows
//! encoded as JSON strings. Everything here normalizes to `f64` vectors.
//! Entries that cannot be read as numbers become `0.0`.

use serde_json::Value;

/// Read a single JSON value as a number
///
/// Accepts numbers and numeric strings. Returns `None` for anything else.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse a trimmed string as a finite number
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Flatten any value into a list of numbers
pub fn flatten_numbers(value: &Value) -> Vec<f64> {
    let mut out = Vec::new();
    flatten_into(value, &mut out);
    out
}

fn flatten_into(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Null => {}
        Value::Number(_) => out.push(coerce_f64(value).unwrap_or(0.0)),
        Value::String(s) => {
            if let Some(parsed) = parse_json_row(s) {
                flatten_into(&parsed, out);
            } else {
                out.extend(split_numbers(s));
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    // Keep positional alignment inside arrays
                    Value::Null | Value::Bool(_) | Value::Object(_) => out.push(0.0),
                    _ => flatten_into(item, out),
                }
            }
        }
        Value::Bool(_) | Value::Object(_) => out.push(0.0),
    }
}

/// Normalize a value into table rows
///
/// An array whose elements are arrays or strings yields one row per element.
/// A flat numeric array is a single row.
pub fn table_rows(value: &Value) -> Vec<Vec<f64>> {
    match value {
        Value::Array(items) => {
            let row_like = items
                .iter()
                .any(|item| matches!(item, Value::Array(_) | Value::String(_)));
            if row_like {
                items.iter().map(flatten_numbers).collect()
            } else {
                vec![flatten_numbers(value)]
            }
        }
        Value::String(s) => match parse_json_row(s) {
            Some(parsed @ Value::Array(_)) => table_rows(&parsed),
            _ => vec![split_numbers(s)],
        },
        Value::Null => Vec::new(),
        other => vec![flatten_numbers(other)],
    }
}

/// Split a comma-separated string into numbers
pub fn split_numbers(text: &str) -> Vec<f64> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    text.split(',')
        .map(|part| parse_number(part).unwrap_or(0.0))
        .collect()
}

fn parse_json_row(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Read a scalar: a number, numeric string, or the first element of an array
pub fn scalar(value: &Value) -> Option<f64> {
    match value {
        Value::Array(items) => items.first().and_then(scalar),
        Value::String(s) if s.contains(',') || s.trim_start().starts_with('[') => {
            flatten_numbers(value).first().copied()
        }
        other => coerce_f64(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_mixed_sources() {
        assert_eq!(flatten_numbers(&json!([1, 2.5, "3"])), vec![1.0, 2.5, 3.0]);
        assert_eq!(flatten_numbers(&json!("1, 2,3")), vec![1.0, 2.0, 3.0]);
        assert_eq!(flatten_numbers(&json!(["1,2", "3"])), vec![1.0, 2.0, 3.0]);
        assert_eq!(flatten_numbers(&json!("[4,5]")), vec![4.0, 5.0]);
    }

    #[test]
    fn test_non_numeric_becomes_zero() {
        assert_eq!(flatten_numbers(&json!([1, "abc", null, true])), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(split_numbers("1,x,3"), vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_table_rows_shapes() {
        assert_eq!(
            table_rows(&json!([[1, 2], [3, 4]])),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]]
        );
        assert_eq!(
            table_rows(&json!(["1,2", "3,4"])),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]]
        );
        assert_eq!(
            table_rows(&json!(["[1,2]", "[3,4]"])),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]]
        );
        assert_eq!(table_rows(&json!("[[1,2],[3,4]]")).len(), 2);
        assert_eq!(table_rows(&json!([1, 2, 3])), vec![vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_scalar_forms() {
        assert_eq!(scalar(&json!(7000)), Some(7000.0));
        assert_eq!(scalar(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(scalar(&json!([3, 4])), Some(3.0));
        assert_eq!(scalar(&json!("8,9")), Some(8.0));
        assert_eq!(scalar(&json!("n/a")), None);
    }
}
