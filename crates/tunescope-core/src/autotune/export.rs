//! Writing corrections back into a calibration document
//!
//! Always works on a deep clone; the loaded calibration is never touched.
//! The corrected table keeps the encoding of the map it replaces.

use chrono::Utc;
use serde_json::{json, Map, Value};

use super::engine::AutotuneReport;
use super::error::AutotuneError;
use crate::calibration::CalibrationStore;

/// Build the corrected document
///
/// `base` replaces the loaded calibration as the merge target; it must parse
/// and match the analysis table and axis dimensions.
pub fn export_corrected(
    calibration: &CalibrationStore,
    report: &AutotuneReport,
    base: Option<&Value>,
) -> Result<Value, AutotuneError> {
    let mut document = match base {
        Some(base) => {
            validate_base(calibration, report, base)?;
            base.clone()
        }
        None => calibration
            .raw_clone()
            .ok_or(AutotuneError::CalibrationNotLoaded)?,
    };

    let entry = find_map_mut(&mut document, &report.table_id)
        .ok_or_else(|| AutotuneError::MissingTable(report.table_id.clone()))?;
    write_table(entry, &report.formatted_table);
    stamp(&mut document, report);

    tracing::info!(
        "Exported {} corrected cells into '{}'{}",
        report.modified_cell_count,
        report.table_id,
        if base.is_some() { " (base document)" } else { "" }
    );
    Ok(document)
}

fn validate_base(
    calibration: &CalibrationStore,
    report: &AutotuneReport,
    base: &Value,
) -> Result<(), AutotuneError> {
    let mut base_store = CalibrationStore::with_map_ids(calibration.map_ids().clone());
    base_store
        .try_parse_value(base.clone())
        .map_err(|e| AutotuneError::InvalidBaseDocument(e.to_string()))?;

    let base_table = base_store.table_shape(&report.table_id).unwrap_or((0, 0));
    if base_table != report.shape() {
        return Err(AutotuneError::DimensionMismatch {
            map: report.table_id.clone(),
            analysis: report.shape(),
            base: base_table,
        });
    }

    let axes = [
        (&report.rpm_axis_id, report.rpm_axis.len()),
        (&report.load_axis_id, report.load_axis.len()),
    ];
    for (id, len) in axes {
        let base_len = base_store.get_array(id).map(|a| a.len()).unwrap_or(0);
        if base_len != len {
            return Err(AutotuneError::DimensionMismatch {
                map: id.clone(),
                analysis: (1, len),
                base: (1, base_len),
            });
        }
    }
    Ok(())
}

fn find_map_mut<'v>(document: &'v mut Value, id: &str) -> Option<&'v mut Map<String, Value>> {
    document
        .get_mut("maps")?
        .as_array_mut()?
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|entry| entry.get("id").and_then(Value::as_str) == Some(id))
}

/// Replace the map contents, keeping its field and row encoding
fn write_table(entry: &mut Map<String, Value>, rows: &[Vec<String>]) {
    let field = match entry.get("value") {
        Some(v) if !v.is_null() => "value",
        _ => "data",
    };
    let encoded = encode_like(entry.get(field).unwrap_or(&Value::Null), rows);
    entry.insert(field.to_string(), encoded);
}

/// Cells are always written as the one-decimal strings of the report
fn encode_like(original: &Value, rows: &[Vec<String>]) -> Value {
    let nested = || {
        Value::Array(
            rows.iter()
                .map(|row| Value::Array(row.iter().cloned().map(Value::String).collect()))
                .collect(),
        )
    };

    match original {
        Value::Array(items) => match items.first() {
            Some(Value::Array(_)) => nested(),
            // Comma-joined row strings
            Some(Value::String(s)) if s.contains(',') => {
                let bracketed = s.trim_start().starts_with('[');
                Value::Array(
                    rows.iter()
                        .map(|row| {
                            let joined = row.join(",");
                            Value::String(if bracketed { format!("[{joined}]") } else { joined })
                        })
                        .collect(),
                )
            }
            // Flat list
            _ => Value::Array(rows.iter().flatten().cloned().map(Value::String).collect()),
        },
        // Whole table as one JSON string
        Value::String(s) if s.trim_start().starts_with('[') => {
            let parsed: Option<Value> = serde_json::from_str(s.trim()).ok();
            let is_nested = matches!(
                parsed.as_ref().and_then(|v| v.as_array()).and_then(|a| a.first()),
                Some(Value::Array(_))
            );
            let text = if is_nested {
                let inner: Vec<String> = rows.iter().map(|row| format!("[{}]", row.join(","))).collect();
                format!("[{}]", inner.join(","))
            } else {
                format!("[{}]", rows.iter().flatten().cloned().collect::<Vec<_>>().join(","))
            };
            Value::String(text)
        }
        Value::String(_) => Value::String(
            rows.iter()
                .map(|row| row.join(","))
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => nested(),
    }
}

fn stamp(document: &mut Value, report: &AutotuneReport) {
    let Some(root) = document.as_object_mut() else {
        return;
    };
    let meta = root
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if !meta.is_object() {
        *meta = Value::Object(Map::new());
    }
    if let Some(meta) = meta.as_object_mut() {
        meta.insert(
            "autotune".to_string(),
            json!({
                "timestamp": Utc::now().to_rfc3339(),
                "table": report.table_id,
                "change_limit_percent": report.change_limit_percent,
                "min_samples": report.min_samples,
                "modified_cells": report.modified_cell_count,
                "clamped_cells": report.clamped_cells.len(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows() -> Vec<Vec<String>> {
        vec![
            vec!["1.0".to_string(), "2.5".to_string()],
            vec!["3.0".to_string(), "4.0".to_string()],
        ]
    }

    #[test]
    fn test_nested_numbers_become_fixed_strings() {
        let encoded = encode_like(&json!([[1, 2], [3, 4]]), &rows());
        assert_eq!(encoded, json!([["1.0", "2.5"], ["3.0", "4.0"]]));
    }

    #[test]
    fn test_nested_strings() {
        let encoded = encode_like(&json!([["1", "2"], ["3", "4"]]), &rows());
        assert_eq!(encoded, json!([["1.0", "2.5"], ["3.0", "4.0"]]));
    }

    #[test]
    fn test_row_strings() {
        let encoded = encode_like(&json!(["1,2", "3,4"]), &rows());
        assert_eq!(encoded, json!(["1.0,2.5", "3.0,4.0"]));
    }

    #[test]
    fn test_bracketed_row_strings() {
        let encoded = encode_like(&json!(["[1,2]", "[3,4]"]), &rows());
        assert_eq!(encoded, json!(["[1.0,2.5]", "[3.0,4.0]"]));
    }

    #[test]
    fn test_flat_list() {
        let encoded = encode_like(&json!([1, 2, 3, 4]), &rows());
        assert_eq!(encoded, json!(["1.0", "2.5", "3.0", "4.0"]));
    }

    #[test]
    fn test_json_table_string_keeps_rows() {
        let encoded = encode_like(&json!("[[1,2],[3,4]]"), &rows());
        assert_eq!(encoded, json!("[[1.0,2.5],[3.0,4.0]]"));
        assert_eq!(
            crate::calibration::values::table_rows(&encoded),
            vec![vec![1.0, 2.5], vec![3.0, 4.0]]
        );

        let flat = encode_like(&json!("[1,2,3,4]"), &rows());
        assert_eq!(flat, json!("[1.0,2.5,3.0,4.0]"));
    }

    #[test]
    fn test_write_keeps_field() {
        let mut entry = json!({"id": "fuel_base", "data": [[1, 2], [3, 4]]});
        let map = entry.as_object_mut().unwrap();
        write_table(map, &rows());
        assert!(map.get("value").is_none());
        assert_eq!(map["data"], json!([["1.0", "2.5"], ["3.0", "4.0"]]));
    }
}
