//! Calibration document store
//!
//! Parses a calibration document of the form
//! `{cal_id, car_id, rom_id, version, meta, maps: [{id, value|data}]}` into an
//! id-indexed set of maps. The parsed document is read-only; exports work on
//! a deep clone obtained from [`CalibrationStore::raw_clone`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::defaults::MapIds;
use super::error::CalibrationError;
use super::interpolate::{interpolate_1d, interpolate_2d, is_strictly_ascending};
use super::values::{flatten_numbers, scalar, table_rows};

/// Shape of a calibration map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    /// Single number
    Scalar,
    /// Axis or curve
    Array,
    /// Rows of numbers
    Table,
}

/// Which field of the map entry carries its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueField {
    /// `value`
    Value,
    /// `data`
    Data,
}

impl ValueField {
    /// JSON key for this field
    pub fn key(&self) -> &'static str {
        match self {
            ValueField::Value => "value",
            ValueField::Data => "data",
        }
    }
}

/// One indexed calibration map
#[derive(Debug, Clone, Serialize)]
pub struct MapEntry {
    /// Map identifier
    pub id: String,
    /// Inferred shape
    pub kind: MapKind,
    /// Field the contents were read from
    pub field: ValueField,
    /// Position in the document's `maps` array
    pub position: usize,
    /// Declared row axis id
    pub row_axis: Option<String>,
    /// Declared column axis id
    pub col_axis: Option<String>,
    #[serde(skip)]
    raw: Value,
}

impl MapEntry {
    /// Raw JSON contents of the map
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Identification fields of a calibration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMetadata {
    /// Calibration identifier
    pub cal_id: Option<String>,
    /// Vehicle identifier
    pub car_id: Option<String>,
    /// ECU ROM identifier
    pub rom_id: Option<String>,
    /// Document version
    pub version: Option<String>,
    /// Free-form `meta` object, `Null` when absent
    pub meta: Value,
}

/// Parsed calibration maps with interpolation helpers
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    document: Option<Value>,
    index: HashMap<String, MapEntry>,
    map_ids: MapIds,
}

impl CalibrationStore {
    /// Create an empty store using the default map identifiers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with custom map identifiers
    pub fn with_map_ids(map_ids: MapIds) -> Self {
        Self {
            map_ids,
            ..Self::default()
        }
    }

    /// Parse a document from text, returning whether it loaded
    ///
    /// Never fails past this boundary: the cause is logged and the store is
    /// left unloaded.
    pub fn parse(&mut self, document: &str) -> bool {
        match self.try_parse(document) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Calibration parse failed: {e}");
                false
            }
        }
    }

    /// Parse an already-decoded JSON document, returning whether it loaded
    pub fn parse_value(&mut self, document: Value) -> bool {
        match self.try_parse_value(document) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Calibration parse failed: {e}");
                false
            }
        }
    }

    /// Parse a document from text
    pub fn try_parse(&mut self, document: &str) -> Result<(), CalibrationError> {
        self.clear();
        let value: Value = serde_json::from_str(document)?;
        self.try_parse_value(value)
    }

    /// Load a document from disk
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CalibrationError> {
        self.clear();
        let content = fs::read_to_string(path)?;
        self.try_parse(&content)
    }

    /// Parse an already-decoded JSON document
    pub fn try_parse_value(&mut self, document: Value) -> Result<(), CalibrationError> {
        self.clear();

        let maps = document
            .as_object()
            .ok_or_else(|| CalibrationError::InvalidDocument("root is not an object".into()))?
            .get("maps")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CalibrationError::InvalidDocument("missing 'maps' array".to_string())
            })?;

        let mut index = HashMap::with_capacity(maps.len());
        for (position, entry) in maps.iter().enumerate() {
            let Some(parsed) = parse_entry(position, entry) else {
                tracing::warn!("Skipping malformed calibration map at index {position}");
                continue;
            };
            if index.contains_key(&parsed.id) {
                tracing::warn!("Duplicate calibration map '{}' ignored", parsed.id);
                continue;
            }
            index.insert(parsed.id.clone(), parsed);
        }

        tracing::debug!("Indexed {} calibration maps", index.len());
        self.index = index;
        self.document = Some(document);
        Ok(())
    }

    fn clear(&mut self) {
        self.document = None;
        self.index.clear();
    }

    /// Whether a document is loaded
    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Document version string
    pub fn version(&self) -> Option<String> {
        self.document
            .as_ref()
            .and_then(|doc| doc.get("version"))
            .and_then(value_to_string)
    }

    /// Identification fields and the free-form `meta` object
    pub fn metadata(&self) -> Option<CalibrationMetadata> {
        let doc = self.document.as_ref()?;
        let text = |key: &str| doc.get(key).and_then(value_to_string);
        Some(CalibrationMetadata {
            cal_id: text("cal_id"),
            car_id: text("car_id"),
            rom_id: text("rom_id"),
            version: text("version"),
            meta: doc.get("meta").cloned().unwrap_or(Value::Null),
        })
    }

    /// Deep copy of the loaded document
    pub fn raw_clone(&self) -> Option<Value> {
        self.document.clone()
    }

    /// The identifiers this store resolves domain maps with
    pub fn map_ids(&self) -> &MapIds {
        &self.map_ids
    }

    /// Look up a map entry by id
    pub fn entry(&self, id: &str) -> Option<&MapEntry> {
        self.index.get(id)
    }

    /// All indexed maps in document order
    pub fn maps(&self) -> Vec<&MapEntry> {
        let mut entries: Vec<&MapEntry> = self.index.values().collect();
        entries.sort_by_key(|e| e.position);
        entries
    }

    /// Read a scalar map
    pub fn get_parameter(&self, id: &str) -> Option<f64> {
        self.index.get(id).and_then(|e| scalar(&e.raw))
    }

    /// Read a map as a flat numeric array
    pub fn get_array(&self, id: &str) -> Option<Vec<f64>> {
        self.index.get(id).map(|e| flatten_numbers(&e.raw))
    }

    /// Read a map as a numeric table (`table[row][col]`)
    pub fn get_table(&self, id: &str) -> Option<Vec<Vec<f64>>> {
        self.index.get(id).map(|e| table_rows(&e.raw))
    }

    /// Rows and columns of a table (columns of the first row)
    pub fn table_shape(&self, id: &str) -> Option<(usize, usize)> {
        let table = self.get_table(id)?;
        let cols = table.first().map(Vec::len).unwrap_or(0);
        Some((table.len(), cols))
    }

    /// Read a breakpoint axis
    ///
    /// Returns `None` for missing, empty, or non-ascending axes.
    pub fn axis(&self, id: &str) -> Option<Vec<f64>> {
        let axis = self.get_array(id)?;
        if axis.is_empty() {
            return None;
        }
        if !is_strictly_ascending(&axis) {
            tracing::warn!("Calibration axis '{id}' is not strictly ascending");
            return None;
        }
        Some(axis)
    }

    /// Axis ids of a table, preferring ids declared on the map entry
    pub fn table_axes(&self, id: &str, default_row: &str, default_col: &str) -> (String, String) {
        let entry = self.index.get(id);
        let row = entry
            .and_then(|e| e.row_axis.clone())
            .unwrap_or_else(|| default_row.to_string());
        let col = entry
            .and_then(|e| e.col_axis.clone())
            .unwrap_or_else(|| default_col.to_string());
        (row, col)
    }

    /// Interpolate a 1D map over its axis
    pub fn lookup_1d(&self, map_id: &str, axis_id: &str, x: f64) -> Option<f64> {
        let axis_id = self
            .index
            .get(map_id)
            .and_then(|e| e.row_axis.as_deref())
            .unwrap_or(axis_id);
        let values = self.get_array(map_id)?;
        let axis = self.axis(axis_id)?;
        if values.len() != axis.len() {
            tracing::warn!(
                "Map '{map_id}' has {} values but axis '{axis_id}' has {} breakpoints",
                values.len(),
                axis.len()
            );
            return None;
        }
        Some(interpolate_1d(&values, &axis, x))
    }

    /// Bilinear lookup in a 2D table
    pub fn lookup_2d(
        &self,
        table_id: &str,
        row_axis_id: &str,
        col_axis_id: &str,
        row_value: f64,
        col_value: f64,
    ) -> Option<f64> {
        let (row_axis_id, col_axis_id) = self.table_axes(table_id, row_axis_id, col_axis_id);
        let table = self.get_table(table_id)?;
        let row_axis = self.axis(&row_axis_id)?;
        let col_axis = self.axis(&col_axis_id)?;
        if table.len() != row_axis.len() || table.iter().any(|r| r.len() != col_axis.len()) {
            tracing::warn!(
                "Table '{table_id}' shape does not match axes '{row_axis_id}' x '{col_axis_id}'"
            );
            return None;
        }
        Some(interpolate_2d(
            &table,
            &row_axis,
            &col_axis,
            row_value,
            col_value,
        ))
    }
}

fn parse_entry(position: usize, entry: &Value) -> Option<MapEntry> {
    let obj = entry.as_object()?;
    let id = obj.get("id").and_then(value_to_string)?;
    let (field, raw) = match (obj.get("value"), obj.get("data")) {
        (Some(v), _) if !v.is_null() => (ValueField::Value, v.clone()),
        (_, Some(d)) if !d.is_null() => (ValueField::Data, d.clone()),
        _ => return None,
    };
    let axis_ref = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    Some(MapEntry {
        id,
        kind: infer_kind(&raw),
        field,
        position,
        row_axis: axis_ref("row_axis"),
        col_axis: axis_ref("col_axis"),
        raw,
    })
}

fn infer_kind(raw: &Value) -> MapKind {
    match raw {
        Value::Array(items) => {
            let row_like = items
                .iter()
                .any(|i| matches!(i, Value::Array(_) | Value::String(_)));
            if row_like && items.len() > 1 {
                MapKind::Table
            } else {
                MapKind::Array
            }
        }
        Value::String(s) if s.contains(',') || s.trim_start().starts_with('[') => {
            if table_rows(raw).len() > 1 {
                MapKind::Table
            } else {
                MapKind::Array
            }
        }
        _ => MapKind::Scalar,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
