/// Row loading
///
/// The spreadsheet collaborator hands over rows as key/value mappings. This module
/// turns them into [`Point`]s using a configurable column mapping.

use crate::aggregate::Point;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// One spreadsheet row, column name → cell value
pub type Row = Map<String, Value>;

/// Which columns hold the coordinates and optional count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub lat_column: String,
    pub lng_column: String,
    pub count_column: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            lat_column: "lat".to_string(),
            lng_column: "lng".to_string(),
            count_column: None,
        }
    }
}

impl ColumnMapping {
    pub fn new(lat_column: &str, lng_column: &str) -> Self {
        Self {
            lat_column: lat_column.to_string(),
            lng_column: lng_column.to_string(),
            count_column: None,
        }
    }

    pub fn with_count(mut self, count_column: &str) -> Self {
        self.count_column = Some(count_column.to_string());
        self
    }
}

/// Spreadsheets hand numbers over as either numbers or text
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Convert a row into a point.
///
/// A missing or non-numeric coordinate is an `InvalidCoordinate` (NaN in the
/// error); a present count must be a non-negative integer. An empty count cell
/// falls back to a weight of one.
pub fn point_from_row(row: &Row, columns: &ColumnMapping) -> Result<Point> {
    let lat = row.get(&columns.lat_column).and_then(numeric).unwrap_or(f64::NAN);
    let lng = row.get(&columns.lng_column).and_then(numeric).unwrap_or(f64::NAN);
    if !lat.is_finite() || !lng.is_finite() {
        return Err(Error::InvalidCoordinate { lat, lng });
    }

    let weight = match columns.count_column.as_ref().and_then(|c| row.get(c)) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => {
            let count = numeric(value)
                .ok_or_else(|| Error::InvalidRow(format!("count is not numeric: {}", value)))?;
            if count < 0.0 || count.fract() != 0.0 || count > u64::MAX as f64 {
                return Err(Error::InvalidRow(format!(
                    "count must be a non-negative integer, got {}",
                    count
                )));
            }
            Some(count as u64)
        }
    };

    Ok(Point { latitude: lat, longitude: lng, weight })
}

/// Producer of raw rows (spreadsheet parser, HTTP fetch, ...)
pub trait RowSource {
    fn read_rows(&mut self) -> Result<Vec<Row>>;
}

/// Rows already in memory
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    rows: Vec<Row>,
}

impl VecRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl RowSource for VecRowSource {
    fn read_rows(&mut self) -> Result<Vec<Row>> {
        Ok(std::mem::take(&mut self.rows))
    }
}

enum JsonInput {
    File(PathBuf),
    Text(String),
}

/// Rows from a JSON array of objects, e.g. a sheet exported as JSON
pub struct JsonRowSource {
    input: JsonInput,
}

impl JsonRowSource {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        Self { input: JsonInput::File(path.as_ref().to_path_buf()) }
    }

    pub fn from_json_str(json: &str) -> Self {
        Self { input: JsonInput::Text(json.to_string()) }
    }

    fn parse(text: &str) -> Result<Vec<Row>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::LoadFailure(format!("failed to parse rows: {}", e)))?;

        let Value::Array(items) = value else {
            return Err(Error::LoadFailure("expected a JSON array of rows".into()));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                other => Err(Error::LoadFailure(format!("row {} is not an object: {}", i, other))),
            })
            .collect()
    }
}

impl RowSource for JsonRowSource {
    fn read_rows(&mut self) -> Result<Vec<Row>> {
        match &self.input {
            JsonInput::File(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    Error::LoadFailure(format!("failed to read {}: {}", path.display(), e))
                })?;
                Self::parse(&text)
            }
            JsonInput::Text(text) => Self::parse(text),
        }
    }
}
