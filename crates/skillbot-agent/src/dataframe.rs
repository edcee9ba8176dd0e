//! Tabular pre-analysis — load a data file and summarize its structure.
//!
//! The data-analysis subagent never parses raw data itself. Before it
//! starts, the file is loaded here and reduced to a compact JSON summary:
//! shape, inferred column types, and (outside privacy mode) a few sample
//! rows. Column type names follow pandas (`int64`, `float64`, `bool`,
//! `datetime64[ns]`, `object`) because the subagent writes pandas code.
//!
//! Supported formats, by extension: `.csv`, `.json`, `.xls`, `.xlsx`.
//! Excel files are read from their first sheet.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

/// Rows included in the sample.
const SAMPLE_ROWS: usize = 3;

/// Strings read as missing values.
const NA_VALUES: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%b %d, %Y"];

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read JSON {path}: {reason}")]
    Json { path: String, reason: String },

    #[error("Failed to read spreadsheet {path}: {reason}")]
    Excel { path: String, reason: String },
}

// ─────────────────────────────────────────────
// Table model
// ─────────────────────────────────────────────

/// One parsed cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDateTime),
}

/// Inferred column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    DateTime,
    Object,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::DateTime => "datetime64[ns]",
            Self::Object => "object",
        }
    }
}

/// Column-major view of a loaded file.
#[derive(Clone, Debug, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(headers: Vec<String>) -> Self {
        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let h = h.trim().to_string();
                if h.is_empty() {
                    format!("Unnamed: {i}")
                } else {
                    h
                }
            })
            .collect();
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating to the header width.
    fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Infer the type of every column, coercing date-like text columns.
    pub fn infer_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|i| infer_column(self.column(i)))
            .collect()
    }
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnType {
    let (mut nulls, mut ints, mut floats, mut bools, mut dates, mut texts, mut date_texts) =
        (0usize, 0usize, 0usize, 0usize, 0usize, 0usize, 0usize);
    let mut total = 0usize;

    for cell in cells {
        total += 1;
        match cell {
            Cell::Null => nulls += 1,
            Cell::Int(_) => ints += 1,
            Cell::Float(_) => floats += 1,
            Cell::Bool(_) => bools += 1,
            Cell::Date(_) => dates += 1,
            Cell::Text(s) => {
                texts += 1;
                if parse_date(s).is_some() {
                    date_texts += 1;
                }
            }
        }
    }

    let present = total - nulls;
    if present == 0 {
        ColumnType::Float64
    } else if ints == present {
        if nulls == 0 {
            ColumnType::Int64
        } else {
            ColumnType::Float64
        }
    } else if ints + floats == present {
        ColumnType::Float64
    } else if bools == present {
        if nulls == 0 {
            ColumnType::Bool
        } else {
            ColumnType::Object
        }
    } else if dates + texts == present && date_texts == texts {
        ColumnType::DateTime
    } else {
        ColumnType::Object
    }
}

// ─────────────────────────────────────────────
// Cell parsing
// ─────────────────────────────────────────────

/// Parse a date or timestamp written in one of the common layouts.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DAY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Interpret a CSV field.
fn parse_text_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if NA_VALUES.contains(&s) {
        return Cell::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    match s {
        "True" | "true" | "TRUE" => Cell::Bool(true),
        "False" | "false" | "FALSE" => Cell::Bool(false),
        _ => Cell::Text(raw.to_string()),
    }
}

fn json_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Null, Cell::Float),
        },
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

/// Excel serial dates count days from 1899-12-30.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

fn excel_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Int(i) => Cell::Int(*i),
        // Spreadsheets store every number as a float.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => {
            if s.trim().is_empty() {
                Cell::Null
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64()).map_or(Cell::Null, Cell::Date),
        Data::DateTimeIso(s) => parse_date(s).map_or_else(|| Cell::Text(s.clone()), Cell::Date),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

// ─────────────────────────────────────────────
// Loaders
// ─────────────────────────────────────────────

/// Load a data file, choosing the reader from its extension.
pub fn load_table(path: &str) -> Result<Table, TableError> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let loader: fn(&str) -> Result<Table, TableError> = match ext.as_str() {
        "csv" => load_csv,
        "json" => load_json,
        "xls" | "xlsx" => load_excel,
        _ => return Err(TableError::Unsupported(path.to_string())),
    };

    if !Path::new(path).is_file() {
        return Err(TableError::NotFound(path.to_string()));
    }
    loader(path)
}

fn load_csv(path: &str) -> Result<Table, TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        table.push_row(record.iter().map(parse_text_cell).collect());
    }
    Ok(table)
}

/// Accepts an array of records, or an object of columns where each column
/// is an array or an `{index: value}` object.
fn load_json(path: &str) -> Result<Table, TableError> {
    let json_err = |reason: String| TableError::Json {
        path: path.to_string(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| json_err(e.to_string()))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| json_err(e.to_string()))?;

    match value {
        Value::Array(records) => {
            let mut headers: Vec<String> = Vec::new();
            for record in &records {
                let obj = record
                    .as_object()
                    .ok_or_else(|| json_err("expected an array of objects".into()))?;
                for key in obj.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
            let mut table = Table::new(headers.clone());
            for record in &records {
                table.push_row(
                    headers
                        .iter()
                        .map(|h| record.get(h).map_or(Cell::Null, json_cell))
                        .collect(),
                );
            }
            Ok(table)
        }
        Value::Object(columns) => {
            let headers: Vec<String> = columns.keys().cloned().collect();
            let values: Vec<Vec<Value>> = columns
                .into_iter()
                .map(|(name, col)| match col {
                    Value::Array(items) => Ok(items),
                    Value::Object(by_index) => Ok(by_index.into_iter().map(|(_, v)| v).collect()),
                    _ => Err(json_err(format!("column '{name}' is not an array or object"))),
                })
                .collect::<Result<_, _>>()?;

            let height = values.iter().map(Vec::len).max().unwrap_or(0);
            let mut table = Table::new(headers);
            for row in 0..height {
                table.push_row(
                    values
                        .iter()
                        .map(|col| col.get(row).map_or(Cell::Null, json_cell))
                        .collect(),
                );
            }
            Ok(table)
        }
        _ => Err(json_err("expected an array or object at top level".into())),
    }
}

fn load_excel(path: &str) -> Result<Table, TableError> {
    let excel_err = |reason: String| TableError::Excel {
        path: path.to_string(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| excel_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| excel_err("workbook has no sheets".into()))?
        .map_err(|e| excel_err(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers = header_row
        .iter()
        .map(|c| match c {
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();

    let mut table = Table::new(headers);
    for row in rows {
        table.push_row(row.iter().map(excel_cell).collect());
    }
    Ok(table)
}

// ─────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────

fn sample_value(cell: &Cell, ty: ColumnType) -> Value {
    match (cell, ty) {
        (Cell::Null, _) => Value::Null,
        (Cell::Text(s), ColumnType::DateTime) => {
            parse_date(s).map_or(Value::Null, |d| json!(format_date(d)))
        }
        (Cell::Date(d), _) => json!(format_date(*d)),
        (Cell::Int(i), ColumnType::Float64) => json!(*i as f64),
        (Cell::Int(i), _) => json!(i),
        (Cell::Float(f), _) => json!(f),
        (Cell::Bool(b), _) => json!(b),
        (Cell::Text(s), _) => json!(s),
    }
}

fn format_date(d: NaiveDateTime) -> String {
    d.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Summarize a loaded table as JSON.
///
/// Privacy mode drops the sample rows; column names and types are always
/// included.
pub fn summarize(file_path: &str, table: &Table, privacy_mode: bool) -> Value {
    let types = table.infer_types();
    let (rows, cols) = table.shape();

    let mut columns = Map::new();
    for (name, ty) in table.columns.iter().zip(&types) {
        columns.insert(name.clone(), json!(ty.as_str()));
    }

    let mut info = Map::new();
    info.insert("file_path".into(), json!(file_path));
    info.insert("shape".into(), json!({"rows": rows, "columns": cols}));
    info.insert("columns".into(), Value::Object(columns));

    if !privacy_mode {
        let sample: Vec<Value> = table
            .rows
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| {
                let record: Map<String, Value> = table
                    .columns
                    .iter()
                    .zip(row.iter().zip(&types))
                    .map(|(name, (cell, ty))| (name.clone(), sample_value(cell, *ty)))
                    .collect();
                Value::Object(record)
            })
            .collect();
        info.insert("sample".into(), Value::Array(sample));
    }

    Value::Object(info)
}

/// Load and summarize in one step.
pub fn analyze(file_path: &str, privacy_mode: bool) -> Result<Value, TableError> {
    let table = load_table(file_path)?;
    debug!(file = file_path, rows = table.rows.len(), cols = table.columns.len(), "pre-analyzed table");
    Ok(summarize(file_path, &table, privacy_mode))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_csv_dates_inferred_as_datetime() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "sales.csv",
            "id,date,amount\n1,2024-01-05,10.5\n2,2024-02-11,7\n3,2024-03-01,3.25\n",
        );
        let info = analyze(&path, false).unwrap();
        assert_eq!(info["columns"]["id"], "int64");
        assert_eq!(info["columns"]["date"], "datetime64[ns]");
        assert_eq!(info["columns"]["amount"], "float64");
        assert_eq!(info["shape"]["rows"], 3);
        assert_eq!(info["shape"]["columns"], 3);
        assert_eq!(info["sample"][0]["date"], "2024-01-05 00:00:00");
        assert_eq!(info["sample"][1]["amount"], 7.0);
    }

    #[test]
    fn test_text_columns_stay_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "people.csv", "name,joined\nAda,2020-01-01\nBob,soon\n");
        let info = analyze(&path, false).unwrap();
        assert_eq!(info["columns"]["name"], "object");
        // One unparseable value keeps the column as text.
        assert_eq!(info["columns"]["joined"], "object");
    }

    #[test]
    fn test_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "gaps.csv", "a,b,c,d\n1,,true,\n,NA,false,\n3,x,,\n");
        let table = load_table(&path).unwrap();
        let types = table.infer_types();
        assert_eq!(
            types,
            vec![
                ColumnType::Float64,
                ColumnType::Object,
                ColumnType::Object,
                ColumnType::Float64
            ]
        );
    }

    #[test]
    fn test_privacy_mode_omits_sample_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "secret.csv", "ssn,salary\n123,100\n");
        let info = analyze(&path, true).unwrap();
        assert!(info.get("sample").is_none());
        assert_eq!(info["columns"]["ssn"], "int64");
    }

    #[test]
    fn test_summary_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "z,a\n1,2\n");
        let info = analyze(&path, false).unwrap();
        let keys: Vec<&String> = info.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["file_path", "shape", "columns", "sample"]);
        let cols: Vec<&String> = info["columns"].as_object().unwrap().keys().collect();
        assert_eq!(cols, vec!["z", "a"]);
    }

    #[test]
    fn test_sample_limited_to_three_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "n.csv", "n\n1\n2\n3\n4\n5\n");
        let info = analyze(&path, false).unwrap();
        assert_eq!(info["sample"].as_array().unwrap().len(), 3);
        assert_eq!(info["shape"]["rows"], 5);
    }

    #[test]
    fn test_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "r.json",
            r#"[{"id": 1, "when": "2023-05-01T10:00:00Z", "ok": true},
                {"id": 2, "when": "2023-05-02T11:30:00Z", "ok": false}]"#,
        );
        let info = analyze(&path, false).unwrap();
        assert_eq!(info["columns"]["id"], "int64");
        assert_eq!(info["columns"]["when"], "datetime64[ns]");
        assert_eq!(info["columns"]["ok"], "bool");
        assert_eq!(info["sample"][1]["when"], "2023-05-02 11:30:00");
    }

    #[test]
    fn test_json_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "c.json",
            r#"{"city": {"0": "Oslo", "1": "Lima"}, "temp": [3.5, 19]}"#,
        );
        let table = load_table(&path).unwrap();
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(table.rows[1][0], Cell::Text("Lima".into()));
        assert_eq!(table.infer_types()[1], ColumnType::Float64);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_table("/data/report.parquet").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: /data/report.parquet");
    }

    #[test]
    fn test_missing_file() {
        let err = load_table("/nonexistent/data.csv").unwrap_err();
        assert!(matches!(err, TableError::NotFound(_)));
    }

    #[test]
    fn test_blank_headers_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "h.csv", ",value\n0,1\n");
        let table = load_table(&path).unwrap();
        assert_eq!(table.columns, vec!["Unnamed: 0", "value"]);
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-01-05").is_some());
        assert!(parse_date("01/31/2024").is_some());
        assert!(parse_date("2024-01-05 13:45:00").is_some());
        assert!(parse_date("2024-01-05T13:45:00+02:00").is_some());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("42").is_none());
    }

    #[test]
    fn test_excel_serial_dates() {
        let d = excel_serial_to_datetime(45_292.5).unwrap();
        assert_eq!(format_date(d), "2024-01-01 12:00:00");
    }
}
