//! Core types for the monitoring engine
//!
//! This module defines the data that flows through every stage: loosely typed
//! cell values, rows, the [`Batch`] table, and the typed [`Record`] view of a
//! row that passed validation.

use crate::error::EngineError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Column holding the sample instant
pub const TIMESTAMP: &str = "timestamp";
/// Column holding heart rate (bpm)
pub const HEART_RATE: &str = "heartRate";
/// Column holding heart-rate variability (ms)
pub const HRV: &str = "hrv";
/// Column holding the activity label
pub const ACTIVITY: &str = "activity";
/// Optional source label column
pub const DEVICE: &str = "device";
/// Optional body temperature column (celsius)
pub const TEMPERATURE: &str = "temperature";

/// Fields every record must carry
pub const REQUIRED_FIELDS: [&str; 4] = [TIMESTAMP, HEART_RATE, HRV, ACTIVITY];

/// Canonical text form for instants (fraction only printed when non-zero)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the accepted textual forms.
///
/// Offsets are honoured by converting to UTC before dropping the zone, so the
/// result is always timezone-naive.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, EngineError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(EngineError::DateParseError(format!(
        "unrecognized timestamp '{trimmed}'"
    )))
}

/// Format an instant in the canonical text form
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Activity label attached to every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Resting,
    Walking,
    Exercise,
    Sleeping,
}

impl Activity {
    /// Every valid label, in the order used by error messages
    pub const ALL: [Activity; 4] = [
        Activity::Resting,
        Activity::Walking,
        Activity::Exercise,
        Activity::Sleeping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Resting => "resting",
            Activity::Walking => "walking",
            Activity::Exercise => "exercise",
            Activity::Sleeping => "sleeping",
        }
    }

    /// Case-sensitive lookup of a wire label
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == label)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value
///
/// `Null` is the explicit "undefined" marker. Derived columns use it for
/// degenerate statistics instead of NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Number(f64),
    Bool(bool),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view; booleans are not numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Instant view; text is parsed on demand
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp(s).ok(),
            _ => None,
        }
    }

    /// Store a measurement, keeping integral values integral
    pub fn measurement(v: f64) -> Value {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
            Value::Integer(v as i64)
        } else {
            Value::Number(v)
        }
    }

    /// 0/1 indicator
    pub fn flag(set: bool) -> Value {
        Value::Integer(i64::from(set))
    }

    /// Optional statistic, `Null` when undefined
    pub fn optional(v: Option<f64>) -> Value {
        v.map_or(Value::Null, Value::Number)
    }

    /// Convert a JSON value from a record-array source
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .or_else(|| n.as_f64().map(Value::Number))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Infer a value from a raw tabular cell
    pub fn from_cell(cell: &str) -> Value {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }
        match trimmed {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            _ => Value::Text(cell.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Number(_) => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => serializer.collect_str(&ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<Activity> for Value {
    fn from(activity: Activity) -> Self {
        Value::Text(activity.as_str().to_string())
    }
}

/// One row of a batch; an absent key means the field is missing
pub type Row = HashMap<String, Value>;

/// Typed view of a valid row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Sample instant (timezone-naive)
    pub timestamp: NaiveDateTime,
    /// Heart rate (bpm)
    #[serde(rename = "heartRate")]
    pub heart_rate: f64,
    /// Heart-rate variability (ms)
    pub hrv: f64,
    /// Activity label
    pub activity: Activity,
    /// Source label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Body temperature (celsius)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Record {
    /// Convert to a row; optional fields are only present when set
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(TIMESTAMP.to_string(), Value::Timestamp(self.timestamp));
        row.insert(HEART_RATE.to_string(), Value::measurement(self.heart_rate));
        row.insert(HRV.to_string(), Value::measurement(self.hrv));
        row.insert(ACTIVITY.to_string(), self.activity.into());
        if let Some(device) = &self.device {
            row.insert(DEVICE.to_string(), Value::Text(device.clone()));
        }
        if let Some(temperature) = self.temperature {
            row.insert(TEMPERATURE.to_string(), Value::measurement(temperature));
        }
        row
    }
}

/// An ordered batch of rows with an ordered column inventory
///
/// Stages never mutate a batch they were handed; they clone it and attach
/// their derived columns to the copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Batch {
    /// Build a batch from a known column order.
    ///
    /// Keys found in rows but not listed are appended in sorted order.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut columns = columns;
        let mut extra: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys())
            .filter(|key| !columns.contains(key))
            .cloned()
            .collect();
        extra.sort();
        extra.dedup();
        columns.extend(extra);

        Self { columns, rows }
    }

    /// Build a batch whose columns are inferred from the rows
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(Vec::new(), rows)
    }

    /// Build a batch from typed records
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = REQUIRED_FIELDS.iter().map(|c| c.to_string()).collect();
        let has_device = records.iter().any(|r| r.device.is_some());
        let has_temperature = records.iter().any(|r| r.temperature.is_some());
        if has_device {
            columns.push(DEVICE.to_string());
        }
        if has_temperature {
            columns.push(TEMPERATURE.to_string());
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = record.to_row();
                if has_device {
                    row.entry(DEVICE.to_string()).or_insert(Value::Null);
                }
                if has_temperature {
                    row.entry(TEMPERATURE.to_string()).or_insert(Value::Null);
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with a schema error when a column is absent
    pub fn require_column(&self, name: &str) -> Result<(), EngineError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(EngineError::MissingColumn(name.to_string()))
        }
    }

    /// Cell lookup
    pub fn get(&self, index: usize, column: &str) -> Option<&Value> {
        self.rows.get(index).and_then(|row| row.get(column))
    }

    /// Per-row values of a column (`None` where the row lacks the key)
    pub fn column_values<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |row| row.get(name))
    }

    /// Per-row numeric values of a column (`None` for missing or non-numeric)
    pub fn numeric_column(&self, name: &str) -> Vec<Option<f64>> {
        self.column_values(name)
            .map(|v| v.and_then(Value::as_f64))
            .collect()
    }

    /// Per-row instants (`None` for missing or unparseable)
    pub fn timestamps(&self) -> Vec<Option<NaiveDateTime>> {
        self.column_values(TIMESTAMP)
            .map(|v| v.and_then(Value::as_timestamp))
            .collect()
    }

    /// Attach (or replace) a column, returning the new batch.
    ///
    /// `values` must hold one entry per row.
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), self.rows.len());
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(name.to_string(), value);
        }
        self
    }

    /// Copy of the batch stably sorted by timestamp ascending.
    ///
    /// Rows without a parseable instant sort last. Without a timestamp
    /// column the copy keeps the original order.
    pub fn sorted_by_timestamp(&self) -> Batch {
        if !self.has_column(TIMESTAMP) {
            return self.clone();
        }

        let mut keyed: Vec<(Option<NaiveDateTime>, &Row)> = self
            .rows
            .iter()
            .map(|row| (row.get(TIMESTAMP).and_then(Value::as_timestamp), row))
            .collect();

        keyed.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        Batch {
            columns: self.columns.clone(),
            rows: keyed.into_iter().map(|(_, row)| row.clone()).collect(),
        }
    }
}
