//! Dataset loading and writing
//!
//! Adapters between files and [`Batch`]es:
//! - CSV: header row defines the columns, cells are type-inferred
//! - JSON: a top-level array of record objects
//!
//! Textual timestamps that parse are converted to instants on load and are
//! written back in the canonical text form.

use crate::error::EngineError;
use crate::types::{parse_timestamp, Batch, Row, Value, TIMESTAMP};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Content type sent for files of unknown format
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// File formats a batch can be read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(DataFormat::Csv),
            Some("json") => Ok(DataFormat::Json),
            _ => Err(EngineError::UnsupportedFormat(format!(
                "{} (expected .csv or .json)",
                path.display()
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DataFormat::Csv => "text/csv",
            DataFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
        }
    }
}

/// Adapter for reading and writing batches
pub struct DatasetAdapter;

impl DatasetAdapter {
    /// Load a batch, picking the format from the file extension
    pub fn load(path: &Path) -> Result<Batch, EngineError> {
        let format = DataFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        let batch = Self::parse(&content, format)?;

        info!(
            path = %path.display(),
            records = batch.len(),
            columns = batch.columns().len(),
            "loaded batch"
        );
        Ok(batch)
    }

    pub fn parse(content: &str, format: DataFormat) -> Result<Batch, EngineError> {
        match format {
            DataFormat::Csv => Self::parse_csv(content),
            DataFormat::Json => Self::parse_json(content),
        }
    }

    /// Parse CSV text with a header row
    pub fn parse_csv(content: &str) -> Result<Batch, EngineError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.clone(), Value::from_cell(cell)))
                .collect();
            rows.push(row);
        }

        Ok(normalize_timestamps(Batch::new(headers, rows)))
    }

    /// Parse a JSON array of record objects.
    ///
    /// Columns are the union of keys in order of first appearance.
    pub fn parse_json(content: &str) -> Result<Batch, EngineError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let items = value.as_array().ok_or_else(|| {
            EngineError::MalformedInput("expected a JSON array of records".to_string())
        })?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                EngineError::MalformedInput(format!("record {index} is not a JSON object"))
            })?;

            let mut row = Row::with_capacity(object.len());
            for (key, value) in object {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
                row.insert(key.clone(), Value::from_json(value));
            }
            rows.push(row);
        }

        Ok(normalize_timestamps(Batch::new(columns, rows)))
    }

    pub fn to_string(batch: &Batch, format: DataFormat) -> Result<String, EngineError> {
        match format {
            DataFormat::Csv => Self::to_csv_string(batch),
            DataFormat::Json => Self::to_json_string(batch),
        }
    }

    /// CSV in column order; missing and null cells are empty
    pub fn to_csv_string(batch: &Batch) -> Result<String, EngineError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(batch.columns())?;

        for row in batch.rows() {
            writer.write_record(batch.columns().iter().map(|column| cell_text(row.get(column))))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EngineError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| EngineError::MalformedInput(e.to_string()))
    }

    /// Pretty JSON array of objects, keys in column order
    pub fn to_json_string(batch: &Batch) -> Result<String, EngineError> {
        let records = batch
            .rows()
            .iter()
            .map(|row| {
                batch
                    .columns()
                    .iter()
                    .filter_map(|column| row.get(column).map(|value| (column, value)))
                    .map(|(column, value)| -> Result<_, EngineError> {
                        Ok((column.clone(), serde_json::to_value(value)?))
                    })
                    .collect::<Result<serde_json::Map<String, serde_json::Value>, EngineError>>()
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Write a batch, picking the format from the file extension
    pub fn save(batch: &Batch, path: &Path) -> Result<(), EngineError> {
        let format = DataFormat::from_path(path)?;
        fs::write(path, Self::to_string(batch, format)?)?;

        info!(path = %path.display(), records = batch.len(), "saved batch");
        Ok(())
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(value) => value.to_string(),
    }
}

/// Convert parseable textual timestamps to instants, leaving the rest as text
fn normalize_timestamps(batch: Batch) -> Batch {
    if !batch.has_column(TIMESTAMP) {
        return batch;
    }

    let columns = batch.columns().to_vec();
    let rows = batch
        .into_rows()
        .into_iter()
        .map(|mut row| {
            if let Some(value) = row.get_mut(TIMESTAMP) {
                let parsed = match value {
                    Value::Text(text) => parse_timestamp(text).ok(),
                    _ => None,
                };
                if let Some(ts) = parsed {
                    *value = Value::Timestamp(ts);
                }
            }
            row
        })
        .collect();

    Batch::new(columns, rows)
}
