//! Error types for the monitoring engine

use thiserror::Error;

/// Errors that can occur while loading, enriching or summarizing a batch
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
