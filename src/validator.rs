//! Record validation
//!
//! Checks a single row, or a whole batch, against the required-field, range
//! and enum constraints of a monitoring record. Validation never aborts a
//! batch on a bad row; every violation is collected with its row index.

use crate::types::{
    Activity, Batch, Record, Row, Value, ACTIVITY, DEVICE, HEART_RATE, HRV, REQUIRED_FIELDS,
    TEMPERATURE, TIMESTAMP,
};
use serde::Serialize;
use tracing::debug;

/// Inclusive heart-rate domain (bpm)
pub const HEART_RATE_RANGE: (f64, f64) = (30.0, 220.0);

/// Inclusive temperature domain (celsius)
pub const TEMPERATURE_RANGE: (f64, f64) = (30.0, 45.0);

/// Coarse classification of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unparseable timestamp, wrong type, missing field
    MalformedInput,
    /// Value of the right type outside its domain
    OutOfRange,
    /// Column absent from the whole batch
    Schema,
}

/// Validation errors for monitoring records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Invalid {field} value: expected a number, got {value}")]
    NotNumeric { field: String, value: String },

    #[error("Heart rate out of valid range (30-220): {0}")]
    HeartRateOutOfRange(f64),

    #[error("Invalid HRV value: {0} (must be non-negative)")]
    NegativeHrv(f64),

    #[error("Invalid activity: {0}. Must be one of [{}]", valid_activities())]
    InvalidActivity(String),

    #[error("Temperature out of valid range (30-45°C): {0}")]
    TemperatureOutOfRange(f64),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MissingColumn(_) => ErrorKind::Schema,
            ValidationError::MissingField(_)
            | ValidationError::InvalidTimestamp { .. }
            | ValidationError::NotNumeric { .. }
            | ValidationError::InvalidActivity(_) => ErrorKind::MalformedInput,
            ValidationError::HeartRateOutOfRange(_)
            | ValidationError::NegativeHrv(_)
            | ValidationError::TemperatureOutOfRange(_) => ErrorKind::OutOfRange,
        }
    }
}

fn valid_activities() -> String {
    Activity::ALL
        .iter()
        .map(Activity::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single problem found while validating a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Ordinal row position; `None` for batch-level schema problems
    pub index: Option<usize>,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of validating a whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchValidation {
    pub total_records: usize,
    pub issues: Vec<ValidationIssue>,
}

impl BatchValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// True when a required column was missing and rows were not inspected
    pub fn is_schema_failure(&self) -> bool {
        self.issues.iter().any(|i| i.kind == ErrorKind::Schema)
    }

    /// Number of rows with at least one problem
    pub fn invalid_records(&self) -> usize {
        self.issues.iter().filter(|i| i.index.is_some()).count()
    }

    /// Human-readable error list, row errors prefixed with their index
    pub fn errors(&self) -> Vec<String> {
        self.issues
            .iter()
            .map(|issue| match issue.index {
                Some(idx) => format!("Row {}: {}", idx, issue.message),
                None => issue.message.clone(),
            })
            .collect()
    }
}

/// Validator for monitoring records
pub struct RecordValidator;

impl RecordValidator {
    /// Validate a single row
    pub fn validate_record(row: &Row) -> Result<(), ValidationError> {
        Self::parse_record(row).map(|_| ())
    }

    /// Validate a single row and return its typed form.
    ///
    /// Required fields are checked before any value; the first failure wins.
    pub fn parse_record(row: &Row) -> Result<Record, ValidationError> {
        for field in REQUIRED_FIELDS {
            if !row.contains_key(field) {
                return Err(ValidationError::MissingField(field.to_string()));
            }
        }

        let timestamp = parse_timestamp_field(row.get(TIMESTAMP))?;

        let heart_rate = numeric_field(row, HEART_RATE)?;
        let (hr_min, hr_max) = HEART_RATE_RANGE;
        if !(hr_min..=hr_max).contains(&heart_rate) {
            return Err(ValidationError::HeartRateOutOfRange(heart_rate));
        }

        let hrv = numeric_field(row, HRV)?;
        if hrv.is_nan() || hrv < 0.0 {
            return Err(ValidationError::NegativeHrv(hrv));
        }

        let activity = match row.get(ACTIVITY) {
            Some(Value::Text(label)) => Activity::parse(label)
                .ok_or_else(|| ValidationError::InvalidActivity(label.clone()))?,
            Some(other) => return Err(ValidationError::InvalidActivity(other.to_string())),
            None => return Err(ValidationError::MissingField(ACTIVITY.to_string())),
        };

        let temperature = match row.get(TEMPERATURE) {
            None | Some(Value::Null) => None,
            Some(_) => {
                let t = numeric_field(row, TEMPERATURE)?;
                let (t_min, t_max) = TEMPERATURE_RANGE;
                if !(t_min..=t_max).contains(&t) {
                    return Err(ValidationError::TemperatureOutOfRange(t));
                }
                Some(t)
            }
        };

        let device = match row.get(DEVICE) {
            None | Some(Value::Null) => None,
            Some(Value::Text(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Ok(Record {
            timestamp,
            heart_rate,
            hrv,
            activity,
            device,
            temperature,
        })
    }

    /// Validate every row of a batch.
    ///
    /// Missing required columns are reported once each and short-circuit the
    /// per-row checks.
    pub fn validate_batch(batch: &Batch) -> BatchValidation {
        let schema_issues: Vec<ValidationIssue> = REQUIRED_FIELDS
            .iter()
            .filter(|field| !batch.has_column(field))
            .map(|field| {
                let err = ValidationError::MissingColumn(field.to_string());
                ValidationIssue {
                    index: None,
                    kind: err.kind(),
                    message: err.to_string(),
                }
            })
            .collect();

        if !schema_issues.is_empty() {
            debug!(missing = schema_issues.len(), "batch failed schema check");
            return BatchValidation {
                total_records: batch.len(),
                issues: schema_issues,
            };
        }

        let issues: Vec<ValidationIssue> = batch
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                Self::validate_record(row).err().map(|err| ValidationIssue {
                    index: Some(idx),
                    kind: err.kind(),
                    message: err.to_string(),
                })
            })
            .collect();

        debug!(
            total = batch.len(),
            invalid = issues.len(),
            "validated batch"
        );

        BatchValidation {
            total_records: batch.len(),
            issues,
        }
    }
}

fn parse_timestamp_field(value: Option<&Value>) -> Result<chrono::NaiveDateTime, ValidationError> {
    match value {
        Some(Value::Timestamp(ts)) => Ok(*ts),
        Some(Value::Text(raw)) => {
            crate::types::parse_timestamp(raw).map_err(|e| ValidationError::InvalidTimestamp {
                value: raw.clone(),
                reason: e.to_string(),
            })
        }
        Some(other) => Err(ValidationError::InvalidTimestamp {
            value: other.to_string(),
            reason: "expected text or an instant".to_string(),
        }),
        None => Err(ValidationError::MissingField(TIMESTAMP.to_string())),
    }
}

fn numeric_field(row: &Row, field: &str) -> Result<f64, ValidationError> {
    match row.get(field) {
        Some(value) => value.as_f64().ok_or_else(|| ValidationError::NotNumeric {
            field: field.to_string(),
            value: value.to_string(),
        }),
        None => Err(ValidationError::MissingField(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_row() -> Row {
        let mut row = Row::new();
        row.insert(TIMESTAMP.to_string(), Value::Text("2024-01-15T08:30:00".to_string()));
        row.insert(HEART_RATE.to_string(), Value::Integer(72));
        row.insert(HRV.to_string(), Value::Integer(45));
        row.insert(ACTIVITY.to_string(), Value::Text("resting".to_string()));
        row.insert(DEVICE.to_string(), Value::Text("Polar H10".to_string()));
        row
    }

    fn with(field: &str, value: Value) -> Row {
        let mut row = valid_row();
        row.insert(field.to_string(), value);
        row
    }

    #[test]
    fn test_valid_record() {
        let record = RecordValidator::parse_record(&valid_row()).unwrap();
        assert_eq!(record.heart_rate, 72.0);
        assert_eq!(record.activity, Activity::Resting);
        assert_eq!(record.device.as_deref(), Some("Polar H10"));
        assert!(record.temperature.is_none());
    }

    #[test]
    fn test_each_missing_field_is_named() {
        for field in REQUIRED_FIELDS {
            let mut row = valid_row();
            row.remove(field);
            let err = RecordValidator::validate_record(&row).unwrap_err();
            assert_eq!(err, ValidationError::MissingField(field.to_string()));
            assert!(err.to_string().ends_with(&format!("field: {field}")));
        }
    }

    #[test]
    fn test_missing_field_precedes_value_checks() {
        let mut row = with(HEART_RATE, Value::Integer(500));
        row.remove(ACTIVITY);
        let err = RecordValidator::validate_record(&row).unwrap_err();
        assert_eq!(err, ValidationError::MissingField(ACTIVITY.to_string()));
    }

    #[test]
    fn test_heart_rate_boundaries() {
        for hr in [30, 220] {
            assert!(RecordValidator::validate_record(&with(HEART_RATE, Value::Integer(hr))).is_ok());
        }
        for hr in [29, 221] {
            let err = RecordValidator::validate_record(&with(HEART_RATE, Value::Integer(hr)))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfRange);
        }
    }

    #[test]
    fn test_non_numeric_heart_rate() {
        let err = RecordValidator::validate_record(&with(HEART_RATE, Value::Text("fast".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("heartRate"));
    }

    #[test]
    fn test_hrv_must_be_non_negative() {
        assert!(RecordValidator::validate_record(&with(HRV, Value::Integer(0))).is_ok());
        let err = RecordValidator::validate_record(&with(HRV, Value::Number(-0.5))).unwrap_err();
        assert_eq!(err, ValidationError::NegativeHrv(-0.5));
    }

    #[test]
    fn test_invalid_activity_lists_valid_set() {
        let err = RecordValidator::validate_record(&with(ACTIVITY, Value::Text("Resting".into())))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("resting, walking, exercise, sleeping"));
    }

    #[test]
    fn test_unparseable_timestamp() {
        let err = RecordValidator::validate_record(&with(TIMESTAMP, Value::Text("soon".into())))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_temperature_optional_and_ranged() {
        assert!(RecordValidator::validate_record(&with(TEMPERATURE, Value::Null)).is_ok());
        assert!(RecordValidator::validate_record(&with(TEMPERATURE, Value::Number(36.6))).is_ok());
        assert!(RecordValidator::validate_record(&with(TEMPERATURE, Value::Integer(45))).is_ok());
        let err = RecordValidator::validate_record(&with(TEMPERATURE, Value::Number(45.1)))
            .unwrap_err();
        assert_eq!(err, ValidationError::TemperatureOutOfRange(45.1));
    }

    #[test]
    fn test_batch_collects_all_row_errors() {
        let batch = Batch::from_rows(vec![
            valid_row(),
            with(HEART_RATE, Value::Integer(10)),
            valid_row(),
            with(ACTIVITY, Value::Text("dancing".into())),
        ]);

        let report = RecordValidator::validate_batch(&batch);
        assert!(!report.is_valid());
        assert_eq!(report.total_records, 4);
        assert_eq!(report.invalid_records(), 2);

        let errors = report.errors();
        assert!(errors[0].starts_with("Row 1: "));
        assert!(errors[1].starts_with("Row 3: "));
    }

    #[test]
    fn test_batch_missing_column_reported_once() {
        let rows: Vec<Row> = (0..5)
            .map(|_| {
                let mut row = valid_row();
                row.remove(HRV);
                row
            })
            .collect();
        let batch = Batch::from_rows(rows);

        let report = RecordValidator::validate_batch(&batch);
        assert!(report.is_schema_failure());
        assert_eq!(report.errors(), vec!["Missing required column: hrv".to_string()]);
    }
}
