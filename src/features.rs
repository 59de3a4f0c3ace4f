//! Time feature derivation
//!
//! This module derives calendar features from each record's timestamp:
//! - Hour of day and day of week (Monday = 0)
//! - Night flag (hour >= 22 or hour <= 6, both bounds inclusive)
//! - Weekend flag (day of week >= 5)

use crate::error::EngineError;
use crate::types::{Batch, Value, TIMESTAMP};
use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::warn;

pub const HOUR: &str = "hour";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const IS_NIGHT: &str = "is_night";
pub const IS_WEEKEND: &str = "is_weekend";

/// Calendar features of a single instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFeatures {
    /// 0-23
    pub hour: u32,
    /// 0-6, Monday = 0
    pub day_of_week: u32,
    pub is_night: bool,
    pub is_weekend: bool,
}

impl TimeFeatures {
    pub fn from_timestamp(ts: &NaiveDateTime) -> Self {
        let hour = ts.hour();
        let day_of_week = ts.weekday().num_days_from_monday();

        Self {
            hour,
            day_of_week,
            is_night: is_night_hour(hour),
            is_weekend: day_of_week >= 5,
        }
    }
}

/// Night covers 22:00 through 06:59; both 6 and 22 count as night.
fn is_night_hour(hour: u32) -> bool {
    hour >= 22 || hour <= 6
}

/// Deriver for attaching time features to a batch
pub struct TimeFeatureDeriver;

impl TimeFeatureDeriver {
    /// Attach `hour`, `day_of_week`, `is_night` and `is_weekend` columns.
    ///
    /// Row order is preserved. Textual timestamps are normalized to instants
    /// in the returned batch; rows whose timestamp cannot be parsed get null
    /// features. O(n).
    pub fn add_time_features(batch: &Batch) -> Result<Batch, EngineError> {
        batch.require_column(TIMESTAMP)?;

        let timestamps = batch.timestamps();
        let features: Vec<Option<TimeFeatures>> = timestamps
            .iter()
            .map(|ts| ts.as_ref().map(TimeFeatures::from_timestamp))
            .collect();

        let unparsed = features.iter().filter(|f| f.is_none()).count();
        if unparsed > 0 {
            warn!(
                rows = unparsed,
                "rows without a parseable timestamp get null time features"
            );
        }

        let column = |extract: fn(&TimeFeatures) -> Value| -> Vec<Value> {
            features
                .iter()
                .map(|f| f.as_ref().map_or(Value::Null, extract))
                .collect()
        };

        let normalized: Vec<Value> = batch
            .column_values(TIMESTAMP)
            .zip(&timestamps)
            .map(|(raw, parsed)| match parsed {
                Some(ts) => Value::Timestamp(*ts),
                None => raw.cloned().unwrap_or(Value::Null),
            })
            .collect();

        Ok(batch
            .clone()
            .with_column(TIMESTAMP, normalized)
            .with_column(HOUR, column(|f| Value::Integer(i64::from(f.hour))))
            .with_column(DAY_OF_WEEK, column(|f| Value::Integer(i64::from(f.day_of_week))))
            .with_column(IS_NIGHT, column(|f| Value::flag(f.is_night)))
            .with_column(IS_WEEKEND, column(|f| Value::flag(f.is_weekend))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Row, HEART_RATE};

    fn batch_at(stamps: &[&str]) -> Batch {
        let rows = stamps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut row = Row::new();
                row.insert(TIMESTAMP.to_string(), Value::Text(s.to_string()));
                row.insert(HEART_RATE.to_string(), Value::Integer(60 + i as i64));
                row
            })
            .collect();
        Batch::from_rows(rows)
    }

    #[test]
    fn test_night_boundaries_are_inclusive() {
        let hours = [(5, true), (6, true), (7, false), (21, false), (22, true), (23, true), (0, true)];
        for (hour, night) in hours {
            assert_eq!(is_night_hour(hour), night, "hour {hour}");
        }
    }

    #[test]
    fn test_features_for_known_dates() {
        // 2024-01-15 is a Monday, 2024-01-13 a Saturday
        let monday = TimeFeatures::from_timestamp(&parse_timestamp("2024-01-15T14:30:00").unwrap());
        assert_eq!(monday.hour, 14);
        assert_eq!(monday.day_of_week, 0);
        assert!(!monday.is_night);
        assert!(!monday.is_weekend);

        let saturday =
            TimeFeatures::from_timestamp(&parse_timestamp("2024-01-13T06:00:00").unwrap());
        assert_eq!(saturday.day_of_week, 5);
        assert!(saturday.is_night);
        assert!(saturday.is_weekend);
    }

    #[test]
    fn test_add_time_features_preserves_order() {
        let batch = batch_at(&["2024-01-15T23:00:00", "2024-01-15T01:00:00"]);
        let enriched = TimeFeatureDeriver::add_time_features(&batch).unwrap();

        assert_eq!(enriched.get(0, HOUR), Some(&Value::Integer(23)));
        assert_eq!(enriched.get(1, HOUR), Some(&Value::Integer(1)));
        assert_eq!(enriched.get(0, HEART_RATE), Some(&Value::Integer(60)));
        assert!(matches!(enriched.get(0, TIMESTAMP), Some(Value::Timestamp(_))));

        // input is not touched
        assert!(!batch.has_column(HOUR));
    }

    #[test]
    fn test_add_time_features_is_idempotent() {
        let batch = batch_at(&["2024-01-13T22:00:00", "2024-01-16T12:00:00"]);
        let once = TimeFeatureDeriver::add_time_features(&batch).unwrap();
        let twice = TimeFeatureDeriver::add_time_features(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unparseable_timestamp_gets_null_features() {
        let batch = batch_at(&["2024-01-15T10:00:00", "garbage"]);
        let enriched = TimeFeatureDeriver::add_time_features(&batch).unwrap();
        assert_eq!(enriched.get(1, IS_NIGHT), Some(&Value::Null));
        assert_eq!(enriched.get(1, TIMESTAMP), Some(&Value::Text("garbage".to_string())));
    }

    #[test]
    fn test_missing_timestamp_column() {
        let batch = Batch::from_rows(vec![Row::new()]);
        assert!(matches!(
            TimeFeatureDeriver::add_time_features(&batch),
            Err(EngineError::MissingColumn(_))
        ));
    }
}
