//! Aggregate summarization
//!
//! Builds the batch-level [`AnalysisReport`]: summary metadata, descriptive
//! statistics for every all-numeric column, the z-score anomaly block and the
//! activity breakdowns. Blocks whose source columns are absent are `None`.

use crate::detector::{detect_anomalies, AnomalyReport, DEFAULT_ANOMALY_THRESHOLD};
use crate::stats;
use crate::types::{Batch, Value, ACTIVITY, HEART_RATE, TIMESTAMP};
use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::{debug, warn};

/// String-keyed entries kept in insertion order, serialized as a JSON object
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// First and last instant of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_records: usize,
    pub columns: Vec<String>,
    /// Only when a timestamp column holds at least one parseable instant
    pub date_range: Option<DateRange>,
}

/// Descriptive statistics of one numeric column.
///
/// With no values, `count` is 0 and every statistic is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
}

impl ColumnStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            count: values.len(),
            mean: stats::mean(values),
            median: stats::quantile_sorted(&sorted, 0.5),
            std: stats::sample_std(values),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            q25: stats::quantile_sorted(&sorted, 0.25),
            q75: stats::quantile_sorted(&sorted, 0.75),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityShare {
    pub count: usize,
    /// Share of all rows, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityHeartRate {
    pub mean_hr: Option<f64>,
    pub std_hr: Option<f64>,
    pub min_hr: Option<f64>,
    pub max_hr: Option<f64>,
}

/// Batch-level analysis, computed fresh per call and never mutated after
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: BatchSummary,
    pub statistics: OrderedMap<ColumnStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<AnomalyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_breakdown: Option<OrderedMap<ActivityShare>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_stats: Option<OrderedMap<ActivityHeartRate>>,
}

/// Summarize with the default anomaly threshold
pub fn summarize(batch: &Batch) -> AnalysisReport {
    summarize_with(batch, DEFAULT_ANOMALY_THRESHOLD)
}

/// Summarize a batch. Read-only; O(n log n) per numeric column.
pub fn summarize_with(batch: &Batch, anomaly_threshold: f64) -> AnalysisReport {
    let anomalies = if batch.has_column(HEART_RATE) {
        match detect_anomalies(batch, anomaly_threshold) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(error = %err, "anomaly detection skipped");
                None
            }
        }
    } else {
        None
    };

    let report = AnalysisReport {
        summary: BatchSummary {
            total_records: batch.len(),
            columns: batch.columns().to_vec(),
            date_range: date_range(batch),
        },
        statistics: column_statistics(batch),
        anomalies,
        activity_breakdown: activity_breakdown(batch),
        activity_stats: activity_heart_rate(batch),
    };

    debug!(
        records = report.summary.total_records,
        numeric_columns = report.statistics.len(),
        "summarized batch"
    );
    report
}

fn date_range(batch: &Batch) -> Option<DateRange> {
    if !batch.has_column(TIMESTAMP) {
        return None;
    }

    let instants: Vec<NaiveDateTime> = batch.timestamps().into_iter().flatten().collect();
    let start = instants.iter().min().copied()?;
    let end = instants.iter().max().copied()?;

    Some(DateRange {
        start,
        end,
        duration_hours: (end - start).num_seconds() as f64 / 3600.0,
    })
}

/// Statistics for every column whose non-null values are all numeric
fn column_statistics(batch: &Batch) -> OrderedMap<ColumnStats> {
    batch
        .columns()
        .iter()
        .filter_map(|column| {
            let mut values = Vec::with_capacity(batch.len());
            for value in batch.column_values(column).flatten() {
                match value {
                    Value::Null => {}
                    other => values.push(other.as_f64()?),
                }
            }
            Some((column.clone(), ColumnStats::from_values(&values)))
        })
        .collect()
}

/// Display label of an activity cell; null and missing cells have none
fn activity_label(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Row indices per activity label, in order of first appearance
fn group_by_activity(batch: &Batch) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, value) in batch.column_values(ACTIVITY).enumerate() {
        let Some(label) = activity_label(value) else {
            continue;
        };
        match positions.get(&label) {
            Some(&pos) => groups[pos].1.push(index),
            None => {
                positions.insert(label.clone(), groups.len());
                groups.push((label, vec![index]));
            }
        }
    }
    groups
}

fn activity_breakdown(batch: &Batch) -> Option<OrderedMap<ActivityShare>> {
    if !batch.has_column(ACTIVITY) {
        return None;
    }

    let total = batch.len() as f64;
    Some(
        group_by_activity(batch)
            .into_iter()
            .map(|(label, rows)| {
                let share = ActivityShare {
                    count: rows.len(),
                    percentage: rows.len() as f64 / total * 100.0,
                };
                (label, share)
            })
            .collect(),
    )
}

fn activity_heart_rate(batch: &Batch) -> Option<OrderedMap<ActivityHeartRate>> {
    if !batch.has_column(ACTIVITY) || !batch.has_column(HEART_RATE) {
        return None;
    }

    let heart_rates = batch.numeric_column(HEART_RATE);
    Some(
        group_by_activity(batch)
            .into_iter()
            .map(|(label, rows)| {
                let values: Vec<f64> = rows.iter().filter_map(|&i| heart_rates[i]).collect();
                let stats = ActivityHeartRate {
                    mean_hr: stats::mean(&values),
                    std_hr: stats::sample_std(&values),
                    min_hr: stats::min(&values),
                    max_hr: stats::max(&values),
                };
                (label, stats)
            })
            .collect(),
    )
}
