//! Rapid-change and anomaly detection
//!
//! Two independent analyses over one batch:
//! - Rapid change: absolute heart-rate delta between consecutive samples in
//!   timestamp order, flagged when above a bpm threshold
//! - Statistical anomaly: heart-rate z-score against the whole batch, flagged
//!   when its magnitude exceeds a fixed threshold

use crate::error::EngineError;
use crate::stats;
use crate::types::{Batch, Value, HEART_RATE, TIMESTAMP};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

/// Default rapid-change threshold (bpm)
pub const DEFAULT_RAPID_CHANGE_THRESHOLD: f64 = 20.0;

/// Default |z| above which a sample is anomalous
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

pub const HR_CHANGE: &str = "hr_change";
pub const RAPID_CHANGE: &str = "rapid_change";
pub const HR_ZSCORE: &str = "hr_zscore";

/// One anomalous sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    /// Position in the analyzed batch
    pub index: usize,
    pub timestamp: Option<NaiveDateTime>,
    #[serde(rename = "heartRate")]
    pub heart_rate: f64,
    /// Absolute z-score
    pub hr_zscore: f64,
}

/// Result of z-score anomaly detection over a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub count: usize,
    /// Share of the batch flagged, 0-100
    pub percentage: f64,
    pub threshold: f64,
    /// Anomalous samples in batch order
    pub records: Vec<AnomalyRecord>,
}

/// Absolute difference to the previous sample; undefined for the first
/// sample and wherever either side is missing.
pub fn heart_rate_changes(values: &[Option<f64>]) -> Vec<Option<f64>> {
    if values.is_empty() {
        return Vec::new();
    }
    std::iter::once(None)
        .chain(values.windows(2).map(|pair| match (pair[0], pair[1]) {
            (Some(prev), Some(curr)) => Some((curr - prev).abs()),
            _ => None,
        }))
        .collect()
}

/// Z-score of every sample against the mean and sample standard deviation of
/// all present samples.
///
/// When the deviation is zero or undefined every score is `None`.
pub fn z_scores(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();

    match (stats::mean(&present), stats::sample_std(&present)) {
        (Some(mean), Some(std)) if std > 0.0 => values
            .iter()
            .map(|v| v.map(|x| (x - mean) / std))
            .collect(),
        _ => vec![None; values.len()],
    }
}

fn check_threshold(name: &str, threshold: f64) -> Result<(), EngineError> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter(format!(
            "{name} threshold must be a non-negative number, got {threshold}"
        )))
    }
}

/// Attach `hr_change` and `rapid_change` columns.
///
/// The returned batch is a timestamp-sorted copy; `rapid_change` is 1 iff the
/// change is defined and strictly above `threshold`. O(n log n).
pub fn detect_rapid_changes(batch: &Batch, threshold: f64) -> Result<Batch, EngineError> {
    check_threshold("rapid-change", threshold)?;
    batch.require_column(HEART_RATE)?;

    let sorted = batch.sorted_by_timestamp();
    let changes = heart_rate_changes(&sorted.numeric_column(HEART_RATE));

    let flags: Vec<Value> = changes
        .iter()
        .map(|c| Value::flag(c.map_or(false, |delta| delta > threshold)))
        .collect();
    let flagged = flags.iter().filter(|f| **f == Value::Integer(1)).count();
    debug!(rows = sorted.len(), flagged, threshold, "detected rapid changes");

    let changes: Vec<Value> = changes.into_iter().map(Value::optional).collect();

    Ok(sorted
        .with_column(HR_CHANGE, changes)
        .with_column(RAPID_CHANGE, flags))
}

/// Attach an `hr_zscore` column holding |z| per row (`Null` where undefined).
///
/// Row order is unchanged. O(n).
pub fn add_zscores(batch: &Batch) -> Result<Batch, EngineError> {
    batch.require_column(HEART_RATE)?;

    let scores: Vec<Value> = z_scores(&batch.numeric_column(HEART_RATE))
        .into_iter()
        .map(|z| Value::optional(z.map(f64::abs)))
        .collect();

    Ok(batch.clone().with_column(HR_ZSCORE, scores))
}

/// Report samples whose |z| exceeds `threshold`, in batch order.
///
/// A batch with zero heart-rate variance reports no anomalies.
pub fn detect_anomalies(batch: &Batch, threshold: f64) -> Result<AnomalyReport, EngineError> {
    check_threshold("anomaly", threshold)?;
    batch.require_column(HEART_RATE)?;

    let heart_rates = batch.numeric_column(HEART_RATE);
    let scores = z_scores(&heart_rates);

    let records: Vec<AnomalyRecord> = heart_rates
        .iter()
        .zip(&scores)
        .enumerate()
        .filter_map(|(index, (hr, z))| match (hr, z) {
            (Some(hr), Some(z)) if z.abs() > threshold => Some(AnomalyRecord {
                index,
                timestamp: batch.get(index, TIMESTAMP).and_then(Value::as_timestamp),
                heart_rate: *hr,
                hr_zscore: z.abs(),
            }),
            _ => None,
        })
        .collect();

    let percentage = if batch.is_empty() {
        0.0
    } else {
        records.len() as f64 / batch.len() as f64 * 100.0
    };

    Ok(AnomalyReport {
        count: records.len(),
        percentage,
        threshold,
        records,
    })
}
