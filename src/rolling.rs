//! Rolling statistics
//!
//! This module computes trailing-window mean and standard deviation of heart
//! rate and HRV. The window grows from a single sample up to its full size
//! and never looks ahead.

use crate::error::EngineError;
use crate::stats;
use crate::types::{Batch, Value, HEART_RATE, HRV};
use std::collections::VecDeque;
use tracing::debug;

/// Default rolling window in samples
pub const DEFAULT_ROLLING_WINDOW: usize = 5;

pub const HR_ROLLING_MEAN: &str = "hr_rolling_mean";
pub const HR_ROLLING_STD: &str = "hr_rolling_std";
pub const HRV_ROLLING_MEAN: &str = "hrv_rolling_mean";
pub const HRV_ROLLING_STD: &str = "hrv_rolling_std";

/// Statistics of one window position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Mean of the values present in the window
    pub mean: Option<f64>,
    /// Sample standard deviation; undefined below two values
    pub std: Option<f64>,
}

/// Trailing window over a series that may contain gaps
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Most recent samples, oldest first
    values: VecDeque<Option<f64>>,
    /// Maximum window size
    window_size: usize,
}

impl RollingWindow {
    /// Create a window holding at most `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Push the next sample and return the statistics of the window ending at it
    pub fn push(&mut self, value: Option<f64>) -> WindowStats {
        self.values.push_back(value);
        while self.values.len() > self.window_size {
            self.values.pop_front();
        }

        let present: Vec<f64> = self.values.iter().flatten().copied().collect();
        WindowStats {
            mean: stats::mean(&present),
            std: stats::sample_std(&present),
        }
    }

    /// Number of samples currently in the window
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rolling statistics for every position of a series. O(n * window).
pub fn rolling_series(values: &[Option<f64>], window: usize) -> Vec<WindowStats> {
    let mut rolling = RollingWindow::new(window);
    values.iter().map(|v| rolling.push(*v)).collect()
}

/// Attach rolling mean/std columns for heart rate and HRV.
///
/// The returned batch is a timestamp-sorted copy of the input; the input
/// keeps its order.
pub fn rolling_stats(batch: &Batch, window: usize) -> Result<Batch, EngineError> {
    if window == 0 {
        return Err(EngineError::InvalidParameter(
            "rolling window must be at least 1".to_string(),
        ));
    }
    batch.require_column(HEART_RATE)?;
    batch.require_column(HRV)?;

    let sorted = batch.sorted_by_timestamp();
    let hr = rolling_series(&sorted.numeric_column(HEART_RATE), window);
    let hrv = rolling_series(&sorted.numeric_column(HRV), window);

    debug!(rows = sorted.len(), window, "computed rolling statistics");

    let means = |s: &[WindowStats]| -> Vec<Value> {
        s.iter().map(|w| Value::optional(w.mean)).collect()
    };
    let stds = |s: &[WindowStats]| -> Vec<Value> {
        s.iter().map(|w| Value::optional(w.std)).collect()
    };

    Ok(sorted
        .with_column(HR_ROLLING_MEAN, means(&hr))
        .with_column(HR_ROLLING_STD, stds(&hr))
        .with_column(HRV_ROLLING_MEAN, means(&hrv))
        .with_column(HRV_ROLLING_STD, stds(&hrv)))
}
