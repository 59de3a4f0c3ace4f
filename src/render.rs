//! Report rendering
//!
//! Turns an [`AnalysisReport`] into either a JSON document wrapped in a
//! provenance envelope or a multi-section plain-text report. Every optional
//! report block may be absent and is then skipped.

use crate::error::EngineError;
use crate::summary::AnalysisReport;
use crate::types::format_timestamp;
use crate::{PRODUCER_NAME, VERSION};
use chrono::{Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RULE_WIDTH: usize = 60;

/// Output format of a rendered report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Producer metadata stamped on JSON reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProducer {
    pub name: &'static str,
    pub version: &'static str,
    pub instance_id: String,
}

/// JSON document wrapping a report
#[derive(Debug, Clone, Serialize)]
pub struct ReportEnvelope<'a> {
    pub producer: ReportProducer,
    /// RFC 3339, UTC
    pub generated_at: String,
    pub report: &'a AnalysisReport,
}

/// Renderer for analysis reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create an encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn envelope<'a>(&self, report: &'a AnalysisReport) -> ReportEnvelope<'a> {
        ReportEnvelope {
            producer: ReportProducer {
                name: PRODUCER_NAME,
                version: VERSION,
                instance_id: self.instance_id.clone(),
            },
            generated_at: Utc::now().to_rfc3339(),
            report,
        }
    }

    pub fn to_json(&self, report: &AnalysisReport) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.envelope(report))?)
    }

    pub fn to_text(&self, report: &AnalysisReport) -> String {
        render_text(report, Local::now().naive_local())
    }

    pub fn render(&self, report: &AnalysisReport, format: ReportFormat) -> Result<String, EngineError> {
        match format {
            ReportFormat::Text => Ok(self.to_text(report)),
            ReportFormat::Json => self.to_json(report),
        }
    }
}

fn fixed(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push(title.to_string());
    lines.push("-".repeat(RULE_WIDTH));
}

/// Render the plain-text report
pub fn render_text(report: &AnalysisReport, generated_at: NaiveDateTime) -> String {
    let mut lines = vec![
        "=".repeat(RULE_WIDTH),
        "TPP DATA ANALYSIS REPORT".to_string(),
        "=".repeat(RULE_WIDTH),
        format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];

    let summary = &report.summary;
    section(&mut lines, "SUMMARY");
    lines.push(format!("Total Records: {}", summary.total_records));
    lines.push(format!("Columns: {}", summary.columns.join(", ")));
    if let Some(range) = &summary.date_range {
        lines.push(format!(
            "Date Range: {} to {}",
            format_timestamp(&range.start),
            format_timestamp(&range.end)
        ));
        lines.push(format!("Duration: {:.1} hours", range.duration_hours));
    }
    lines.push(String::new());

    if !report.statistics.is_empty() {
        section(&mut lines, "STATISTICS");
        for (column, stats) in report.statistics.iter() {
            lines.push(format!("{column}:"));
            if stats.count == 0 {
                lines.push("  No data".to_string());
            } else {
                lines.push(format!("  Mean: {}", fixed(stats.mean, 2)));
                lines.push(format!("  Median: {}", fixed(stats.median, 2)));
                lines.push(format!("  Std Dev: {}", fixed(stats.std, 2)));
                lines.push(format!(
                    "  Range: {} - {}",
                    fixed(stats.min, 2),
                    fixed(stats.max, 2)
                ));
                lines.push(format!(
                    "  IQR: {} - {}",
                    fixed(stats.q25, 2),
                    fixed(stats.q75, 2)
                ));
            }
            lines.push(String::new());
        }
    }

    if let Some(anomalies) = &report.anomalies {
        section(&mut lines, "ANOMALY DETECTION");
        lines.push(format!(
            "Detected: {} anomalies ({:.1}%)",
            anomalies.count, anomalies.percentage
        ));
        lines.push(format!("Threshold: Z-score > {}", anomalies.threshold));
        for record in &anomalies.records {
            let when = record
                .timestamp
                .as_ref()
                .map_or_else(|| format!("row {}", record.index), format_timestamp);
            lines.push(format!(
                "  {when}: {} bpm (z = {:.2})",
                record.heart_rate, record.hr_zscore
            ));
        }
        lines.push(String::new());
    }

    if let Some(breakdown) = &report.activity_breakdown {
        section(&mut lines, "ACTIVITY BREAKDOWN");
        for (activity, share) in breakdown.iter() {
            lines.push(format!(
                "{activity}: {} records ({:.1}%)",
                share.count, share.percentage
            ));
        }
        lines.push(String::new());
    }

    if let Some(activity_stats) = &report.activity_stats {
        section(&mut lines, "ACTIVITY-SPECIFIC HEART RATE");
        for (activity, stats) in activity_stats.iter() {
            lines.push(format!("{activity}:"));
            lines.push(format!("  Mean: {} bpm", fixed(stats.mean_hr, 1)));
            lines.push(format!("  Std: {} bpm", fixed(stats.std_hr, 1)));
            lines.push(format!(
                "  Range: {} - {} bpm",
                fixed(stats.min_hr, 1),
                fixed(stats.max_hr, 1)
            ));
        }
        lines.push(String::new());
    }

    lines.push("=".repeat(RULE_WIDTH));
    lines.join("\n")
}
