//! Integration tests for the monitoring engine

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tpp_monitor::detector::{HR_CHANGE, HR_ZSCORE, RAPID_CHANGE};
use tpp_monitor::features::{DAY_OF_WEEK, HOUR, IS_NIGHT, IS_WEEKEND};
use tpp_monitor::rolling::{HRV_ROLLING_MEAN, HRV_ROLLING_STD, HR_ROLLING_MEAN, HR_ROLLING_STD};
use tpp_monitor::types::{parse_timestamp, HEART_RATE, REQUIRED_FIELDS, TIMESTAMP};
use tpp_monitor::validator::ErrorKind;
use tpp_monitor::{
    detect_rapid_changes, rolling_stats, summarize, Batch, DataFormat, DatasetAdapter,
    GenerationRequest, MonitoringProcessor, RecordValidator, ReportEncoder, ReportFormat, Row,
    TimeFeatureDeriver, Value,
};

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tpp-engine-test-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn valid_row() -> Row {
    let mut row = Row::new();
    row.insert("timestamp".to_string(), Value::Text("2024-01-15T08:00:00".to_string()));
    row.insert("heartRate".to_string(), Value::Integer(72));
    row.insert("hrv".to_string(), Value::Integer(55));
    row.insert("activity".to_string(), Value::Text("resting".to_string()));
    row
}

fn daily_batch() -> Batch {
    MonitoringProcessor::default().generate(GenerationRequest::Daily {
        start: parse_timestamp("2024-01-15T00:00:00").unwrap(),
        num_records: 48,
    })
}

#[test]
fn test_each_missing_field_is_named() {
    assert!(RecordValidator::validate_record(&valid_row()).is_ok());

    for field in REQUIRED_FIELDS {
        let mut row = valid_row();
        row.remove(field);
        let err = RecordValidator::validate_record(&row).unwrap_err();
        assert_eq!(err.to_string(), format!("Missing required field: {field}"));
    }
}

#[test]
fn test_heart_rate_boundaries() {
    for (hr, ok) in [(29, false), (30, true), (220, true), (221, false)] {
        let mut row = valid_row();
        row.insert(HEART_RATE.to_string(), Value::Integer(hr));
        assert_eq!(RecordValidator::validate_record(&row).is_ok(), ok, "hr {hr}");
    }
}

#[test]
fn test_batch_validation_reports_every_bad_row() {
    let mut bad_activity = valid_row();
    bad_activity.insert("activity".to_string(), Value::Text("Running".to_string()));
    let mut bad_hr = valid_row();
    bad_hr.insert(HEART_RATE.to_string(), Value::Integer(300));

    let batch = Batch::from_rows(vec![valid_row(), bad_activity, valid_row(), bad_hr]);
    let validation = RecordValidator::validate_batch(&batch);

    assert!(!validation.is_valid());
    let indices: Vec<Option<usize>> = validation.issues.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![Some(1), Some(3)]);
    assert_eq!(validation.issues[0].kind, ErrorKind::MalformedInput);
    assert_eq!(validation.issues[1].kind, ErrorKind::OutOfRange);
}

#[test]
fn test_missing_column_short_circuits() {
    let rows: Vec<Row> = (0..5)
        .map(|_| {
            let mut row = valid_row();
            row.remove("hrv");
            row
        })
        .collect();
    let validation = RecordValidator::validate_batch(&Batch::from_rows(rows));

    assert!(validation.is_schema_failure());
    assert_eq!(validation.issues.len(), 1);
    assert_eq!(validation.issues[0].index, None);
}

#[test]
fn test_independent_enrichments_do_not_leak() {
    let base = daily_batch();

    let with_time = TimeFeatureDeriver::add_time_features(&base).unwrap();
    let with_rolling = rolling_stats(&base, 5).unwrap();
    let with_changes = detect_rapid_changes(&base, 20.0).unwrap();

    assert!(with_time.has_column(HOUR) && !with_time.has_column(HR_ROLLING_MEAN));
    assert!(with_rolling.has_column(HR_ROLLING_MEAN) && !with_rolling.has_column(HOUR));
    assert!(with_changes.has_column(HR_CHANGE) && !with_changes.has_column(HR_ROLLING_MEAN));
    assert_eq!(base, daily_batch());
}

#[test]
fn test_full_enrichment_columns() {
    let enriched = MonitoringProcessor::default().enrich(&daily_batch()).unwrap();

    for column in [
        HOUR,
        DAY_OF_WEEK,
        IS_NIGHT,
        IS_WEEKEND,
        HR_ROLLING_MEAN,
        HR_ROLLING_STD,
        HRV_ROLLING_MEAN,
        HRV_ROLLING_STD,
        HR_CHANGE,
        RAPID_CHANGE,
        HR_ZSCORE,
    ] {
        assert!(enriched.has_column(column), "missing {column}");
    }

    // index 0: mean is the value itself, std undefined
    let first_hr = enriched.get(0, HEART_RATE).and_then(Value::as_f64);
    assert_eq!(enriched.get(0, HR_ROLLING_MEAN).and_then(Value::as_f64), first_hr);
    assert_eq!(enriched.get(0, HR_ROLLING_STD), Some(&Value::Null));
    assert_eq!(enriched.get(0, HR_CHANGE), Some(&Value::Null));
}

#[test]
fn test_generate_save_load_analyze() {
    let dir = test_dir("roundtrip");
    let batch = daily_batch();

    for name in ["data.json", "data.csv"] {
        let path = dir.join(name);
        DatasetAdapter::save(&batch, &path).unwrap();
        let loaded = DatasetAdapter::load(&path).unwrap();

        assert_eq!(loaded.len(), 48);
        assert_eq!(loaded.get(0, TIMESTAMP), batch.get(0, TIMESTAMP));
        assert!(RecordValidator::validate_batch(&loaded).is_valid());

        let report = summarize(&loaded);
        assert_eq!(report.summary.total_records, 48);
        let range = report.summary.date_range.as_ref().unwrap();
        assert_eq!(range.duration_hours, 23.5);

        let breakdown = report.activity_breakdown.as_ref().unwrap();
        let total: f64 = breakdown.iter().map(|(_, share)| share.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
        // the batch starts asleep at midnight
        assert_eq!(breakdown.keys().next(), Some("sleeping"));
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_episode_batch_is_valid() {
    let batch = MonitoringProcessor::default().generate(GenerationRequest::Episode {
        start: parse_timestamp("2024-01-15T14:00:00").unwrap(),
        duration_minutes: 120,
    });

    assert_eq!(batch.len(), 24);
    assert!(RecordValidator::validate_batch(&batch).is_valid());
}

#[test]
fn test_reports_render_in_both_formats() {
    let report = MonitoringProcessor::default().analyze(&daily_batch());
    let encoder = ReportEncoder::new();

    let text = encoder.render(&report, ReportFormat::Text).unwrap();
    assert!(text.contains("TPP DATA ANALYSIS REPORT"));
    assert!(text.contains("ACTIVITY-SPECIFIC HEART RATE"));

    let json = encoder.render(&report, ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["report"]["summary"]["total_records"], 48);
    assert_eq!(value["report"]["anomalies"]["threshold"], 2.0);
}

#[test]
fn test_unsupported_extension() {
    let dir = test_dir("unsupported");
    let path = dir.join("data.txt");
    std::fs::write(&path, "timestamp,heartRate\n").unwrap();

    assert!(DatasetAdapter::load(&path).is_err());
    assert!(DataFormat::from_path(&path).is_err());

    std::fs::remove_dir_all(&dir).ok();
}
