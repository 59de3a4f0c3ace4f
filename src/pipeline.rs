//! Pipeline orchestration
//!
//! This module provides the public API of the engine. It wires the stages
//! together on top of an [`EngineConfig`].
//!
//! Enrichment stages:
//! 1. TimeFeatureDeriver - hour, day of week, night and weekend flags
//! 2. Rolling statistics - trailing-window heart rate and HRV
//! 3. Rapid change - consecutive heart-rate jumps
//! 4. Z-score - |z| of heart rate against the whole batch

use crate::config::EngineConfig;
use crate::detector::{add_zscores, detect_rapid_changes};
use crate::error::EngineError;
use crate::features::TimeFeatureDeriver;
use crate::generator::{GenerationRequest, SyntheticGenerator};
use crate::rolling::rolling_stats;
use crate::summary::{summarize_with, AnalysisReport};
use crate::types::Batch;
use crate::validator::{BatchValidation, RecordValidator};
use tracing::{debug, info};

/// Run every enrichment stage with default settings.
///
/// # Example
/// ```ignore
/// let batch = DatasetAdapter::load(Path::new("monitoring.csv"))?;
/// let enriched = enrich_batch(&batch)?;
/// ```
pub fn enrich_batch(batch: &Batch) -> Result<Batch, EngineError> {
    MonitoringProcessor::default().enrich(batch)
}

/// Summarize a batch with default settings
pub fn analyze_batch(batch: &Batch) -> AnalysisReport {
    MonitoringProcessor::default().analyze(batch)
}

/// Processor holding the engine configuration
#[derive(Debug, Clone, Default)]
pub struct MonitoringProcessor {
    config: EngineConfig,
}

impl MonitoringProcessor {
    /// Create a processor, rejecting invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate every row of a batch
    pub fn validate(&self, batch: &Batch) -> BatchValidation {
        RecordValidator::validate_batch(batch)
    }

    /// Apply all enrichment stages, each on the previous stage's output.
    ///
    /// The result is sorted by timestamp (the rolling stage sorts) and the
    /// input batch is left untouched.
    pub fn enrich(&self, batch: &Batch) -> Result<Batch, EngineError> {
        // Stage 1: calendar features
        let enriched = TimeFeatureDeriver::add_time_features(batch)?;

        // Stage 2: trailing-window statistics
        let enriched = rolling_stats(&enriched, self.config.rolling_window)?;

        // Stage 3: consecutive jumps
        let enriched = detect_rapid_changes(&enriched, self.config.rapid_change_threshold)?;

        // Stage 4: batch-wide z-scores
        let enriched = add_zscores(&enriched)?;

        debug!(
            rows = enriched.len(),
            columns = enriched.columns().len(),
            "enriched batch"
        );
        Ok(enriched)
    }

    /// Summarize with the configured anomaly threshold
    pub fn analyze(&self, batch: &Batch) -> AnalysisReport {
        info!(records = batch.len(), "analyzing batch");
        summarize_with(batch, self.config.anomaly_threshold)
    }

    /// Generate a synthetic batch with the configured generator settings
    pub fn generate(&self, request: GenerationRequest) -> Batch {
        let generator = SyntheticGenerator::new(self.config.generator);
        Batch::from_records(&generator.generate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{HR_ZSCORE, RAPID_CHANGE};
    use crate::features::HOUR;
    use crate::rolling::HR_ROLLING_MEAN;
    use crate::types::{parse_timestamp, Value, HEART_RATE};

    fn daily() -> Batch {
        MonitoringProcessor::default().generate(GenerationRequest::Daily {
            start: parse_timestamp("2024-01-15T00:00:00").unwrap(),
            num_records: 48,
        })
    }

    #[test]
    fn test_generated_batch_is_valid() {
        let batch = daily();
        assert_eq!(batch.len(), 48);

        let validation = MonitoringProcessor::default().validate(&batch);
        assert!(validation.is_valid(), "{:?}", validation.errors());
    }

    #[test]
    fn test_enrich_attaches_all_columns() {
        let batch = daily();
        let enriched = enrich_batch(&batch).unwrap();

        for column in [HOUR, HR_ROLLING_MEAN, RAPID_CHANGE, HR_ZSCORE] {
            assert!(enriched.has_column(column), "missing {column}");
        }
        assert_eq!(enriched.len(), batch.len());
        assert!(!batch.has_column(HOUR));
    }

    #[test]
    fn test_enrich_respects_config() {
        let config = EngineConfig {
            rapid_change_threshold: 0.0,
            ..EngineConfig::default()
        };
        let processor = MonitoringProcessor::new(config).unwrap();
        let enriched = processor.enrich(&daily()).unwrap();

        // first sample never flags
        assert_eq!(enriched.get(0, RAPID_CHANGE), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            rolling_window: 0,
            ..EngineConfig::default()
        };
        assert!(MonitoringProcessor::new(config).is_err());
    }

    #[test]
    fn test_analyze() {
        let report = analyze_batch(&daily());
        assert_eq!(report.summary.total_records, 48);
        assert!(report.statistics.get(HEART_RATE).is_some());
        assert!(report.anomalies.is_some());
        assert!(report.activity_breakdown.is_some());
    }
}
