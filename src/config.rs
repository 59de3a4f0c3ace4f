//! Engine configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes. CLI flags are applied on top by the caller.

use crate::detector::{DEFAULT_ANOMALY_THRESHOLD, DEFAULT_RAPID_CHANGE_THRESHOLD};
use crate::error::EngineError;
use crate::generator::GeneratorConfig;
use crate::rolling::DEFAULT_ROLLING_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_UPLOAD_URL: &str = "http://localhost:3000";

/// Tunables for enrichment, analysis and generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rolling statistics window (samples)
    pub rolling_window: usize,
    /// Heart-rate jump that counts as rapid (bpm)
    pub rapid_change_threshold: f64,
    /// |z| above which a sample is anomalous
    pub anomaly_threshold: f64,
    pub generator: GeneratorConfig,
    pub upload: UploadConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rolling_window: DEFAULT_ROLLING_WINDOW,
            rapid_change_threshold: DEFAULT_RAPID_CHANGE_THRESHOLD,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            generator: GeneratorConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.rolling_window == 0 {
            return Err(EngineError::InvalidParameter(
                "rolling_window must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("rapid_change_threshold", self.rapid_change_threshold),
            ("anomaly_threshold", self.anomaly_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidParameter(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        self.generator.validate()?;
        self.upload.validate()
    }
}

/// Ingestion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Server base URL, without trailing path
    pub base_url: String,
    pub upload_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPLOAD_URL.to_string(),
            upload_timeout_secs: 30,
            health_timeout_secs: 5,
        }
    }
}

impl UploadConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.url())
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(EngineError::InvalidParameter(format!(
                "upload base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}
