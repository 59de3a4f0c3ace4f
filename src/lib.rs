//! TPP Monitor - processing and analysis engine for periodic-paralysis monitoring data
//!
//! The engine turns batches of heart-rate samples into enriched batches and
//! analysis reports through deterministic stages: validation → time features
//! → rolling statistics → rapid-change and anomaly detection → summarization.
//!
//! ## Modules
//!
//! - **Core**: validation, enrichment stages and summarization over [`Batch`]
//! - **Generator**: seeded synthetic daily and episode batches
//! - **I/O**: CSV/JSON datasets, text/JSON report rendering and (with the
//!   `upload` feature) an ingestion client

pub mod config;
pub mod dataset;
pub mod detector;
pub mod error;
pub mod features;
pub mod generator;
pub mod pipeline;
pub mod render;
pub mod rolling;
pub mod stats;
pub mod summary;
pub mod types;
pub mod validator;

#[cfg(feature = "upload")]
pub mod upload;

pub use config::{EngineConfig, UploadConfig};
pub use dataset::{DataFormat, DatasetAdapter};
pub use detector::{add_zscores, detect_anomalies, detect_rapid_changes, AnomalyReport};
pub use error::EngineError;
pub use features::TimeFeatureDeriver;
pub use generator::{GenerationRequest, GeneratorConfig, PatternKind, SyntheticGenerator};
pub use pipeline::{analyze_batch, enrich_batch, MonitoringProcessor};
pub use render::{ReportEncoder, ReportFormat};
pub use rolling::rolling_stats;
pub use summary::{summarize, AnalysisReport};
pub use types::{Activity, Batch, Record, Row, Value};
pub use validator::{BatchValidation, RecordValidator, ValidationError};

#[cfg(feature = "upload")]
pub use upload::{UploadClient, UploadError};

/// Engine version stamped on rendered reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for rendered reports
pub const PRODUCER_NAME: &str = "tpp-monitor";
