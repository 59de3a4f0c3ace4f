//! Upload client for the ingestion backend
//!
//! Sends monitoring files to a remote `/upload` endpoint as multipart form
//! data and checks server liveness through `/health`.

use crate::config::UploadConfig;
use crate::dataset::{DataFormat, DatasetAdapter, FALLBACK_CONTENT_TYPE};
use crate::error::EngineError;
use crate::types::Batch;
use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upload client error types
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload config error: {0}")]
    Config(String),

    #[error("Cannot connect to server: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid server response: {0}")]
    Response(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Body of a successful health check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Records accepted by the server
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    /// Any other fields the server returned
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Content type for a file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    match DataFormat::from_path(path) {
        Ok(format) => format.content_type(),
        Err(_) => {
            warn!(path = %path.display(), "unknown file type, uploading as binary");
            FALLBACK_CONTENT_TYPE
        }
    }
}

/// Blocking client for the ingestion backend
pub struct UploadClient {
    config: UploadConfig,
    client: Client,
}

impl UploadClient {
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let client = Client::builder()
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// GET `/health`; only a 2xx status counts as healthy
    pub fn health_check(&self) -> Result<HealthStatus, UploadError> {
        let url = self.config.health_url();
        debug!(%url, "checking server health");

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .send()
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(UploadError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        // non-JSON 2xx bodies still count as healthy
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    /// Upload a file from disk as the `file` form field
    pub fn upload_file(&self, path: &Path) -> Result<UploadResponse, UploadError> {
        let bytes = std::fs::read(path).map_err(EngineError::from)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        self.upload_bytes(bytes, &name, content_type_for(path))
    }

    /// Serialize a batch and upload it under `name`
    pub fn upload_batch(
        &self,
        batch: &Batch,
        format: DataFormat,
        name: &str,
    ) -> Result<UploadResponse, UploadError> {
        let payload = DatasetAdapter::to_string(batch, format)?;
        self.upload_bytes(payload.into_bytes(), name, format.content_type())
    }

    fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        name: &str,
        content_type: &str,
    ) -> Result<UploadResponse, UploadError> {
        let url = self.config.upload_url();
        info!(%url, file = name, bytes = bytes.len(), "uploading");

        let part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| UploadError::Config(format!("Invalid content type: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_secs(self.config.upload_timeout_secs))
            .send()
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| UploadError::Response(e.to_string()))?;

        if !status.is_success() {
            return Err(UploadError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| UploadError::Response(e.to_string()))
    }
}
