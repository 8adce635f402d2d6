//! Detection service HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;

use crate::error::{InferenceError, InferenceResult};
use crate::types::{
    BatchAnalysis, BatchResponse, DetectionSet, ErrorDetail, HealthResponse, ImageResponse,
    ModelInfo,
};

/// Multipart field name the service reads uploads from.
const UPLOAD_FIELD: &str = "file";

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Per-frame request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Timeout for whole-video batch analysis
    pub batch_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: None,
            batch_timeout: Duration::from_secs(600), // 10 minutes for frame-by-frame analysis
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("INFERENCE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            request_timeout: std::env::var("INFERENCE_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            batch_timeout: Duration::from_secs(
                std::env::var("INFERENCE_BATCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// Stateless client for the remote detection service.
///
/// Every call performs exactly one HTTP exchange. Retrying is the caller's
/// decision.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: Client,
    base_url: Url,
    config: InferenceConfig,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceConfig) -> InferenceResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| InferenceError::InvalidConfig(format!("{}: {}", config.base_url, e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| InferenceError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> InferenceResult<Self> {
        Self::new(InferenceConfig::from_env())
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> InferenceResult<Url> {
        let raw = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| InferenceError::InvalidConfig(format!("{}: {}", raw, e)))
    }

    /// Check if the detection service is up.
    pub async fn health_check(&self) -> bool {
        let url = match self.endpoint("/") {
            Ok(url) => url,
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                return false;
            }
        };

        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "running" || health.status == "ok",
                    Err(e) => {
                        warn!("Detection service health body unreadable: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                false
            }
        }
    }

    /// Submit one encoded JPEG frame for detection.
    pub async fn submit(&self, image_bytes: Vec<u8>) -> InferenceResult<DetectionSet> {
        let url = self.endpoint("/predict/image")?;
        let size = image_bytes.len();

        let part = Part::bytes(image_bytes)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        debug!(bytes = size, "Submitting frame to {}", url);

        let response = self.http.post(url).multipart(form).send().await?;
        let body: ImageResponse = read_json(response).await?;
        DetectionSet::try_from(body)
    }

    /// Upload a whole video and get per-frame detections back.
    pub async fn analyze_video(&self, video_path: impl AsRef<Path>) -> InferenceResult<BatchAnalysis> {
        let video_path = video_path.as_ref();
        let url = self.endpoint("/predict/video/frames")?;

        let bytes = tokio::fs::read(video_path).await?;
        let file_name = video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        debug!(
            path = %video_path.display(),
            bytes = bytes.len(),
            "Uploading video for frame analysis to {}",
            url
        );

        let part = Part::bytes(bytes).file_name(file_name).mime_str("video/mp4")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .timeout(self.config.batch_timeout)
            .send()
            .await?;
        let body: BatchResponse = read_json(response).await?;
        BatchAnalysis::try_from(body)
    }

    /// Fetch the class names the deployed model knows about.
    pub async fn model_info(&self) -> InferenceResult<ModelInfo> {
        let url = self.endpoint("/model/info")?;
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }
}

/// Turn a non-2xx status into a transport failure, otherwise decode the body.
async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> InferenceResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorDetail>(&body)
            .map(|d| d.detail)
            .unwrap_or(body);
        return Err(InferenceError::TransportFailure(format!(
            "detection service returned {}: {}",
            status, detail
        )));
    }

    Ok(serde_json::from_str(&body)?)
}
