//! Detection provider seam.

use async_trait::async_trait;
use bladescan_ml_client::{InferenceClient, InferenceResult};
use bladescan_models::Detection;

/// Turns one encoded still into detections.
///
/// Implementations make a single attempt per call; the engine never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect objects in a JPEG image. Boxes are in the image's pixel space.
    async fn detect(&self, image_jpeg: Vec<u8>) -> InferenceResult<Vec<Detection>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl Detector for InferenceClient {
    async fn detect(&self, image_jpeg: Vec<u8>) -> InferenceResult<Vec<Detection>> {
        Ok(self.submit(image_jpeg).await?.detections)
    }

    fn name(&self) -> &'static str {
        "inference_service"
    }
}
