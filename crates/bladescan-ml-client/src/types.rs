//! Detection service request/response types.
//!
//! Wire types mirror the service's JSON exactly and are converted into
//! `bladescan_models` values after validation.

use std::collections::BTreeMap;

use bladescan_models::{BoundingBox, Detection, FrameResult, FrameTimeline, TimelineError};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, InferenceResult};

/// Detection as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDetection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub bbox: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
}

impl WireDetection {
    /// Validate and convert into a model detection.
    pub fn into_detection(self) -> InferenceResult<Detection> {
        let [x1, y1, x2, y2]: [f64; 4] = self.bbox.as_slice().try_into().map_err(|_| {
            InferenceError::DecodeFailure(format!(
                "bbox must have 4 coordinates, got {}",
                self.bbox.len()
            ))
        })?;

        let bbox = BoundingBox::new(x1, y1, x2, y2);
        if !bbox.is_finite() {
            return Err(InferenceError::DecodeFailure(
                "bbox contains a non-finite coordinate".to_string(),
            ));
        }
        if !self.confidence.is_finite() {
            return Err(InferenceError::DecodeFailure(
                "confidence is not a finite number".to_string(),
            ));
        }

        let detection = Detection::new(self.class_name, self.confidence, bbox);
        Ok(match self.class_id {
            Some(id) => detection.with_class_id(id),
            None => detection,
        })
    }
}

/// `success: false` body; FastAPI handlers report the reason in `detail`.
fn rejection(message: Option<String>, detail: Option<String>) -> InferenceError {
    InferenceError::rejected(
        message
            .or(detail)
            .unwrap_or_else(|| "no message".to_string()),
    )
}

fn decode_detections(raw: Vec<WireDetection>) -> InferenceResult<Vec<Detection>> {
    raw.into_iter().map(WireDetection::into_detection).collect()
}

/// Response envelope of `POST /predict/image`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ImageResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub detections: Option<Vec<WireDetection>>,
    #[serde(default)]
    pub total_detections: Option<usize>,
}

/// Detections for one submitted image.
///
/// Boxes are in the pixel space of the submitted image.
#[derive(Debug, Clone, Default)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    /// Count reported by the service, if any
    pub total_detections: Option<usize>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl TryFrom<ImageResponse> for DetectionSet {
    type Error = InferenceError;

    fn try_from(resp: ImageResponse) -> InferenceResult<Self> {
        if !resp.success {
            return Err(rejection(resp.message, resp.detail));
        }

        let detections = resp.detections.ok_or_else(|| {
            InferenceError::DecodeFailure("missing `detections` field".to_string())
        })?;

        Ok(DetectionSet {
            detections: decode_detections(detections)?,
            total_detections: resp.total_detections,
        })
    }
}

/// One analyzed frame of a batch response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub frame_number: Option<u64>,
    #[serde(default)]
    pub detections: Vec<WireDetection>,
}

/// Response envelope of `POST /predict/video/frames`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub frame_interval: Option<u64>,
    #[serde(default)]
    pub frames: Option<Vec<WireFrame>>,
}

/// Whole-video analysis, ready to become a frame timeline.
#[derive(Debug, Clone)]
pub struct BatchAnalysis {
    pub duration: f64,
    pub fps: f64,
    pub total_frames: Option<u64>,
    /// Source frames between analyzed frames
    pub frame_interval: Option<u64>,
    pub frames: Vec<FrameResult>,
    pub message: Option<String>,
}

impl BatchAnalysis {
    /// Convert into a timeline; fails when the service analyzed no frames.
    pub fn into_timeline(self) -> Result<FrameTimeline, TimelineError> {
        FrameTimeline::new(self.frames, self.duration, self.fps)
    }
}

impl TryFrom<BatchResponse> for BatchAnalysis {
    type Error = InferenceError;

    fn try_from(resp: BatchResponse) -> InferenceResult<Self> {
        if !resp.success {
            return Err(rejection(resp.message, resp.detail));
        }

        let missing = |field: &str| InferenceError::DecodeFailure(format!("missing `{}` field", field));
        let duration = resp.duration.ok_or_else(|| missing("duration"))?;
        let fps = resp.fps.ok_or_else(|| missing("fps"))?;
        let raw_frames = resp.frames.ok_or_else(|| missing("frames"))?;

        let mut frames = Vec::with_capacity(raw_frames.len());
        for raw in raw_frames {
            let frame = FrameResult::new(raw.timestamp, decode_detections(raw.detections)?);
            frames.push(match raw.frame_number {
                Some(n) => frame.with_frame_number(n),
                None => frame,
            });
        }

        Ok(BatchAnalysis {
            duration,
            fps,
            total_frames: resp.total_frames,
            frame_interval: resp.frame_interval,
            frames,
            message: resp.message,
        })
    }
}

/// Error body FastAPI produces for unhandled failures.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: String,
}

/// Response of `GET /model/info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    /// Class names keyed by numeric class id
    pub classes: BTreeMap<String, String>,
    pub num_classes: usize,
}

impl ModelInfo {
    /// Class name for a numeric id.
    pub fn class_name(&self, class_id: u32) -> Option<&str> {
        self.classes.get(&class_id.to_string()).map(String::as_str)
    }
}

/// Response of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
