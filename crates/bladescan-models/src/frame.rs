//! Per-frame detection results and the precomputed frame timeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::Detection;

/// Detections for one instant of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameResult {
    /// Playback time in seconds (precomputed) or capture time (live)
    pub timestamp: f64,
    /// Detections in the order the service returned them
    pub detections: Vec<Detection>,
    /// Source frame index, present for batch-analyzed frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<u64>,
    /// Native `(width, height)` of the captured frame, present for live samples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_size: Option<(u32, u32)>,
}

impl FrameResult {
    pub fn new(timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            timestamp,
            detections,
            frame_number: None,
            source_size: None,
        }
    }

    pub fn with_frame_number(mut self, frame_number: u64) -> Self {
        self.frame_number = Some(frame_number);
        self
    }

    pub fn with_source_size(mut self, width: u32, height: u32) -> Self {
        self.source_size = Some((width, height));
        self
    }

    /// Number of detections in this frame.
    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("Frame timeline is empty")]
    Empty,

    #[error("Frame timestamp is not a finite number: {0}")]
    InvalidTimestamp(f64),
}

/// Fully analyzed, time-sorted detection timeline for one video.
///
/// Never empty and never mutated after construction; a new video gets a new
/// timeline.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FrameTimeline {
    frames: Vec<FrameResult>,
    /// Video duration in seconds
    duration: f64,
    /// Native frame rate of the analyzed video
    fps: f64,
}

impl FrameTimeline {
    /// Build a timeline from batch results.
    ///
    /// Frames are stably sorted by timestamp so equal timestamps keep their
    /// original relative order.
    pub fn new(mut frames: Vec<FrameResult>, duration: f64, fps: f64) -> Result<Self, TimelineError> {
        if frames.is_empty() {
            return Err(TimelineError::Empty);
        }
        if let Some(bad) = frames.iter().find(|f| !f.timestamp.is_finite()) {
            return Err(TimelineError::InvalidTimestamp(bad.timestamp));
        }

        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Ok(Self {
            frames,
            duration,
            fps,
        })
    }

    pub fn frames(&self) -> &[FrameResult] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frame whose timestamp is closest to `time`.
    ///
    /// Ties go to the earliest entry in timeline order, which is what a
    /// linear scan with a strict `<` comparison yields.
    pub fn nearest(&self, time: f64) -> &FrameResult {
        let frames = &self.frames;

        // First entry at or after `time`; also the first of its equal-timestamp run.
        let upper = frames.partition_point(|f| f.timestamp < time);
        if upper == 0 {
            return &frames[0];
        }

        // First entry of the run holding the last timestamp before `time`.
        let before = frames[upper - 1].timestamp;
        let lower = frames.partition_point(|f| f.timestamp < before);

        if upper == frames.len() {
            return &frames[lower];
        }

        let d_lower = (time - frames[lower].timestamp).abs();
        let d_upper = (frames[upper].timestamp - time).abs();
        if d_lower <= d_upper {
            &frames[lower]
        } else {
            &frames[upper]
        }
    }
}
