//! Error types for the sync engine.

use std::time::Duration;

use bladescan_media::MediaError;
use bladescan_ml_client::InferenceError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Session lifecycle errors surfaced to the host.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Media did not report its metadata within {0:?}")]
    MediaLoadTimeout(Duration),

    #[error("Media failed to load: {0}")]
    MediaLoadFailed(String),

    #[error("Precomputed timeline has no frames")]
    EmptyTimeline,

    #[error("No video session is loaded")]
    NoSession,
}

/// Why one live sample cycle produced nothing.
///
/// Logged and counted, never surfaced to the host.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Frame capture failed: {0}")]
    Capture(#[from] MediaError),

    #[error("Detection request failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Sample cycle abandoned after {0:?}")]
    Timeout(Duration),
}

impl SampleError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SampleError::Capture(MediaError::CaptureUnavailable) => "capture_unavailable",
            SampleError::Capture(_) => "capture_failed",
            SampleError::Inference(e) => e.kind(),
            SampleError::Timeout(_) => "timeout",
        }
    }
}
