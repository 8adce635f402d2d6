//! What the host shows next to the video.

use bladescan_models::{DetectionTotals, SessionId, SessionMode};
use serde::Serialize;

/// Display collaborators' view of the engine, published on a watch channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub session_id: Option<SessionId>,
    pub mode: Option<SessionMode>,
    pub overlay_enabled: bool,
    /// Live: cumulative total. Precomputed: detections in the frame on screen.
    pub detection_count: usize,
    pub totals: DetectionTotals,
    /// Last playback position the engine was notified of
    pub playback_time: f64,
    /// One-off message for the user, e.g. a load timeout
    pub notice: Option<String>,
}
