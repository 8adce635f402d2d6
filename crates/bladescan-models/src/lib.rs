//! Shared data models for the bladescan detection overlay engine.
//!
//! This crate provides Serde-serializable types for:
//! - Detections and their bounding boxes
//! - Per-frame results and the precomputed frame timeline
//! - Detection tallies
//! - Video session identity and media metadata

pub mod detection;
pub mod frame;
pub mod stats;
pub mod timestamp;
pub mod video;

// Re-export common types
pub use detection::{BoundingBox, Detection, DetectionClass};
pub use frame::{FrameResult, FrameTimeline, TimelineError};
pub use stats::DetectionTotals;
pub use video::{MediaMetadata, SessionId, SessionInfo, SessionMode};
