//! Synchronizes detection overlays with video playback.
//!
//! This crate provides:
//! - `SyncEngine`: reacts to playback-position notifications in live or precomputed mode
//! - `StatsAggregator`: running and whole-timeline detection totals
//! - `Detector`: the seam to the detection service
//! - `DisplayState`: what the host shows alongside the video

pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod providers;
mod session;
pub mod stats;

pub use config::SyncConfig;
pub use display::DisplayState;
pub use engine::{
    CycleOutcome, EngineState, MediaEvent, SessionLoad, SharedSurface, SkipReason, SyncEngine,
    SyncOutcome,
};
pub use error::{SampleError, SyncError, SyncResult};
pub use providers::Detector;
pub use stats::StatsAggregator;
