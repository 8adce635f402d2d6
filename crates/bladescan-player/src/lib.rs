//! Headless host for the detection overlay engine.
//!
//! Plays a video file through `bladescan-sync`, writing overlay snapshots and
//! a session report.

pub mod config;
pub mod error;
pub mod logging;
pub mod player;

pub use config::PlayerConfig;
pub use error::{PlayerError, PlayerResult};
pub use logging::SessionLogger;
pub use player::{HeadlessPlayer, PlaybackReport};
