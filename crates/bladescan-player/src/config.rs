//! Player configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bladescan_models::timestamp::parse_timestamp;
use bladescan_models::SessionMode;

/// Headless player configuration.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Live sampling or precomputed timeline
    pub mode: SessionMode,
    /// Wall-clock time between playback ticks
    pub tick: Duration,
    /// Playback seconds advanced per second of wall-clock time
    pub playback_rate: f64,
    /// Position playback starts from, in seconds
    pub start_at: f64,
    /// Where overlay snapshots and the session report are written
    pub output_dir: PathBuf,
    /// TTF/OTF font for label text; tags are drawn without text when unset
    pub font_path: Option<PathBuf>,
    /// Label text size in pixels
    pub font_size: f32,
    /// Display surface size the overlay is drawn at
    pub surface_width: u32,
    pub surface_height: u32,
    /// Playback seconds between overlay snapshots (disabled when zero)
    pub snapshot_interval_secs: f64,
    /// Bound on a single ffmpeg frame decode
    pub decode_timeout: Duration,
    /// How long to wait for an outstanding live sample at end of playback
    pub drain_timeout: Duration,
    /// Prometheus exporter listen address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Live,
            tick: Duration::from_millis(100),
            playback_rate: 1.0,
            start_at: 0.0,
            output_dir: PathBuf::from("./bladescan-out"),
            font_path: None,
            font_size: 14.0,
            surface_width: 1280,
            surface_height: 720,
            snapshot_interval_secs: 5.0,
            decode_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
            metrics_addr: None,
        }
    }
}

impl PlayerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mode: std::env::var("PLAYER_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.mode),
            tick: Duration::from_millis(
                std::env::var("PLAYER_TICK_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(100),
            ),
            playback_rate: std::env::var("PLAYER_PLAYBACK_RATE")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|r| r.is_finite() && *r > 0.0)
                .unwrap_or(defaults.playback_rate),
            start_at: std::env::var("PLAYER_START_AT")
                .ok()
                .and_then(|s| parse_timestamp(&s).ok())
                .unwrap_or(defaults.start_at),
            output_dir: std::env::var("PLAYER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            font_path: std::env::var("PLAYER_FONT_PATH").ok().map(PathBuf::from),
            font_size: std::env::var("PLAYER_FONT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.font_size),
            surface_width: std::env::var("PLAYER_SURFACE_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|w| *w > 0)
                .unwrap_or(defaults.surface_width),
            surface_height: std::env::var("PLAYER_SURFACE_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(defaults.surface_height),
            snapshot_interval_secs: std::env::var("PLAYER_SNAPSHOT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.snapshot_interval_secs),
            decode_timeout: Duration::from_secs(
                std::env::var("PLAYER_DECODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            drain_timeout: Duration::from_secs(
                std::env::var("PLAYER_DRAIN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Playback seconds covered by one tick.
    pub fn tick_playback_secs(&self) -> f64 {
        self.tick.as_secs_f64() * self.playback_rate
    }
}
