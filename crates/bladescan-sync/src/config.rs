//! Engine configuration.

use std::time::Duration;

/// Minimum playback-time gap between two live samples, in seconds.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 0.5;

/// How long `attach` waits for the media to report its metadata.
pub const DEFAULT_MEDIA_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Live-mode throttle, measured in playback seconds
    pub sample_interval_secs: f64,
    /// Bound on waiting for media metadata
    pub media_ready_timeout: Duration,
    /// Abandon a live sample cycle after this long (unbounded when `None`)
    pub sample_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            media_ready_timeout: DEFAULT_MEDIA_READY_TIMEOUT,
            sample_timeout: None,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            sample_interval_secs: std::env::var("SYNC_SAMPLE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL_SECS),
            media_ready_timeout: std::env::var("SYNC_MEDIA_READY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MEDIA_READY_TIMEOUT),
            sample_timeout: std::env::var("SYNC_SAMPLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        }
    }

    pub fn with_sample_timeout(mut self, timeout: Duration) -> Self {
        self.sample_timeout = Some(timeout);
        self
    }
}
