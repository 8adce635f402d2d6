//! Structured session logging utilities.
//!
//! Provides consistent, structured logging for a playback session with
//! tracing spans and contextual information.

use bladescan_models::timestamp::format_position;
use bladescan_models::{SessionId, SessionMode};
use tracing::{info, warn, Span};

/// Session logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    mode: SessionMode,
}

impl SessionLogger {
    pub fn new(session_id: &SessionId, mode: SessionMode) -> Self {
        Self {
            session_id: session_id.to_string(),
            mode,
        }
    }

    /// Log the start of playback.
    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            mode = %self.mode,
            "Playback started: {}", message
        );
    }

    /// Log a progress update during playback.
    pub fn log_progress(&self, playback_time: f64, duration: Option<f64>, detection_count: usize) {
        info!(
            session_id = %self.session_id,
            mode = %self.mode,
            position = %format_position(playback_time, duration),
            count = detection_count,
            "Playback progress"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            mode = %self.mode,
            "Playback warning: {}", message
        );
    }

    /// Log the end of playback.
    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            mode = %self.mode,
            "Playback completed: {}", message
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Create a tracing span for this session.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            mode = %self.mode
        )
    }
}
