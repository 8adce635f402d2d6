//! Engine metrics recorded through the `metrics` facade.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const SAMPLES_TOTAL: &str = "bladescan_samples_total";
    pub const NOTIFICATIONS_DROPPED_TOTAL: &str = "bladescan_notifications_dropped_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "bladescan_inference_duration_seconds";
    pub const OVERLAY_RENDERS_TOTAL: &str = "bladescan_overlay_renders_total";
}

/// Record the end of a live sample cycle (`success`, `discarded` or an error kind).
pub fn record_sample(outcome: &'static str) {
    counter!(names::SAMPLES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a position notification that did not start a sample.
pub fn record_dropped(reason: &'static str) {
    counter!(names::NOTIFICATIONS_DROPPED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_inference_duration(duration_secs: f64) {
    histogram!(names::INFERENCE_DURATION_SECONDS).record(duration_secs);
}

pub fn record_render(mode: &'static str) {
    counter!(names::OVERLAY_RENDERS_TOTAL, "mode" => mode).increment(1);
}
