//! Client for the remote turbine damage detection service.
//!
//! This crate is the request/response boundary to the detection model:
//! - `submit`: one encoded frame in, detections out (live sampling)
//! - `analyze_video`: whole video in, per-frame detection timeline out
//! - `model_info` / `health_check`: service introspection
//!
//! The client holds no state between calls and never retries on its own.

pub mod client;
pub mod error;
pub mod types;

pub use client::{InferenceClient, InferenceConfig};
pub use error::{InferenceError, InferenceResult};
pub use types::{BatchAnalysis, DetectionSet, ModelInfo};
