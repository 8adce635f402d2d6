//! Player error types.

use bladescan_media::MediaError;
use bladescan_ml_client::InferenceError;
use bladescan_models::TimelineError;
use bladescan_sync::SyncError;
use thiserror::Error;

pub type PlayerResult<T> = Result<T, PlayerError>;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
