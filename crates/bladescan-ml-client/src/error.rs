//! Inference client error types.

use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    /// Network/HTTP layer failed or the service answered with a non-2xx status.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The service answered `success: false`.
    #[error("Service rejected request: {message}")]
    ServiceRejected { message: String },

    /// The response body could not be decoded into detections.
    #[error("Malformed response: {0}")]
    DecodeFailure(String),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::ServiceRejected {
            message: message.into(),
        }
    }

    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::TransportFailure(_) => "transport_failure",
            InferenceError::ServiceRejected { .. } => "service_rejected",
            InferenceError::DecodeFailure(_) => "decode_failure",
            InferenceError::InvalidConfig(_) => "invalid_config",
            InferenceError::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            InferenceError::DecodeFailure(e.to_string())
        } else {
            InferenceError::TransportFailure(e.to_string())
        }
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(e: serde_json::Error) -> Self {
        InferenceError::DecodeFailure(e.to_string())
    }
}
