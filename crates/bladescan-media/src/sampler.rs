//! Frame sampling: capture the current instant of a playing video as a JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::source::MediaSource;

/// JPEG quality used for live sampling (0.8 on a 0-1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Configuration for frame sampling.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl SamplerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            jpeg_quality: std::env::var("SAMPLER_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse::<u8>().ok())
                .map(|q| q.clamp(1, 100))
                .unwrap_or(DEFAULT_JPEG_QUALITY),
        }
    }
}

/// A compressed still of one instant.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    /// Pixel width of the encoded image
    pub width: u32,
    /// Pixel height of the encoded image
    pub height: u32,
    /// Playback position when the frame was captured
    pub timestamp: f64,
}

/// Captures stills from a media source.
#[derive(Debug, Clone, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Capture and encode the source's current instant.
    ///
    /// Fails with `CaptureUnavailable` while the source reports zero
    /// dimensions; callers should skip this sample rather than retry.
    pub async fn sample(&self, media: &dyn MediaSource) -> MediaResult<EncodedFrame> {
        let (width, height) = media.dimensions();
        if width == 0 || height == 0 {
            return Err(MediaError::CaptureUnavailable);
        }

        let timestamp = media.current_time();
        let image = media.paint_current().await?;
        let (width, height) = image.dimensions();

        let quality = self.config.jpeg_quality;
        let bytes = tokio::task::spawn_blocking(move || encode_jpeg(&image, quality))
            .await
            .map_err(|e| MediaError::internal(format!("JPEG encode task failed: {}", e)))??;

        debug!(timestamp, width, height, bytes = bytes.len(), "Frame sampled");

        Ok(EncodedFrame {
            bytes,
            width,
            height,
            timestamp,
        })
    }
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    image.write_with_encoder(encoder)?;
    Ok(buf)
}
