//! Media sources the engine samples from.
//!
//! A `MediaSource` is the host's playing video as seen by the engine: it
//! reports the playback position, native dimensions and duration, and can
//! paint its current instant onto an RGB buffer. The engine only ever reads
//! from it; it never seeks or pauses.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bladescan_models::MediaMetadata;
use image::RgbImage;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// A playing video.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Native pixel dimensions; `(0, 0)` until the metadata is known.
    fn dimensions(&self) -> (u32, u32);

    /// Duration in seconds, when known.
    fn duration(&self) -> Option<f64>;

    /// Paint the visual content at the current instant.
    ///
    /// Must not change playback state.
    async fn paint_current(&self) -> MediaResult<RgbImage>;

    /// Snapshot of the intrinsic properties.
    fn metadata(&self) -> MediaMetadata {
        let (width, height) = self.dimensions();
        MediaMetadata {
            width,
            height,
            duration: self.duration().unwrap_or(0.0),
            fps: None,
        }
    }
}

/// Shared playback position, written by the player and read by sources.
///
/// Cloning shares the same position.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    position_bits: Arc<AtomicU64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position in seconds.
    pub fn now(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    /// Move the playhead.
    pub fn set(&self, seconds: f64) {
        self.position_bits
            .store(seconds.max(0.0).to_bits(), Ordering::Release);
    }
}

/// A video file on disk, decoded on demand with FFmpeg.
pub struct FileMediaSource {
    path: PathBuf,
    clock: PlaybackClock,
    metadata: OnceLock<MediaMetadata>,
    decode_timeout: Option<Duration>,
}

impl FileMediaSource {
    /// Create a source for `path`. Dimensions stay zero until [`load`](Self::load).
    pub fn new(path: impl AsRef<Path>, clock: PlaybackClock) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock,
            metadata: OnceLock::new(),
            decode_timeout: None,
        }
    }

    /// Bound how long a single frame decode may take.
    pub fn with_decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout = Some(timeout);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Probe the file; after this the source reports its metadata.
    pub async fn load(&self) -> MediaResult<MediaMetadata> {
        if let Some(meta) = self.metadata.get() {
            return Ok(*meta);
        }

        let meta = probe_media(&self.path).await?;
        if !meta.has_dimensions() {
            return Err(MediaError::InvalidVideo(format!(
                "{} reports zero dimensions",
                self.path.display()
            )));
        }

        debug!(
            path = %self.path.display(),
            width = meta.width,
            height = meta.height,
            duration = meta.duration,
            "Media metadata loaded"
        );
        Ok(*self.metadata.get_or_init(|| meta))
    }

    /// Decode the frame shown at `time`.
    pub async fn paint_at(&self, time: f64) -> MediaResult<RgbImage> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Err(MediaError::CaptureUnavailable);
        }

        let cmd = FfmpegCommand::to_stdout(&self.path)
            .seek(time)
            .single_frame()
            .raw_rgb24();

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.decode_timeout {
            runner = runner.with_timeout(timeout);
        }
        let pixels = runner.capture_stdout(&cmd).await?;

        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(MediaError::InvalidVideo(format!(
                "decoded {} bytes at {:.3}s, expected {} for {}x{}",
                pixels.len(),
                time,
                expected,
                width,
                height
            )));
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| MediaError::internal("Failed to create image buffer"))
    }
}

#[async_trait]
impl MediaSource for FileMediaSource {
    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.metadata
            .get()
            .map(|m| (m.width, m.height))
            .unwrap_or((0, 0))
    }

    fn duration(&self) -> Option<f64> {
        self.metadata.get().map(|m| m.duration)
    }

    async fn paint_current(&self) -> MediaResult<RgbImage> {
        self.paint_at(self.clock.now()).await
    }

    fn metadata(&self) -> MediaMetadata {
        self.metadata.get().copied().unwrap_or(MediaMetadata {
            width: 0,
            height: 0,
            duration: 0.0,
            fps: None,
        })
    }
}
