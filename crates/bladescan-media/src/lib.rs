//! Media access for the detection overlay engine.
//!
//! This crate provides:
//! - The `MediaSource` abstraction over a playing video, with an FFmpeg-backed file source
//! - FFprobe metadata probing
//! - Frame sampling into JPEG stills
//! - Overlay rendering of detection boxes and label tags

pub mod command;
pub mod error;
pub mod overlay;
pub mod probe;
pub mod sampler;
pub mod source;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use overlay::{
    class_color, ImageSurface, OverlayBox, OverlayRenderer, OverlayStyle, OverlaySurface,
    PixelRect,
};
pub use probe::probe_media;
pub use sampler::{encode_jpeg, EncodedFrame, FrameSampler, SamplerConfig};
pub use source::{FileMediaSource, MediaSource, PlaybackClock};
