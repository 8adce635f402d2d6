//! Headless playback of a video file through the sync engine.
//!
//! The player stands in for a browser video element: it advances a playback
//! clock on a fixed tick, emits position notifications to the engine and
//! periodically writes the overlay composited onto the decoded frame.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bladescan_media::{
    FileMediaSource, FrameSampler, ImageSurface, MediaError, MediaSource, PlaybackClock,
    SamplerConfig,
};
use bladescan_ml_client::InferenceClient;
use bladescan_models::{DetectionTotals, SessionId, SessionMode};
use bladescan_sync::{EngineState, MediaEvent, SessionLoad, SharedSurface, SyncConfig, SyncEngine};
use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};

use crate::config::PlayerConfig;
use crate::error::PlayerResult;
use crate::logging::SessionLogger;

const EVENT_BUFFER: usize = 64;
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Summary written at the end of a playback session.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackReport {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub video: PathBuf,
    pub duration: f64,
    pub model_name: Option<String>,
    /// Live: cumulative over samples. Precomputed: whole-timeline summary.
    pub totals: DetectionTotals,
    /// Live samples merged
    pub samples: usize,
    pub snapshots: Vec<PathBuf>,
    pub finished_at: DateTime<Utc>,
}

/// Plays video files through a [`SyncEngine`] without a display.
pub struct HeadlessPlayer {
    config: PlayerConfig,
    sync_config: SyncConfig,
    sampler_config: SamplerConfig,
    client: Arc<InferenceClient>,
}

impl HeadlessPlayer {
    pub fn new(
        config: PlayerConfig,
        sync_config: SyncConfig,
        sampler_config: SamplerConfig,
        client: InferenceClient,
    ) -> Self {
        Self {
            config,
            sync_config,
            sampler_config,
            client: Arc::new(client),
        }
    }

    /// Build a player from environment variables.
    pub fn from_env() -> PlayerResult<Self> {
        Ok(Self::new(
            PlayerConfig::from_env(),
            SyncConfig::from_env(),
            SamplerConfig::from_env(),
            InferenceClient::from_env()?,
        ))
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    fn build_surface(&self) -> PlayerResult<ImageSurface> {
        let surface = ImageSurface::new(self.config.surface_width, self.config.surface_height);
        Ok(match &self.config.font_path {
            Some(path) => surface.with_font_file(path, self.config.font_size)?,
            None => surface,
        })
    }

    /// Play `video` from the configured start position to its end.
    pub async fn play(&self, video: &Path) -> PlayerResult<PlaybackReport> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()).into());
        }
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        if !self.client.health_check().await {
            warn!("Detection service is not reachable; samples will fail until it is");
        }
        let model_name = match self.client.model_info().await {
            Ok(info) => Some(info.model_name),
            Err(e) => {
                warn!(error = %e, "Could not fetch model info");
                None
            }
        };

        let surface = Arc::new(Mutex::new(self.build_surface()?));
        let shared: SharedSurface = surface.clone();
        let engine = Arc::new(
            SyncEngine::new(self.sync_config.clone(), self.client.clone(), shared)
                .with_sampler(FrameSampler::new(self.sampler_config.clone())),
        );

        let clock = PlaybackClock::new();
        clock.set(self.config.start_at);
        let media = Arc::new(
            FileMediaSource::new(video, clock.clone()).with_decode_timeout(self.config.decode_timeout),
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let runner = tokio::spawn(Arc::clone(&engine).run(events_rx));

        {
            let media = media.clone();
            let events = events_tx.clone();
            tokio::spawn(async move {
                match media.load().await {
                    Ok(meta) => {
                        let _ = events.send(MediaEvent::MetadataReady(meta)).await;
                        let _ = events.send(MediaEvent::DataReady).await;
                    }
                    Err(e) => {
                        let _ = events.send(MediaEvent::Error(e.to_string())).await;
                    }
                }
            });
        }

        let load = match self.config.mode {
            SessionMode::Live => SessionLoad::Live,
            SessionMode::Precomputed => {
                info!(video = %video.display(), "Requesting batch analysis");
                let analysis = self.client.analyze_video(video).await?;
                info!(
                    frames = analysis.frames.len(),
                    fps = analysis.fps,
                    "Batch analysis received"
                );
                SessionLoad::Precomputed(analysis.into_timeline()?)
            }
        };

        let source: Arc<dyn MediaSource> = media.clone();
        let session_id = engine.attach(source, load).await?;
        let logger = SessionLogger::new(&session_id, self.config.mode);
        let duration = media.duration().unwrap_or(0.0);
        logger.log_start(&format!("{} ({:.1}s)", video.display(), duration));

        let snapshots = self
            .drive(&engine, &media, &surface, &clock, &events_tx, duration, &logger)
            .instrument(logger.create_span())
            .await;

        drop(events_tx);
        if let Err(e) = runner.await {
            logger.log_warning(&format!("event loop ended abnormally: {}", e));
        }
        self.drain(&engine, &logger).await;

        let totals = engine.totals().unwrap_or_default();
        let samples = engine.history().len();
        engine.unload()?;

        let report = PlaybackReport {
            session_id,
            mode: self.config.mode,
            video: video.to_path_buf(),
            duration,
            model_name,
            totals,
            samples,
            snapshots,
            finished_at: Utc::now(),
        };
        let report_path = self.config.output_dir.join("report.json");
        tokio::fs::write(&report_path, serde_json::to_vec_pretty(&report)?).await?;

        logger.log_completion(&format!(
            "{} detections ({} damage, {} dirt), report at {}",
            report.totals.total,
            report.totals.damage(),
            report.totals.dirt(),
            report_path.display()
        ));
        Ok(report)
    }

    /// Tick the clock from the start position to the end of the video.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        engine: &SyncEngine,
        media: &FileMediaSource,
        surface: &Mutex<ImageSurface>,
        clock: &PlaybackClock,
        events: &mpsc::Sender<MediaEvent>,
        duration: f64,
        logger: &SessionLogger,
    ) -> Vec<PathBuf> {
        let step = self.config.tick_playback_secs();
        let snapshot_every = self.config.snapshot_interval_secs;
        let mut ticker = tokio::time::interval(self.config.tick);
        let mut time = self.config.start_at.clamp(0.0, duration);
        let mut next_snapshot = time;
        let mut snapshots = Vec::new();

        loop {
            ticker.tick().await;
            clock.set(time);
            if events.send(MediaEvent::PositionChanged(time)).await.is_err() {
                logger.log_warning("engine stopped accepting events");
                break;
            }

            if snapshot_every > 0.0 && time >= next_snapshot {
                // Let the engine handle the notification before capturing.
                tokio::task::yield_now().await;
                match self.snapshot(media, surface, time).await {
                    Ok(path) => snapshots.push(path),
                    Err(e) => logger.log_warning(&format!("snapshot at {:.2}s failed: {}", time, e)),
                }
                logger.log_progress(time, Some(duration), engine.display().detection_count);
                next_snapshot += snapshot_every;
            }

            if time >= duration {
                break;
            }
            time = (time + step).min(duration);
        }
        snapshots
    }

    /// Write the overlay composited onto the frame at `time`.
    async fn snapshot(
        &self,
        media: &FileMediaSource,
        surface: &Mutex<ImageSurface>,
        time: f64,
    ) -> PlayerResult<PathBuf> {
        let frame = media.paint_at(time).await?;
        let frame = imageops::resize(
            &frame,
            self.config.surface_width,
            self.config.surface_height,
            FilterType::Triangle,
        );
        let composed = surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .composite_onto(&frame)?;

        let path = self
            .config
            .output_dir
            .join(format!("overlay_{:09.3}.png", time));
        let target = path.clone();
        tokio::task::spawn_blocking(move || composed.save(&target))
            .await
            .map_err(|e| MediaError::internal(format!("snapshot task failed: {}", e)))??;
        Ok(path)
    }

    /// Wait for an outstanding live sample so its result makes the report.
    async fn drain(&self, engine: &SyncEngine, logger: &SessionLogger) {
        let wait = async {
            while engine.state() == EngineState::LiveSampling {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        };
        if tokio::time::timeout(self.config.drain_timeout, wait).await.is_err() {
            logger.log_warning("live sample still outstanding at end of playback");
        }
    }
}
