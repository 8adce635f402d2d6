//! Playback synchronization engine.
//!
//! The engine reacts to playback-position notifications from the host. In
//! live mode it samples the current frame and asks the detector about it, at
//! most one request at a time and no more often than the configured
//! playback-time interval; notifications that arrive while a request is
//! outstanding are dropped, not queued. In precomputed mode it looks up the
//! nearest analyzed frame and draws it, with no sampling or network traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bladescan_media::{FrameSampler, MediaError, MediaSource, OverlayRenderer, OverlaySurface};
use bladescan_models::{
    Detection, DetectionTotals, FrameResult, FrameTimeline, MediaMetadata, SessionId, SessionInfo,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::display::DisplayState;
use crate::error::{SampleError, SyncError, SyncResult};
use crate::metrics::{record_dropped, record_inference_duration, record_render, record_sample};
use crate::providers::Detector;
use crate::session::{InFlightGuard, ModeState, Session};

/// How often `wait_for_media_ready` re-checks the media.
const MEDIA_READY_POLL: Duration = Duration::from_millis(50);

/// Overlay layer shared between the engine and the host that displays it.
pub type SharedSurface = Arc<Mutex<dyn OverlaySurface>>;

/// Engine state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    /// Live session waiting for the next eligible notification
    LiveArmed,
    /// Live session with a sample request outstanding
    LiveSampling,
    PrecomputedReady,
}

/// Why a position notification was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A sample request is already outstanding
    Busy,
    /// Too little playback time since the last sample
    Throttled,
    NoSession,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Busy => "busy",
            SkipReason::Throttled => "throttled",
            SkipReason::NoSession => "no_session",
        }
    }
}

/// What the engine did with a position notification.
#[derive(Debug)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    /// A live sample cycle was started
    Sampling(JoinHandle<CycleOutcome>),
    /// A precomputed frame was looked up and displayed
    Rendered {
        timestamp: f64,
        detection_count: usize,
    },
}

/// How a live sample cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Merged { detections: usize, total: usize },
    /// Swallowed failure, labelled by kind
    Failed(&'static str),
    /// The session was replaced before the result arrived
    Discarded,
}

/// Notifications from the host media element.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    PositionChanged(f64),
    MetadataReady(MediaMetadata),
    DataReady,
    Error(String),
}

/// Mode to start a session in.
#[derive(Debug)]
pub enum SessionLoad {
    Live,
    Precomputed(FrameTimeline),
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coordinates sampling, detection and overlay drawing for one player.
pub struct SyncEngine {
    config: SyncConfig,
    sampler: FrameSampler,
    detector: Arc<dyn Detector>,
    renderer: OverlayRenderer,
    surface: SharedSurface,
    session: Mutex<Option<Arc<Session>>>,
    /// Written only while the surface lock is held.
    overlay_enabled: AtomicBool,
    /// Media failure reported before a session could load.
    media_error: Mutex<Option<String>>,
    display: watch::Sender<DisplayState>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, detector: Arc<dyn Detector>, surface: SharedSurface) -> Self {
        let (display, _) = watch::channel(DisplayState {
            overlay_enabled: true,
            ..Default::default()
        });
        info!(
            detector = detector.name(),
            sample_interval_secs = config.sample_interval_secs,
            "Sync engine created"
        );
        Self {
            config,
            sampler: FrameSampler::default(),
            detector,
            renderer: OverlayRenderer::default(),
            surface,
            session: Mutex::new(None),
            overlay_enabled: AtomicBool::new(true),
            media_error: Mutex::new(None),
            display,
        }
    }

    pub fn with_sampler(mut self, sampler: FrameSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Watch display state changes.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display.subscribe()
    }

    /// Current display state.
    pub fn display(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn state(&self) -> EngineState {
        match self.current_session() {
            None => EngineState::Idle,
            Some(session) => match session.mode {
                ModeState::Precomputed { .. } => EngineState::PrecomputedReady,
                ModeState::Live(_) if session.is_in_flight() => EngineState::LiveSampling,
                ModeState::Live(_) => EngineState::LiveArmed,
            },
        }
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.current_session().map(|s| s.info.clone())
    }

    /// Live: cumulative totals so far. Precomputed: whole-timeline summary.
    pub fn totals(&self) -> Option<DetectionTotals> {
        let session = self.current_session()?;
        let totals = match &session.mode {
            ModeState::Live(live) => lock(live).stats.totals().clone(),
            ModeState::Precomputed { summary, .. } => summary.clone(),
        };
        Some(totals)
    }

    /// Live samples merged so far, oldest first. Empty in precomputed mode.
    pub fn history(&self) -> Vec<FrameResult> {
        let Some(session) = self.current_session() else {
            return Vec::new();
        };
        let history = match &session.mode {
            ModeState::Live(live) => lock(live).stats.history().to_vec(),
            ModeState::Precomputed { .. } => Vec::new(),
        };
        history
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled.load(Ordering::Acquire)
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        lock(&self.session).clone()
    }

    /// Start a live session, replacing any previous one.
    pub fn load_live(&self, media: Arc<dyn MediaSource>) -> SessionId {
        self.install(Session::live(media), DetectionTotals::new())
    }

    /// Start a precomputed session over an analyzed timeline, replacing any
    /// previous one.
    pub fn load_precomputed(
        &self,
        media: Arc<dyn MediaSource>,
        timeline: FrameTimeline,
    ) -> SyncResult<SessionId> {
        if timeline.is_empty() {
            return Err(SyncError::EmptyTimeline);
        }
        let session = Session::precomputed(media, timeline);
        let summary = match &session.mode {
            ModeState::Precomputed { summary, .. } => summary.clone(),
            ModeState::Live(_) => DetectionTotals::new(),
        };
        Ok(self.install(session, summary))
    }

    fn install(&self, session: Session, totals: DetectionTotals) -> SessionId {
        let session = Arc::new(session);
        let id = session.id().clone();
        let mode = session.info.mode;

        let previous = lock(&self.session).replace(Arc::clone(&session));
        if let Some(previous) = previous {
            info!(session_id = %previous.id(), "Session replaced");
        }
        lock(&self.media_error).take();
        lock(&self.surface).clear();

        let overlay_enabled = self.overlay_enabled();
        self.display.send_modify(|d| {
            *d = DisplayState {
                session_id: Some(id.clone()),
                mode: Some(mode),
                overlay_enabled,
                detection_count: 0,
                totals,
                playback_time: 0.0,
                notice: None,
            };
        });

        info!(session_id = %id, mode = %mode, "Session loaded");
        id
    }

    /// Drop the current session. Results still in flight for it are discarded.
    pub fn unload(&self) -> SyncResult<SessionId> {
        let session = lock(&self.session).take().ok_or(SyncError::NoSession)?;
        lock(&self.surface).clear();

        let overlay_enabled = self.overlay_enabled();
        self.display.send_modify(|d| {
            *d = DisplayState {
                overlay_enabled,
                ..Default::default()
            };
        });

        info!(session_id = %session.id(), "Session unloaded");
        Ok(session.id().clone())
    }

    /// Wait until the media reports non-zero dimensions, or until a media
    /// error is reported through [`report_media_error`](Self::report_media_error).
    pub async fn wait_for_media_ready(&self, media: &dyn MediaSource) -> SyncResult<MediaMetadata> {
        let limit = self.config.media_ready_timeout;
        let poll = async {
            let mut ticker = tokio::time::interval(MEDIA_READY_POLL);
            loop {
                ticker.tick().await;
                if let Some(message) = lock(&self.media_error).take() {
                    return Err(SyncError::MediaLoadFailed(message));
                }
                let (width, height) = media.dimensions();
                if width > 0 && height > 0 {
                    return Ok(media.metadata());
                }
            }
        };
        tokio::time::timeout(limit, poll)
            .await
            .map_err(|_| SyncError::MediaLoadTimeout(limit))?
    }

    /// Record a media failure and show it to the user. A pending
    /// [`attach`](Self::attach) gives up with `MediaLoadFailed`.
    pub fn report_media_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "Media error");
        self.publish_notice(format!("Video error: {}", message));
        if lock(&self.session).is_none() {
            *lock(&self.media_error) = Some(message);
        }
    }

    /// Wait for the media to become ready, then load a session for it.
    ///
    /// Any previous session is dropped first. If the media never reports its
    /// metadata a single notice is published and the engine stays idle.
    pub async fn attach(
        &self,
        media: Arc<dyn MediaSource>,
        load: SessionLoad,
    ) -> SyncResult<SessionId> {
        if lock(&self.session).is_some() {
            self.unload()?;
        }

        let meta = match self.wait_for_media_ready(media.as_ref()).await {
            Ok(meta) => meta,
            Err(e @ SyncError::MediaLoadTimeout(_)) => {
                warn!(error = %e, "Media never became ready");
                self.publish_notice(format!(
                    "Video failed to load within {} seconds",
                    self.config.media_ready_timeout.as_secs()
                ));
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        debug!(width = meta.width, height = meta.height, duration = meta.duration, "Media ready");

        match load {
            SessionLoad::Live => Ok(self.load_live(media)),
            SessionLoad::Precomputed(timeline) => self.load_precomputed(media, timeline),
        }
    }

    /// Show or hide the overlay. Hiding clears the surface; showing takes
    /// effect from the next render. Sampling is unaffected either way.
    pub fn set_overlay_enabled(&self, enabled: bool) {
        {
            let mut surface = lock(&self.surface);
            self.overlay_enabled.store(enabled, Ordering::Release);
            if !enabled {
                surface.clear();
            }
        }
        self.display.send_modify(|d| d.overlay_enabled = enabled);
        debug!(enabled, "Overlay toggled");
    }

    fn publish_notice(&self, notice: String) {
        self.display.send_modify(|d| d.notice = Some(notice));
    }

    /// React to the playhead moving to `time` seconds.
    pub fn on_position_changed(self: &Arc<Self>, time: f64) -> SyncOutcome {
        let Some(session) = self.current_session() else {
            return self.skip(SkipReason::NoSession, time);
        };
        self.display.send_modify(|d| d.playback_time = time);

        match &session.mode {
            ModeState::Live(live) => {
                let guard = {
                    let mut state = lock(live);
                    if session.is_in_flight() {
                        return self.skip(SkipReason::Busy, time);
                    }
                    if let Some(last) = state.last_sampled {
                        // Backwards seeks give a negative gap and are throttled too.
                        if time - last < self.config.sample_interval_secs {
                            return self.skip(SkipReason::Throttled, time);
                        }
                    }
                    let Some(guard) = session.try_begin() else {
                        return self.skip(SkipReason::Busy, time);
                    };
                    state.last_sampled = Some(time);
                    guard
                };

                debug!(session_id = %session.id(), timestamp = time, "Starting live sample");
                let engine = Arc::clone(self);
                SyncOutcome::Sampling(tokio::spawn(engine.run_live_cycle(
                    Arc::clone(&session),
                    guard,
                )))
            }
            ModeState::Precomputed { timeline, .. } => {
                let frame = timeline.nearest(time);
                let count = frame.detection_count();
                self.draw(&frame.detections, session.media.dimensions(), "precomputed");
                self.display.send_modify(|d| d.detection_count = count);
                SyncOutcome::Rendered {
                    timestamp: frame.timestamp,
                    detection_count: count,
                }
            }
        }
    }

    fn skip(&self, reason: SkipReason, time: f64) -> SyncOutcome {
        debug!(timestamp = time, reason = reason.as_str(), "Position notification dropped");
        record_dropped(reason.as_str());
        SyncOutcome::Skipped(reason)
    }

    async fn run_live_cycle(
        self: Arc<Self>,
        session: Arc<Session>,
        _guard: InFlightGuard,
    ) -> CycleOutcome {
        let result = match self.config.sample_timeout {
            Some(limit) => tokio::time::timeout(limit, self.sample_and_detect(&session))
                .await
                .unwrap_or(Err(SampleError::Timeout(limit))),
            None => self.sample_and_detect(&session).await,
        };

        match result {
            Ok(frame) => self.merge_live(&session, frame),
            Err(e) => {
                let kind = e.kind();
                if matches!(e, SampleError::Capture(MediaError::CaptureUnavailable)) {
                    debug!(session_id = %session.id(), "Media not ready, sample skipped");
                } else {
                    warn!(session_id = %session.id(), kind, error = %e, "Live sample failed");
                }
                record_sample(kind);
                CycleOutcome::Failed(kind)
            }
        }
    }

    async fn sample_and_detect(&self, session: &Session) -> Result<FrameResult, SampleError> {
        let frame = self.sampler.sample(session.media.as_ref()).await?;

        let started = Instant::now();
        let detections = self.detector.detect(frame.bytes).await;
        record_inference_duration(started.elapsed().as_secs_f64());

        Ok(FrameResult::new(frame.timestamp, detections?).with_source_size(frame.width, frame.height))
    }

    fn merge_live(&self, session: &Arc<Session>, frame: FrameResult) -> CycleOutcome {
        let current = lock(&self.session);
        let is_current = current.as_ref().is_some_and(|s| Arc::ptr_eq(s, session));
        let ModeState::Live(live) = &session.mode else {
            return CycleOutcome::Discarded;
        };
        if !is_current {
            debug!(session_id = %session.id(), "Discarding result for replaced session");
            record_sample("discarded");
            return CycleOutcome::Discarded;
        }

        let detections = frame.detection_count();
        let timestamp = frame.timestamp;
        let source_dims = frame
            .source_size
            .unwrap_or_else(|| session.media.dimensions());
        self.draw(&frame.detections, source_dims, "live");
        let totals = lock(live).stats.record(frame).clone();
        drop(current);

        let total = totals.total;
        self.display.send_modify(|d| {
            d.detection_count = total;
            d.totals = totals;
        });

        info!(
            session_id = %session.id(),
            timestamp,
            count = detections,
            total,
            "Live sample merged"
        );
        record_sample("success");
        CycleOutcome::Merged { detections, total }
    }

    /// Render onto the surface unless the overlay is hidden.
    fn draw(&self, detections: &[Detection], source_dims: (u32, u32), mode: &'static str) -> bool {
        let mut surface = lock(&self.surface);
        if !self.overlay_enabled() {
            return false;
        }
        self.renderer.render(detections, &mut *surface, source_dims);
        record_render(mode);
        true
    }

    /// Drive the engine from a stream of media events until it closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<MediaEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                MediaEvent::PositionChanged(time) => {
                    // Live cycles finish on their own; the handle is not needed here.
                    let _ = self.on_position_changed(time);
                }
                MediaEvent::MetadataReady(meta) => {
                    debug!(width = meta.width, height = meta.height, "Media metadata ready");
                }
                MediaEvent::DataReady => debug!("Media data ready"),
                MediaEvent::Error(message) => self.report_media_error(message),
            }
        }
        debug!("Media event stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockDetector;
    use async_trait::async_trait;
    use bladescan_media::{ImageSurface, MediaResult};
    use bladescan_ml_client::{InferenceError, InferenceResult};
    use bladescan_models::{BoundingBox, DetectionClass};
    use image::RgbImage;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    struct FakeMedia {
        dims: Mutex<(u32, u32)>,
        time: Mutex<f64>,
    }

    impl FakeMedia {
        fn ready(width: u32, height: u32) -> Arc<Self> {
            Arc::new(Self {
                dims: Mutex::new((width, height)),
                time: Mutex::new(0.0),
            })
        }

        fn set_dims(&self, width: u32, height: u32) {
            *self.dims.lock().unwrap() = (width, height);
        }
    }

    #[async_trait]
    impl MediaSource for FakeMedia {
        fn current_time(&self) -> f64 {
            *self.time.lock().unwrap()
        }

        fn dimensions(&self) -> (u32, u32) {
            *self.dims.lock().unwrap()
        }

        fn duration(&self) -> Option<f64> {
            Some(10.0)
        }

        async fn paint_current(&self) -> MediaResult<RgbImage> {
            let (w, h) = self.dimensions();
            Ok(RgbImage::new(w, h))
        }
    }

    /// Detector that blocks until released.
    struct GatedDetector {
        gate: Semaphore,
        calls: AtomicUsize,
        detections: Vec<Detection>,
    }

    impl GatedDetector {
        fn new(detections: Vec<Detection>) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
                detections,
            })
        }
    }

    #[async_trait]
    impl Detector for GatedDetector {
        async fn detect(&self, _image_jpeg: Vec<u8>) -> InferenceResult<Vec<Detection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            Ok(self.detections.clone())
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    impl GatedDetector {
        fn release(&self, requests: usize) {
            self.gate.add_permits(requests);
        }
    }

    fn det(class: &str, bbox: [f64; 4]) -> Detection {
        Detection::new(class, 0.9, BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]))
    }

    fn mock_detector() -> MockDetector {
        let mut mock = MockDetector::new();
        mock.expect_name().return_const("mock");
        mock
    }

    fn returning(detections: Vec<Detection>) -> Arc<MockDetector> {
        let mut mock = mock_detector();
        mock.expect_detect()
            .returning(move |_| Ok(detections.clone()));
        Arc::new(mock)
    }

    fn engine_with(
        config: SyncConfig,
        detector: Arc<dyn Detector>,
    ) -> (Arc<SyncEngine>, Arc<Mutex<ImageSurface>>) {
        let surface = Arc::new(Mutex::new(ImageSurface::new(32, 24)));
        let shared: SharedSurface = surface.clone();
        (Arc::new(SyncEngine::new(config, detector, shared)), surface)
    }

    fn engine(detector: Arc<dyn Detector>) -> (Arc<SyncEngine>, Arc<Mutex<ImageSurface>>) {
        engine_with(SyncConfig::default(), detector)
    }

    fn timeline() -> FrameTimeline {
        FrameTimeline::new(
            vec![
                FrameResult::new(0.0, vec![det("damage", [0.0, 0.0, 10.0, 10.0])]),
                FrameResult::new(
                    1.0,
                    vec![
                        det("damage", [0.0, 0.0, 20.0, 20.0]),
                        det("dirt", [10.0, 10.0, 30.0, 30.0]),
                        det("dirt", [40.0, 10.0, 60.0, 30.0]),
                    ],
                ),
                FrameResult::new(2.0, vec![]),
            ],
            3.0,
            30.0,
        )
        .unwrap()
    }

    fn expect_sampling(outcome: SyncOutcome) -> JoinHandle<CycleOutcome> {
        match outcome {
            SyncOutcome::Sampling(handle) => handle,
            other => panic!("expected a sample to start, got {:?}", other),
        }
    }

    fn assert_skipped(outcome: SyncOutcome, reason: SkipReason) {
        match outcome {
            SyncOutcome::Skipped(r) => assert_eq!(r, reason),
            other => panic!("expected {:?} skip, got {:?}", reason, other),
        }
    }

    #[tokio::test]
    async fn test_at_most_one_request_in_flight() {
        let detector = GatedDetector::new(vec![det("damage", [0.0, 0.0, 8.0, 8.0])]);
        let (engine, _) = engine(detector.clone());
        engine.load_live(FakeMedia::ready(64, 48));

        let handle = expect_sampling(engine.on_position_changed(0.0));
        assert_eq!(engine.state(), EngineState::LiveSampling);

        for t in [0.6, 1.2, 5.0] {
            assert_skipped(engine.on_position_changed(t), SkipReason::Busy);
        }

        detector.release(1);
        assert_eq!(
            handle.await.unwrap(),
            CycleOutcome::Merged {
                detections: 1,
                total: 1
            }
        );
        assert_eq!(engine.state(), EngineState::LiveArmed);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);

        detector.release(1);
        let handle = expect_sampling(engine.on_position_changed(6.0));
        handle.await.unwrap();
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_throttle_measured_in_playback_time() {
        let (engine, _) = engine(returning(vec![]));
        engine.load_live(FakeMedia::ready(64, 48));

        expect_sampling(engine.on_position_changed(0.0)).await.unwrap();
        assert_skipped(engine.on_position_changed(0.3), SkipReason::Throttled);
        expect_sampling(engine.on_position_changed(0.5)).await.unwrap();
        // Seeking backwards gives a negative gap.
        assert_skipped(engine.on_position_changed(0.1), SkipReason::Throttled);
        expect_sampling(engine.on_position_changed(1.0)).await.unwrap();

        assert_eq!(engine.history().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_releases_in_flight() {
        let mut mock = mock_detector();
        mock.expect_detect()
            .times(2)
            .returning(|_| Err(InferenceError::TransportFailure("connection refused".into())));
        let (engine, _) = engine(Arc::new(mock));
        engine.load_live(FakeMedia::ready(64, 48));

        let outcome = expect_sampling(engine.on_position_changed(0.0)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed("transport_failure"));
        assert_eq!(engine.state(), EngineState::LiveArmed);

        let outcome = expect_sampling(engine.on_position_changed(1.0)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed("transport_failure"));
        assert_eq!(engine.display().detection_count, 0);
    }

    #[tokio::test]
    async fn test_rejection_is_swallowed() {
        let mut mock = mock_detector();
        mock.expect_detect()
            .times(1)
            .returning(|_| Err(InferenceError::rejected("model not loaded")));
        let (engine, _) = engine(Arc::new(mock));
        engine.load_live(FakeMedia::ready(64, 48));

        let outcome = expect_sampling(engine.on_position_changed(0.0)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed("service_rejected"));
        assert!(engine.display().notice.is_none());
    }

    #[tokio::test]
    async fn test_capture_unavailable_skips_detector() {
        let mut mock = mock_detector();
        mock.expect_detect().never();
        let (engine, _) = engine(Arc::new(mock));
        engine.load_live(FakeMedia::ready(0, 0));

        let outcome = expect_sampling(engine.on_position_changed(0.0)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed("capture_unavailable"));
        assert_eq!(engine.state(), EngineState::LiveArmed);
    }

    #[tokio::test]
    async fn test_live_totals_cumulative_by_class() {
        let (engine, surface) = engine(returning(vec![
            det("damage", [0.0, 0.0, 32.0, 24.0]),
            det("dirt", [32.0, 24.0, 60.0, 40.0]),
        ]));
        engine.load_live(FakeMedia::ready(64, 48));

        expect_sampling(engine.on_position_changed(0.0)).await.unwrap();
        let outcome = expect_sampling(engine.on_position_changed(0.5)).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Merged {
                detections: 2,
                total: 4
            }
        );

        let display = engine.display();
        assert_eq!(display.detection_count, 4);
        assert_eq!(display.totals.damage(), 2);
        assert_eq!(display.totals.dirt(), 2);
        assert_eq!(engine.totals().unwrap().total, 4);
        assert!(!surface.lock().unwrap().is_blank());
    }

    #[tokio::test]
    async fn test_precomputed_nearest_and_instantaneous_count() {
        let mut mock = mock_detector();
        mock.expect_detect().never();
        let (engine, surface) = engine(Arc::new(mock));
        engine
            .load_precomputed(FakeMedia::ready(64, 48), timeline())
            .unwrap();
        assert_eq!(engine.state(), EngineState::PrecomputedReady);
        assert_eq!(engine.display().totals.total, 4);

        match engine.on_position_changed(1.4) {
            SyncOutcome::Rendered {
                timestamp,
                detection_count,
            } => {
                assert_eq!(timestamp, 1.0);
                assert_eq!(detection_count, 3);
            }
            other => panic!("expected render, got {:?}", other),
        }
        assert_eq!(engine.display().detection_count, 3);
        assert!(!surface.lock().unwrap().is_blank());

        engine.on_position_changed(2.2);
        assert_eq!(engine.display().detection_count, 0);
        assert!(surface.lock().unwrap().is_blank());
        assert_eq!(engine.display().totals.total, 4);
        assert_eq!(engine.totals().unwrap().by_class(&DetectionClass::Dirt), 2);
    }

    #[tokio::test]
    async fn test_overlay_toggle_clears_without_touching_sampling() {
        let detector = GatedDetector::new(vec![det("damage", [0.0, 0.0, 32.0, 24.0])]);
        let (engine, surface) = engine(detector.clone());
        engine.load_live(FakeMedia::ready(64, 48));

        let handle = expect_sampling(engine.on_position_changed(0.0));
        engine.set_overlay_enabled(false);
        assert!(!engine.display().overlay_enabled);
        assert_skipped(engine.on_position_changed(1.0), SkipReason::Busy);

        detector.release(1);
        handle.await.unwrap();
        assert!(surface.lock().unwrap().is_blank());
        assert_eq!(engine.display().detection_count, 1);

        engine.set_overlay_enabled(true);
        assert!(surface.lock().unwrap().is_blank());

        detector.release(1);
        expect_sampling(engine.on_position_changed(2.0)).await.unwrap();
        assert!(!surface.lock().unwrap().is_blank());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[allow(clippy::await_holding_lock)]
    async fn test_disable_while_merge_waits_on_surface() {
        let detector = GatedDetector::new(vec![det("damage", [0.0, 0.0, 32.0, 24.0])]);
        let (engine, surface) = engine(detector.clone());
        engine.load_live(FakeMedia::ready(64, 48));
        let handle = expect_sampling(engine.on_position_changed(0.0));

        // Hold the surface so the merge stalls right before drawing.
        let held = surface.lock().unwrap();
        detector.release(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let toggler = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.set_overlay_enabled(false))
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.overlay_enabled());
        drop(held);

        toggler.join().unwrap();
        assert!(matches!(handle.await.unwrap(), CycleOutcome::Merged { .. }));
        assert!(!engine.overlay_enabled());
        assert!(!engine.display().overlay_enabled);
        assert!(surface.lock().unwrap().is_blank());
    }

    #[tokio::test]
    async fn test_overlay_disabled_precomputed_still_counts() {
        let (engine, surface) = engine(returning(vec![]));
        engine
            .load_precomputed(FakeMedia::ready(64, 48), timeline())
            .unwrap();
        engine.on_position_changed(0.0);
        assert!(!surface.lock().unwrap().is_blank());

        engine.set_overlay_enabled(false);
        assert!(surface.lock().unwrap().is_blank());
        engine.on_position_changed(1.0);
        assert!(surface.lock().unwrap().is_blank());
        assert_eq!(engine.display().detection_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_times_out_once() {
        let (engine, _) = engine(returning(vec![]));
        let media = FakeMedia::ready(0, 0);

        let err = engine.attach(media, SessionLoad::Live).await.unwrap_err();
        assert!(matches!(err, SyncError::MediaLoadTimeout(d) if d == Duration::from_secs(10)));
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(
            engine.display().notice.as_deref(),
            Some("Video failed to load within 10 seconds")
        );
        assert_skipped(engine.on_position_changed(1.0), SkipReason::NoSession);
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_error_fails_attach_early() {
        let (engine, _) = engine(returning(vec![]));
        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(Arc::clone(&engine).run(rx));

        tx.send(MediaEvent::Error("moov atom not found".into()))
            .await
            .unwrap();
        drop(tx);
        runner.await.unwrap();

        let started = tokio::time::Instant::now();
        let err = engine
            .attach(FakeMedia::ready(0, 0), SessionLoad::Live)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MediaLoadFailed(ref m) if m == "moov atom not found"));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(
            engine.display().notice.as_deref(),
            Some("Video error: moov atom not found")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_error_cleared_by_successful_load() {
        let (engine, _) = engine(returning(vec![]));
        engine.report_media_error("transient");
        engine.load_live(FakeMedia::ready(64, 48));
        engine.unload().unwrap();

        let id = engine
            .attach(FakeMedia::ready(64, 48), SessionLoad::Live)
            .await
            .unwrap();
        assert_eq!(engine.session_info().unwrap().session_id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_waits_for_metadata() {
        let (engine, _) = engine(returning(vec![]));
        let media = FakeMedia::ready(0, 0);

        let later = media.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            later.set_dims(64, 48);
        });

        let id = engine.attach(media, SessionLoad::Live).await.unwrap();
        assert_eq!(engine.session_info().unwrap().session_id, id);
        assert_eq!(engine.state(), EngineState::LiveArmed);
    }

    #[tokio::test]
    async fn test_result_for_replaced_session_is_discarded() {
        let detector = GatedDetector::new(vec![det("damage", [0.0, 0.0, 8.0, 8.0])]);
        let (engine, _) = engine(detector.clone());
        let first = engine.load_live(FakeMedia::ready(64, 48));

        let handle = expect_sampling(engine.on_position_changed(0.0));
        let second = engine.load_live(FakeMedia::ready(64, 48));
        assert_ne!(first, second);

        // The new session has its own in-flight slot.
        let next = expect_sampling(engine.on_position_changed(0.0));

        detector.release(2);
        assert_eq!(handle.await.unwrap(), CycleOutcome::Discarded);
        assert_eq!(
            next.await.unwrap(),
            CycleOutcome::Merged {
                detections: 1,
                total: 1
            }
        );
        assert_eq!(engine.display().detection_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_timeout_releases_in_flight() {
        let detector = GatedDetector::new(vec![]);
        let config = SyncConfig::default().with_sample_timeout(Duration::from_secs(1));
        let (engine, _) = engine_with(config, detector.clone());
        engine.load_live(FakeMedia::ready(16, 16));

        let outcome = expect_sampling(engine.on_position_changed(0.0)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Failed("timeout"));
        assert_eq!(engine.state(), EngineState::LiveArmed);
    }

    #[tokio::test]
    async fn test_unload_returns_to_idle() {
        let (engine, surface) = engine(returning(vec![]));
        engine
            .load_precomputed(FakeMedia::ready(64, 48), timeline())
            .unwrap();
        engine.on_position_changed(1.0);

        engine.unload().unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(surface.lock().unwrap().is_blank());
        assert_eq!(engine.display().detection_count, 0);
        assert!(matches!(engine.unload(), Err(SyncError::NoSession)));
    }

    #[tokio::test]
    async fn test_run_consumes_media_events() {
        let (engine, _) = engine(returning(vec![]));
        engine
            .load_precomputed(FakeMedia::ready(64, 48), timeline())
            .unwrap();
        let mut display = engine.subscribe();

        let (tx, rx) = mpsc::channel(8);
        tx.send(MediaEvent::DataReady).await.unwrap();
        tx.send(MediaEvent::PositionChanged(1.4)).await.unwrap();
        tx.send(MediaEvent::Error("decode error".into())).await.unwrap();
        drop(tx);

        engine.clone().run(rx).await;

        assert!(display.has_changed().unwrap());
        let state = display.borrow_and_update().clone();
        assert_eq!(state.detection_count, 3);
        assert_eq!(state.playback_time, 1.4);
        assert_eq!(state.notice.as_deref(), Some("Video error: decode error"));
    }
}
