//! Per-video session state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bladescan_media::MediaSource;
use bladescan_models::{DetectionTotals, FrameTimeline, SessionId, SessionInfo, SessionMode};
use chrono::Utc;

use crate::stats::StatsAggregator;

/// Mutable live-mode bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct LiveState {
    /// Playback time of the last accepted notification
    pub last_sampled: Option<f64>,
    pub stats: StatsAggregator,
}

/// Mode-specific state, fixed when the session is created.
pub(crate) enum ModeState {
    Live(Mutex<LiveState>),
    Precomputed {
        timeline: Arc<FrameTimeline>,
        summary: DetectionTotals,
    },
}

/// One loaded video. Replaced wholesale when another video is loaded.
pub(crate) struct Session {
    pub info: SessionInfo,
    pub media: Arc<dyn MediaSource>,
    pub mode: ModeState,
    in_flight: AtomicBool,
}

impl Session {
    pub fn live(media: Arc<dyn MediaSource>) -> Self {
        Self::with_mode(media, ModeState::Live(Mutex::new(LiveState::default())))
    }

    pub fn precomputed(media: Arc<dyn MediaSource>, timeline: FrameTimeline) -> Self {
        let summary = StatsAggregator::from_timeline(&timeline).totals().clone();
        Self::with_mode(
            media,
            ModeState::Precomputed {
                timeline: Arc::new(timeline),
                summary,
            },
        )
    }

    fn with_mode(media: Arc<dyn MediaSource>, mode: ModeState) -> Self {
        let kind = match mode {
            ModeState::Live(_) => SessionMode::Live,
            ModeState::Precomputed { .. } => SessionMode::Precomputed,
        };
        Self {
            info: SessionInfo {
                session_id: SessionId::new(),
                mode: kind,
                loaded_at: Utc::now(),
            },
            media,
            mode,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.info.session_id
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the session's single sample slot.
    pub fn try_begin(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                session: Arc::clone(self),
            })
    }
}

/// Holds the in-flight slot; releases it when dropped, including on panic
/// or task cancellation.
pub(crate) struct InFlightGuard {
    session: Arc<Session>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::Release);
    }
}
