//! Running detection statistics.

use bladescan_models::{DetectionClass, DetectionTotals, FrameResult, FrameTimeline};

/// Accumulates detection totals for a session.
///
/// In live mode every successful sample is folded in, so the totals are
/// cumulative over the session. In precomputed mode the aggregator is built
/// once from the whole timeline and never changes.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    totals: DetectionTotals,
    history: Vec<FrameResult>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary across every frame of a timeline.
    pub fn from_timeline(timeline: &FrameTimeline) -> Self {
        Self {
            totals: DetectionTotals::from_frames(timeline.frames()),
            history: Vec::new(),
        }
    }

    /// Fold one sampled frame into the totals and keep it in the history.
    pub fn record(&mut self, frame: FrameResult) -> &DetectionTotals {
        self.totals.add(&frame.detections);
        self.history.push(frame);
        &self.totals
    }

    pub fn totals(&self) -> &DetectionTotals {
        &self.totals
    }

    pub fn total(&self) -> usize {
        self.totals.total
    }

    pub fn by_class(&self, class: &DetectionClass) -> usize {
        self.totals.by_class(class)
    }

    /// Sampled frames in the order their results arrived.
    pub fn history(&self) -> &[FrameResult] {
        &self.history
    }
}
