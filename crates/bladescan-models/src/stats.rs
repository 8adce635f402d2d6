//! Detection tallies.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detection::{Detection, DetectionClass};
use crate::frame::FrameResult;

/// Counts of detections, overall and per class.
///
/// Always derived by folding detections; it is never the source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionTotals {
    pub total: usize,
    #[serde(default)]
    pub by_class: BTreeMap<String, usize>,
}

impl DetectionTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally a slice of frames.
    pub fn from_frames<'a>(frames: impl IntoIterator<Item = &'a FrameResult>) -> Self {
        let mut totals = Self::new();
        for frame in frames {
            totals.add(&frame.detections);
        }
        totals
    }

    /// Fold detections into the tally.
    pub fn add(&mut self, detections: &[Detection]) {
        for det in detections {
            self.total += 1;
            *self
                .by_class
                .entry(det.class().as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn by_class(&self, class: &DetectionClass) -> usize {
        self.by_class.get(class.as_str()).copied().unwrap_or(0)
    }

    pub fn damage(&self) -> usize {
        self.by_class(&DetectionClass::Damage)
    }

    pub fn dirt(&self) -> usize {
        self.by_class(&DetectionClass::Dirt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn det(class: &str) -> Detection {
        Detection::new(class, 0.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0))
    }

    #[test]
    fn test_totals_split_by_class() {
        let mut totals = DetectionTotals::new();
        totals.add(&[det("damage"), det("dirt"), det("damage")]);
        totals.add(&[det("erosion")]);

        assert_eq!(totals.total, 4);
        assert_eq!(totals.damage(), 2);
        assert_eq!(totals.dirt(), 1);
        assert_eq!(totals.by_class(&DetectionClass::from("erosion")), 1);
        assert_eq!(totals.by_class(&DetectionClass::from("ice")), 0);
    }

    #[test]
    fn test_totals_from_frames() {
        let frames = vec![
            FrameResult::new(0.0, vec![det("damage")]),
            FrameResult::new(0.5, vec![]),
            FrameResult::new(1.0, vec![det("dirt"), det("dirt")]),
        ];
        let totals = DetectionTotals::from_frames(&frames);
        assert_eq!(totals.total, 3);
        assert_eq!(totals.dirt(), 2);
    }
}
