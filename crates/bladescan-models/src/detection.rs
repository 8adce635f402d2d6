//! Detection records returned by the detection service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in the native pixel space of the frame it was detected on.
///
/// Corners are always ordered (`x2 >= x1`, `y2 >= y1`). Coordinates are never
/// pre-scaled to a display surface; scaling happens at render time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl BoundingBox {
    /// Create a box from two corners, normalizing their order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    #[inline]
    pub fn x1(&self) -> f64 {
        self.x1
    }

    #[inline]
    pub fn y1(&self) -> f64 {
        self.y1
    }

    #[inline]
    pub fn x2(&self) -> f64 {
        self.x2
    }

    #[inline]
    pub fn y2(&self) -> f64 {
        self.y2
    }

    /// Box width in pixels.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Box height in pixels.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Scale each axis independently.
    ///
    /// Non-uniform factors are expected: an overlay surface need not share
    /// the source frame's aspect ratio.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> BoundingBox {
        BoundingBox::new(
            self.x1 * scale_x,
            self.y1 * scale_y,
            self.x2 * scale_x,
            self.y2 * scale_y,
        )
    }

    /// Whether every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(c: [f64; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Category of a detected finding.
///
/// The set is open: the service may add classes without a client release,
/// so anything unrecognized is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(from = "String", into = "String")]
pub enum DetectionClass {
    Damage,
    Dirt,
    Other(String),
}

impl DetectionClass {
    pub fn as_str(&self) -> &str {
        match self {
            DetectionClass::Damage => "damage",
            DetectionClass::Dirt => "dirt",
            DetectionClass::Other(name) => name,
        }
    }
}

impl From<String> for DetectionClass {
    fn from(s: String) -> Self {
        match s.as_str() {
            "damage" => DetectionClass::Damage,
            "dirt" => DetectionClass::Dirt,
            _ => DetectionClass::Other(s),
        }
    }
}

impl From<&str> for DetectionClass {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<DetectionClass> for String {
    fn from(class: DetectionClass) -> Self {
        match class {
            DetectionClass::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified, localized finding.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    #[serde(rename = "class")]
    class: DetectionClass,
    confidence: f64,
    bbox: BoundingBox,
    /// Numeric class id from the model, when the service reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_id: Option<u32>,
}

impl Detection {
    /// Create a detection. Confidence is clamped into `[0, 1]`.
    pub fn new(class: impl Into<DetectionClass>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class: class.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
            class_id: None,
        }
    }

    /// Attach the model's numeric class id.
    pub fn with_class_id(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn class(&self) -> &DetectionClass {
        &self.class
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn class_id(&self) -> Option<u32> {
        self.class_id
    }

    /// Overlay label, e.g. `damage 87.3%`.
    pub fn label(&self) -> String {
        format!("{} {:.1}%", self.class, self.confidence * 100.0)
    }
}
