//! Detection overlay drawing.
//!
//! Boxes arrive in the source frame's native pixel space and are mapped onto
//! the display surface with independent horizontal and vertical scale
//! factors. Every render starts from a cleared surface, so drawing the same
//! detections twice leaves the same pixels.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use bladescan_models::{Detection, DetectionClass};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::error::{MediaError, MediaResult};

/// Outline color for damage detections.
pub const DAMAGE_COLOR: Rgba<u8> = Rgba([255, 59, 48, 255]);
/// Outline color for dirt detections.
pub const DIRT_COLOR: Rgba<u8> = Rgba([255, 204, 0, 255]);
/// Outline color for any other class.
pub const FALLBACK_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Integer rectangle on a surface. May extend past the surface edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    fn to_rect(self) -> Option<Rect> {
        (self.width > 0 && self.height > 0)
            .then(|| Rect::at(self.x, self.y).of_size(self.width, self.height))
    }
}

/// A transparent layer laid over the video.
pub trait OverlaySurface: Send {
    /// Surface size in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Erase all prior drawing.
    fn clear(&mut self);

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba<u8>, line_width: u32);

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba<u8>);

    /// Draw text with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgba<u8>);

    /// Width in pixels `text` would occupy.
    fn text_width(&self, text: &str) -> u32;
}

/// In-memory RGBA overlay surface.
pub struct ImageSurface {
    canvas: RgbaImage,
    font: Option<FontArc>,
    scale: PxScale,
}

impl ImageSurface {
    /// Create a transparent surface with no font; labels render as tags only.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, TRANSPARENT),
            font: None,
            scale: PxScale::from(14.0),
        }
    }

    /// Use the TTF/OTF font at `path` for label text.
    pub fn with_font_file(self, path: impl AsRef<Path>, size_px: f32) -> MediaResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| MediaError::InvalidFont(format!("{}: {}", path.display(), e)))?;
        Ok(self.with_font(font, size_px))
    }

    pub fn with_font(mut self, font: FontArc, size_px: f32) -> Self {
        self.font = Some(font);
        self.scale = PxScale::from(size_px);
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_canvas(self) -> RgbaImage {
        self.canvas
    }

    /// Whether anything is drawn on the surface.
    pub fn is_blank(&self) -> bool {
        self.canvas.pixels().all(|p| p.0[3] == 0)
    }

    /// Alpha-blend the overlay onto a video frame of the same size.
    pub fn composite_onto(&self, frame: &RgbImage) -> MediaResult<RgbImage> {
        if frame.dimensions() != self.canvas.dimensions() {
            return Err(MediaError::internal(format!(
                "overlay is {:?} but frame is {:?}",
                self.canvas.dimensions(),
                frame.dimensions()
            )));
        }

        let mut out = frame.clone();
        for (dst, src) in out.pixels_mut().zip(self.canvas.pixels()) {
            let alpha = src.0[3] as u32;
            if alpha == 0 {
                continue;
            }
            let blend = |d: u8, s: u8| ((s as u32 * alpha + d as u32 * (255 - alpha)) / 255) as u8;
            *dst = Rgb([
                blend(dst.0[0], src.0[0]),
                blend(dst.0[1], src.0[1]),
                blend(dst.0[2], src.0[2]),
            ]);
        }
        Ok(out)
    }
}

impl OverlaySurface for ImageSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn clear(&mut self) {
        for p in self.canvas.pixels_mut() {
            *p = TRANSPARENT;
        }
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba<u8>, line_width: u32) {
        // Inset rings, so the stroke stays inside the box.
        for i in 0..line_width {
            let inset = PixelRect {
                x: rect.x.saturating_add(i as i32),
                y: rect.y.saturating_add(i as i32),
                width: rect.width.saturating_sub(2 * i),
                height: rect.height.saturating_sub(2 * i),
            };
            match inset.to_rect() {
                Some(r) => draw_hollow_rect_mut(&mut self.canvas, r, color),
                None => break,
            }
        }
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba<u8>) {
        if let Some(r) = rect.to_rect() {
            draw_filled_rect_mut(&mut self.canvas, r, color);
        }
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgba<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(&mut self.canvas, color, x, y, self.scale, font, text);
        }
    }

    fn text_width(&self, text: &str) -> u32 {
        match &self.font {
            Some(font) => text_size(self.scale, font, text).0,
            None => (text.chars().count() as f32 * self.scale.x * 0.55).ceil() as u32,
        }
    }
}

/// Drawing parameters.
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub line_width: u32,
    pub label_height: u32,
    pub label_padding: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            line_width: 3,
            label_height: 20,
            label_padding: 4,
        }
    }
}

/// One detection laid out on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub rect: PixelRect,
    pub color: Rgba<u8>,
    pub label: String,
}

/// Color for a detection class.
pub fn class_color(class: &DetectionClass) -> Rgba<u8> {
    match class {
        DetectionClass::Damage => DAMAGE_COLOR,
        DetectionClass::Dirt => DIRT_COLOR,
        DetectionClass::Other(_) => FALLBACK_COLOR,
    }
}

/// Draws detections onto an [`OverlaySurface`].
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Map detections from source pixel space onto a `surface_dims` surface.
    ///
    /// Returns nothing when the source dimensions are unknown.
    pub fn plan(
        &self,
        detections: &[Detection],
        surface_dims: (u32, u32),
        source_dims: (u32, u32),
    ) -> Vec<OverlayBox> {
        let (src_w, src_h) = source_dims;
        if src_w == 0 || src_h == 0 {
            return Vec::new();
        }
        let sx = surface_dims.0 as f64 / src_w as f64;
        let sy = surface_dims.1 as f64 / src_h as f64;

        // Coordinates past the surface by more than a stroke are never visible.
        let margin = self.style.line_width as f64;
        let pixel = |v: f64, extent: u32| v.clamp(-margin, extent as f64 + margin).round() as i32;

        detections
            .iter()
            .filter(|d| d.bbox().is_finite())
            .map(|d| {
                let scaled = d.bbox().scaled(sx, sy);
                let x = pixel(scaled.x1(), surface_dims.0);
                let y = pixel(scaled.y1(), surface_dims.1);
                let x2 = pixel(scaled.x2(), surface_dims.0);
                let y2 = pixel(scaled.y2(), surface_dims.1);
                OverlayBox {
                    rect: PixelRect {
                        x,
                        y,
                        width: (x2 - x).max(0) as u32,
                        height: (y2 - y).max(0) as u32,
                    },
                    color: class_color(d.class()),
                    label: d.label(),
                }
            })
            .collect()
    }

    /// Replace whatever is on `surface` with outlines and label tags for
    /// `detections`. Returns the number of boxes drawn.
    pub fn render(
        &self,
        detections: &[Detection],
        surface: &mut dyn OverlaySurface,
        source_dims: (u32, u32),
    ) -> usize {
        surface.clear();

        let boxes = self.plan(detections, surface.dimensions(), source_dims);
        for b in &boxes {
            surface.stroke_rect(b.rect, b.color, self.style.line_width);

            let tag = PixelRect {
                x: b.rect.x,
                y: b.rect.y.saturating_sub(self.style.label_height as i32).max(0),
                width: surface.text_width(&b.label) + 2 * self.style.label_padding,
                height: self.style.label_height,
            };
            surface.fill_rect(tag, b.color);
            surface.draw_text(
                tag.x.saturating_add(self.style.label_padding as i32),
                tag.y.saturating_add((self.style.label_padding / 2) as i32),
                &b.label,
                LABEL_TEXT_COLOR,
            );
        }
        boxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bladescan_models::BoundingBox;

    fn det(class: &str, conf: f64, bbox: [f64; 4]) -> Detection {
        Detection::new(
            DetectionClass::from(class),
            conf,
            BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        )
    }

    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<String>,
    }

    impl OverlaySurface for RecordingSurface {
        fn dimensions(&self) -> (u32, u32) {
            (320, 240)
        }

        fn clear(&mut self) {
            self.ops.clear();
            self.ops.push("clear".into());
        }

        fn stroke_rect(&mut self, rect: PixelRect, _color: Rgba<u8>, _line_width: u32) {
            self.ops.push(format!("stroke {:?}", rect));
        }

        fn fill_rect(&mut self, rect: PixelRect, _color: Rgba<u8>) {
            self.ops.push(format!("fill {:?}", rect));
        }

        fn draw_text(&mut self, _x: i32, _y: i32, text: &str, _color: Rgba<u8>) {
            self.ops.push(format!("text {}", text));
        }

        fn text_width(&self, text: &str) -> u32 {
            text.len() as u32 * 6
        }
    }

    #[test]
    fn test_plan_scales_to_surface() {
        let renderer = OverlayRenderer::default();
        let boxes = renderer.plan(
            &[det("damage", 0.9, [100.0, 100.0, 200.0, 200.0])],
            (320, 240),
            (640, 480),
        );

        assert_eq!(boxes.len(), 1);
        assert_eq!(
            boxes[0].rect,
            PixelRect {
                x: 50,
                y: 50,
                width: 50,
                height: 50
            }
        );
        assert_eq!(boxes[0].color, DAMAGE_COLOR);
        assert_eq!(boxes[0].label, "damage 90.0%");
    }

    #[test]
    fn test_plan_scales_axes_independently() {
        let renderer = OverlayRenderer::default();
        let boxes = renderer.plan(
            &[det("dirt", 0.5, [0.0, 0.0, 100.0, 100.0])],
            (200, 50),
            (100, 100),
        );
        assert_eq!(boxes[0].rect.width, 200);
        assert_eq!(boxes[0].rect.height, 50);
    }

    #[test]
    fn test_plan_without_source_dims_is_empty() {
        let renderer = OverlayRenderer::default();
        let boxes = renderer.plan(&[det("dirt", 0.5, [0.0, 0.0, 1.0, 1.0])], (320, 240), (0, 0));
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_plan_clamps_boxes_far_outside_surface() {
        let renderer = OverlayRenderer::default();
        let boxes = renderer.plan(
            &[det("damage", 0.9, [-3.0e9, 0.0, 3.0e9, 10.0])],
            (32, 24),
            (32, 24),
        );
        assert_eq!(
            boxes[0].rect,
            PixelRect {
                x: -3,
                y: 0,
                width: 38,
                height: 10
            }
        );
    }

    #[test]
    fn test_render_huge_box_stays_on_surface() {
        let renderer = OverlayRenderer::default();
        let mut surface = ImageSurface::new(32, 24);

        let drawn = renderer.render(
            &[det("damage", 0.9, [-3.0e9, 0.0, 3.0e9, 10.0])],
            &mut surface,
            (32, 24),
        );

        assert_eq!(drawn, 1);
        // Top edge of the outline spans the visible width.
        assert_eq!(*surface.canvas().get_pixel(16, 0), DAMAGE_COLOR);
        assert_eq!(*surface.canvas().get_pixel(16, 20), TRANSPARENT);
    }

    #[test]
    fn test_class_colors() {
        assert_eq!(class_color(&DetectionClass::Damage), DAMAGE_COLOR);
        assert_eq!(class_color(&DetectionClass::Dirt), DIRT_COLOR);
        assert_eq!(class_color(&DetectionClass::from("crack")), FALLBACK_COLOR);
    }

    #[test]
    fn test_render_clears_then_draws() {
        let renderer = OverlayRenderer::default();
        let mut surface = RecordingSurface::default();
        let detections = [
            det("damage", 0.873, [100.0, 100.0, 200.0, 200.0]),
            det("dirt", 0.6, [300.0, 10.0, 400.0, 60.0]),
        ];

        let drawn = renderer.render(&detections, &mut surface, (640, 480));

        assert_eq!(drawn, 2);
        assert_eq!(surface.ops[0], "clear");
        assert!(surface.ops.contains(&"text damage 87.3%".to_string()));
        // Tag above a box near the top edge is clamped to y = 0.
        assert!(surface
            .ops
            .iter()
            .any(|op| op.starts_with("fill PixelRect { x: 150, y: 0,")));
    }

    #[test]
    fn test_render_is_idempotent() {
        let renderer = OverlayRenderer::default();
        let detections = [det("damage", 0.9, [100.0, 100.0, 200.0, 200.0])];

        let mut surface = ImageSurface::new(320, 240);
        renderer.render(&detections, &mut surface, (640, 480));
        let first = surface.canvas().clone();
        renderer.render(&detections, &mut surface, (640, 480));

        assert_eq!(first.as_raw(), surface.canvas().as_raw());
    }

    #[test]
    fn test_render_empty_clears_surface() {
        let renderer = OverlayRenderer::default();
        let mut surface = ImageSurface::new(320, 240);

        renderer.render(
            &[det("dirt", 0.7, [10.0, 10.0, 100.0, 100.0])],
            &mut surface,
            (640, 480),
        );
        assert!(!surface.is_blank());

        renderer.render(&[], &mut surface, (640, 480));
        assert!(surface.is_blank());
    }

    #[test]
    fn test_stroke_pixels_land_on_box_edge() {
        let renderer = OverlayRenderer::default();
        let mut surface = ImageSurface::new(320, 240);
        renderer.render(
            &[det("crack", 0.4, [100.0, 100.0, 200.0, 200.0])],
            &mut surface,
            (640, 480),
        );

        assert_eq!(*surface.canvas().get_pixel(50, 75), FALLBACK_COLOR);
        assert_eq!(*surface.canvas().get_pixel(75, 75), TRANSPARENT);
    }

    #[test]
    fn test_composite_onto_frame() {
        let mut surface = ImageSurface::new(4, 4);
        surface.fill_rect(
            PixelRect {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
            DAMAGE_COLOR,
        );
        let frame = RgbImage::from_pixel(4, 4, Rgb([10, 10, 10]));

        let out = surface.composite_onto(&frame).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgb([255, 59, 48]));
        assert_eq!(*out.get_pixel(3, 3), Rgb([10, 10, 10]));

        assert!(surface.composite_onto(&RgbImage::new(2, 2)).is_err());
    }
}
