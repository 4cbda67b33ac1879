use crate::detect::{Point, Rect};
use crate::overlay::store::OverlayStore;
use crate::overlay::OverlayGeometry;

const BOX_STROKE_WIDTH: f32 = 5.0;
const TEXT_SIZE: f32 = 30.0;
const LANDMARK_RADIUS: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

const PALETTE: [Color; 7] = [
    Color::rgb(0, 0, 255),
    Color::rgb(0, 255, 255),
    Color::rgb(0, 255, 0),
    Color::rgb(255, 0, 255),
    Color::rgb(255, 0, 0),
    Color::rgb(255, 255, 255),
    Color::rgb(255, 255, 0),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub stroke_width: f32,
    pub text_size: f32,
}

/// Drawing surface supplied by the platform.
pub trait Canvas {
    fn clear(&mut self);
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);
    fn draw_text(&mut self, text: &str, at: Point, paint: &Paint);
    fn draw_circle(&mut self, center: Point, radius: f32, paint: &Paint);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Clear,
    Rect { rect: Rect, color: Color },
    Text { text: String, at: Point, color: Color },
    Circle { center: Point, radius: f32, color: Color },
}

/// Canvas that records draw calls instead of painting.
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn rects(&self) -> impl Iterator<Item = &Rect> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Rect { rect, .. } => Some(rect),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.ops.push(DrawOp::Rect {
            rect,
            color: paint.color,
        });
    }

    fn draw_text(&mut self, text: &str, at: Point, paint: &Paint) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            at,
            color: paint.color,
        });
    }

    fn draw_circle(&mut self, center: Point, radius: f32, paint: &Paint) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color: paint.color,
        });
    }
}

/// Paints overlay snapshots: box, tracking id, label and attribute lines, landmarks.
#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    stroke_width: f32,
    text_size: f32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            stroke_width: BOX_STROKE_WIDTH,
            text_size: TEXT_SIZE,
        }
    }
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw only when the store asked for a redraw. Returns whether a pass ran.
    pub fn render_if_dirty(&self, store: &OverlayStore, canvas: &mut dyn Canvas) -> bool {
        if !store.take_redraw() {
            return false;
        }
        self.render(&store.snapshot_for_render(), canvas);
        true
    }

    pub fn render(&self, overlays: &[OverlayGeometry], canvas: &mut dyn Canvas) {
        canvas.clear();
        for overlay in overlays {
            self.draw_one(overlay, canvas);
        }
    }

    fn paint_for(&self, tracking_id: Option<u32>) -> Paint {
        let index = tracking_id.map_or(0, |id| id as usize % PALETTE.len());
        Paint {
            color: PALETTE[index],
            stroke_width: self.stroke_width,
            text_size: self.text_size,
        }
    }

    fn draw_one(&self, overlay: &OverlayGeometry, canvas: &mut dyn Canvas) {
        let paint = self.paint_for(overlay.tracking_id);
        canvas.draw_rect(overlay.bounds, &paint);

        let mut lines = Vec::new();
        if let Some(id) = overlay.tracking_id {
            lines.push(format!("ID: {}", id));
        }
        let class = &overlay.classification;
        if !class.label.is_empty() {
            lines.push(format!("{} {:.2}", class.label, class.confidence));
        }
        for (name, probability) in &class.attributes {
            lines.push(format!("{}: {:.2}", name, probability));
        }

        // Text stacks upwards from the top edge of the box.
        let top = overlay.bounds.y - self.stroke_width;
        let count = lines.len() as f32;
        for (i, line) in lines.iter().enumerate() {
            let y = top - (count - 1.0 - i as f32) * self.text_size;
            canvas.draw_text(line, Point::new(overlay.bounds.x, y), &paint);
        }

        for landmark in &overlay.landmarks {
            canvas.draw_circle(landmark.position, LANDMARK_RADIUS, &paint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Classification, Landmark, LandmarkKind};
    use crate::overlay::store::OverlayBatch;

    fn face(id: Option<u32>) -> OverlayGeometry {
        OverlayGeometry {
            bounds: Rect::new(100.0, 200.0, 50.0, 60.0),
            landmarks: vec![Landmark {
                kind: LandmarkKind::NoseBase,
                position: Point::new(125.0, 230.0),
            }],
            classification: Classification::new("face", 0.9).with_attribute("smiling", 0.25),
            tracking_id: id,
        }
    }

    #[test]
    fn renders_box_text_and_landmarks() {
        let mut canvas = RecordingCanvas::new();
        OverlayRenderer::new().render(&[face(Some(2))], &mut canvas);

        let ops = canvas.ops();
        assert_eq!(ops[0], DrawOp::Clear);
        assert_eq!(
            ops[1],
            DrawOp::Rect {
                rect: Rect::new(100.0, 200.0, 50.0, 60.0),
                color: PALETTE[2]
            }
        );
        let texts: Vec<&str> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["ID: 2", "face 0.90", "smiling: 0.25"]);
        assert!(matches!(ops.last(), Some(DrawOp::Circle { radius, .. }) if *radius == LANDMARK_RADIUS));
    }

    #[test]
    fn untracked_overlays_use_first_colour_and_skip_id() {
        let mut canvas = RecordingCanvas::new();
        OverlayRenderer::new().render(&[face(None)], &mut canvas);
        assert!(canvas.ops().iter().all(|op| match op {
            DrawOp::Text { text, color, .. } => !text.starts_with("ID") && *color == PALETTE[0],
            _ => true,
        }));
    }

    #[test]
    fn render_if_dirty_skips_clean_store() {
        let store = OverlayStore::new();
        let renderer = OverlayRenderer::new();
        let mut canvas = RecordingCanvas::new();
        assert!(!renderer.render_if_dirty(&store, &mut canvas));
        assert!(canvas.ops().is_empty());

        let mut batch = OverlayBatch::new();
        batch.add(face(Some(1)));
        store.publish(batch);
        store.request_redraw();
        assert!(renderer.render_if_dirty(&store, &mut canvas));
        assert_eq!(canvas.rects().count(), 1);
    }
}
