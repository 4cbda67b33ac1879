use std::collections::BTreeMap;

/// Axis-aligned rectangle: top-left corner plus size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Intersection over union; 0.0 for disjoint or empty rectangles.
    pub fn iou(&self, other: &Rect) -> f32 {
        let ix = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let iy = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Opaque classification payload carried from detection to overlay.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
    /// Named probabilities, e.g. `smiling` or `left_eye_open`.
    pub attributes: BTreeMap<String, f32>,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, probability: f32) -> Self {
        self.attributes.insert(name.into(), probability);
        self
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseBase,
    MouthLeft,
    MouthRight,
    MouthBottom,
    Centroid,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub kind: LandmarkKind,
    pub position: Point,
}

/// One detected object in detection-space (upright frame pixels).
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bounds: Rect,
    pub classification: Classification,
    pub landmarks: Vec<Landmark>,
    /// Stable across frames while the object is tracked. `None` means no continuity.
    pub tracking_id: Option<u32>,
}

impl Detection {
    pub fn new(bounds: Rect, classification: Classification) -> Self {
        Self {
            bounds,
            classification,
            landmarks: Vec::new(),
            tracking_id: None,
        }
    }

    pub fn with_tracking_id(mut self, id: u32) -> Self {
        self.tracking_id = Some(id);
        self
    }

    pub fn with_landmark(mut self, kind: LandmarkKind, position: Point) -> Self {
        self.landmarks.push(Landmark { kind, position });
        self
    }
}
