//! Display-space overlay.
//!
//! - `coords`: maps detection-space geometry onto the display surface.
//! - `store`: the annotations currently on screen, swapped atomically.
//! - `render`: paints a store snapshot onto a `Canvas`.

pub mod coords;
pub mod render;
pub mod store;

use crate::detect::{Classification, Landmark, Rect};

pub use coords::{OverlayCoordinateSpace, Projection, SourceInfo};
pub use render::{Canvas, Color, DrawOp, OverlayRenderer, Paint, RecordingCanvas};
pub use store::{OverlayBatch, OverlayStore};

/// One renderable annotation in display-space.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayGeometry {
    pub bounds: Rect,
    pub landmarks: Vec<Landmark>,
    pub classification: Classification,
    pub tracking_id: Option<u32>,
}
