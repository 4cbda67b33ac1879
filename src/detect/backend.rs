use std::str::FromStr;

use serde::Deserialize;

use crate::detect::result::{Detection, Point, Rect};
use crate::error::{PipelineError, Result};
use crate::frame::Rotation;

/// Speed/accuracy trade-off requested from a backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

impl FromStr for PerformanceMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "accurate" => Ok(Self::Accurate),
            other => Err(PipelineError::config(format!(
                "unknown performance mode '{}'",
                other
            ))),
        }
    }
}

/// Options a backend is constructed with. Checked once, at setup.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorOptions {
    pub performance_mode: PerformanceMode,
    pub classification: bool,
    pub landmarks: bool,
    pub tracking: bool,
    /// Smallest object to report, as a fraction of the shorter upright frame side.
    pub min_object_size: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Fast,
            classification: true,
            landmarks: false,
            tracking: true,
            min_object_size: 0.1,
        }
    }
}

impl DetectorOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_object_size > 0.0 && self.min_object_size <= 1.0) {
            return Err(PipelineError::setup(format!(
                "min_object_size must be in (0, 1], got {}",
                self.min_object_size
            )));
        }
        Ok(())
    }
}

/// Pixels handed to a backend for one detection call.
///
/// `pixels` is the sensor buffer in its natural orientation; `rotation` says how
/// to turn it upright. Backends report geometry in upright coordinates, using
/// `upright_rect` / `upright_point` to convert from buffer coordinates.
#[derive(Clone, Copy, Debug)]
pub struct DetectionInput<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl<'a> DetectionInput<'a> {
    pub fn upright_size(&self) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Map a rectangle from buffer coordinates into upright coordinates.
    pub fn upright_rect(&self, r: Rect) -> Rect {
        let w = self.width as f32;
        let h = self.height as f32;
        match self.rotation {
            Rotation::Deg0 => r,
            Rotation::Deg90 => Rect::new(h - (r.y + r.h), r.x, r.h, r.w),
            Rotation::Deg180 => Rect::new(w - (r.x + r.w), h - (r.y + r.h), r.w, r.h),
            Rotation::Deg270 => Rect::new(r.y, w - (r.x + r.w), r.h, r.w),
        }
    }

    /// Map a point from buffer coordinates into upright coordinates.
    pub fn upright_point(&self, p: Point) -> Point {
        let w = self.width as f32;
        let h = self.height as f32;
        match self.rotation {
            Rotation::Deg0 => p,
            Rotation::Deg90 => Point::new(h - p.y, p.x),
            Rotation::Deg180 => Point::new(w - p.x, h - p.y),
            Rotation::Deg270 => Point::new(p.y, w - p.x),
        }
    }
}

/// Detector backend trait.
///
/// Implementations run on the detection port's worker thread and must treat the
/// pixel slice as read-only and ephemeral: the buffer goes back to the frame
/// source as soon as `detect` returns.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run on the worker before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
