use crate::detect::{Detection, Landmark, Point, Rect};
use crate::frame::FrameGeometry;
use crate::overlay::OverlayGeometry;

/// How to read detection-space coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub detection_width: u32,
    pub detection_height: u32,
    pub is_mirrored: bool,
}

impl SourceInfo {
    /// Derive from a frame: 90/270 frames swap width and height.
    pub fn for_frame(geometry: &FrameGeometry) -> Self {
        let (detection_width, detection_height) = geometry.upright_size();
        Self {
            detection_width,
            detection_height,
            is_mirrored: geometry.mirrored,
        }
    }
}

/// Detection-space to display-space mapping, fixed for one SourceInfo and display size.
///
/// Axes scale independently, so a display with a different aspect ratio than
/// the detection frame stretches the overlay to fill the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    info: SourceInfo,
    display_width: u32,
    display_height: u32,
}

impl Projection {
    pub fn new(info: SourceInfo, display_width: u32, display_height: u32) -> Self {
        Self {
            info,
            display_width,
            display_height,
        }
    }

    pub fn info(&self) -> SourceInfo {
        self.info
    }

    // Multiply before dividing so exact pixel values stay exact in f32.
    fn scale_x(&self, v: f32) -> f32 {
        if self.info.detection_width == 0 {
            return 0.0;
        }
        v * self.display_width as f32 / self.info.detection_width as f32
    }

    fn scale_y(&self, v: f32) -> f32 {
        if self.info.detection_height == 0 {
            return 0.0;
        }
        v * self.display_height as f32 / self.info.detection_height as f32
    }

    pub fn transform_rect(&self, r: Rect) -> Rect {
        let x = if self.info.is_mirrored {
            self.info.detection_width as f32 - r.x - r.w
        } else {
            r.x
        };
        Rect::new(
            self.scale_x(x),
            self.scale_y(r.y),
            self.scale_x(r.w),
            self.scale_y(r.h),
        )
    }

    pub fn transform_point(&self, p: Point) -> Point {
        let x = if self.info.is_mirrored {
            self.info.detection_width as f32 - p.x
        } else {
            p.x
        };
        Point::new(self.scale_x(x), self.scale_y(p.y))
    }

    pub fn project(&self, detection: &Detection) -> OverlayGeometry {
        OverlayGeometry {
            bounds: self.transform_rect(detection.bounds),
            landmarks: detection
                .landmarks
                .iter()
                .map(|l| Landmark {
                    kind: l.kind,
                    position: self.transform_point(l.position),
                })
                .collect(),
            classification: detection.classification.clone(),
            tracking_id: detection.tracking_id,
        }
    }
}

/// Owner of the current SourceInfo and display size.
///
/// SourceInfo is recomputed from a frame only while the one-shot `needs_update`
/// flag is armed. The flag starts armed, is cleared by the first `prepare`, and
/// is re-armed only by `on_source_changed`.
#[derive(Debug)]
pub struct OverlayCoordinateSpace {
    source_info: Option<SourceInfo>,
    needs_update: bool,
    mismatch_reported: bool,
    display_width: u32,
    display_height: u32,
}

impl OverlayCoordinateSpace {
    pub fn new(display_width: u32, display_height: u32) -> Self {
        Self {
            source_info: None,
            needs_update: true,
            mismatch_reported: false,
            display_width,
            display_height,
        }
    }

    pub fn set_source_info(&mut self, detection_width: u32, detection_height: u32, is_mirrored: bool) {
        self.source_info = Some(SourceInfo {
            detection_width,
            detection_height,
            is_mirrored,
        });
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        self.source_info
    }

    pub fn set_display_size(&mut self, width: u32, height: u32) {
        self.display_width = width;
        self.display_height = height;
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Source reset (camera switch, rotation class change): re-arm the update flag.
    pub fn on_source_changed(&mut self) {
        self.needs_update = true;
        self.mismatch_reported = false;
    }

    /// Apply the frame's SourceInfo if an update is pending; return the info in effect.
    pub fn prepare(&mut self, frame: &FrameGeometry) -> SourceInfo {
        let derived = SourceInfo::for_frame(frame);
        match self.source_info {
            Some(current) if !self.needs_update => {
                if current != derived && !self.mismatch_reported {
                    log::warn!(
                        "frame geometry {}x{} rot={} mirrored={} does not match source info {:?}; waiting for a source reset",
                        frame.width,
                        frame.height,
                        frame.rotation.degrees(),
                        frame.mirrored,
                        current
                    );
                    self.mismatch_reported = true;
                }
                current
            }
            _ => {
                self.source_info = Some(derived);
                self.needs_update = false;
                log::debug!(
                    "overlay source info set to {}x{} mirrored={}",
                    derived.detection_width,
                    derived.detection_height,
                    derived.is_mirrored
                );
                derived
            }
        }
    }

    /// Projection for the current SourceInfo, if one has been set.
    pub fn projection(&self) -> Option<Projection> {
        self.source_info.map(|info| self.projection_for(info))
    }

    /// Projection for a specific SourceInfo onto the current display.
    pub fn projection_for(&self, info: SourceInfo) -> Projection {
        Projection::new(info, self.display_width, self.display_height)
    }

    pub fn transform_rect(&self, r: Rect) -> Option<Rect> {
        self.projection().map(|p| p.transform_rect(r))
    }

    pub fn transform_point(&self, p: Point) -> Option<Point> {
        self.projection().map(|proj| proj.transform_point(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rotation;

    fn frame(rotation: Rotation, mirrored: bool) -> FrameGeometry {
        FrameGeometry {
            width: 640,
            height: 480,
            rotation,
            mirrored,
        }
    }

    #[test]
    fn full_frame_maps_to_full_display_for_every_orientation() {
        for rotation in [
            Rotation::Deg0,
            Rotation::Deg90,
            Rotation::Deg180,
            Rotation::Deg270,
        ] {
            for mirrored in [false, true] {
                let mut space = OverlayCoordinateSpace::new(1080, 1920);
                let info = space.prepare(&frame(rotation, mirrored));
                let full = Rect::new(
                    0.0,
                    0.0,
                    info.detection_width as f32,
                    info.detection_height as f32,
                );
                assert_eq!(
                    space.transform_rect(full),
                    Some(Rect::new(0.0, 0.0, 1080.0, 1920.0)),
                    "rotation={:?} mirrored={}",
                    rotation,
                    mirrored
                );
            }
        }
    }

    #[test]
    fn rotated_mirrored_fixture() {
        let mut space = OverlayCoordinateSpace::new(640, 480);
        let info = space.prepare(&frame(Rotation::Deg90, true));
        assert_eq!(
            info,
            SourceInfo {
                detection_width: 480,
                detection_height: 640,
                is_mirrored: true
            }
        );

        let r = space.transform_rect(Rect::new(100.0, 50.0, 20.0, 30.0)).unwrap();
        assert_eq!(r.x, 480.0);
        assert_eq!(r.y, 37.5);
        assert!((r.w - 20.0 * 640.0 / 480.0).abs() < 1e-4);
        assert_eq!(r.h, 22.5);
    }

    #[test]
    fn mirroring_reflects_points() {
        let mut space = OverlayCoordinateSpace::new(480, 640);
        space.prepare(&frame(Rotation::Deg270, true));
        assert_eq!(
            space.transform_point(Point::new(100.0, 200.0)),
            Some(Point::new(380.0, 200.0))
        );
    }

    #[test]
    fn source_info_is_sticky_until_source_changes() {
        let mut space = OverlayCoordinateSpace::new(640, 480);
        assert!(space.needs_update());

        let first = space.prepare(&frame(Rotation::Deg0, false));
        assert!(!space.needs_update());

        // Rotation class changes without a reset: the old info stays.
        let still = space.prepare(&frame(Rotation::Deg90, false));
        assert_eq!(still, first);

        space.on_source_changed();
        let rotated = space.prepare(&frame(Rotation::Deg90, false));
        assert_eq!(rotated.detection_width, 480);
        assert_eq!(rotated.detection_height, 640);
    }

    #[test]
    fn explicit_source_info_is_used_until_next_reset() {
        let mut space = OverlayCoordinateSpace::new(200, 100);
        space.prepare(&frame(Rotation::Deg0, false));
        space.set_source_info(100, 50, false);
        assert_eq!(
            space.transform_rect(Rect::new(10.0, 10.0, 10.0, 10.0)),
            Some(Rect::new(20.0, 20.0, 20.0, 20.0))
        );
    }

    #[test]
    fn no_projection_before_source_info() {
        let space = OverlayCoordinateSpace::new(640, 480);
        assert!(space.projection().is_none());
        assert!(space.transform_point(Point::new(1.0, 1.0)).is_none());
    }
}
