use std::time::{Duration, Instant};

use frame_annotator::detect::{StubBackend, StubStep};
use frame_annotator::{
    Classification, Detection, DetectionProcessor, FrameGeometry, FramePool,
    OverlayCoordinateSpace, Point, Rect, Rotation,
};

const ROTATIONS: [Rotation; 4] = [
    Rotation::Deg0,
    Rotation::Deg90,
    Rotation::Deg180,
    Rotation::Deg270,
];

fn frame(rotation: Rotation, mirrored: bool) -> FrameGeometry {
    FrameGeometry {
        width: 640,
        height: 480,
        rotation,
        mirrored,
    }
}

#[test]
fn full_frame_maps_to_full_display_in_every_orientation() {
    for rotation in ROTATIONS {
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
                "rotation {:?} mirrored {}",
                rotation,
                mirrored
            );
        }
    }
}

#[test]
fn mirroring_twice_is_identity() {
    let mut space = OverlayCoordinateSpace::new(480, 640);
    space.prepare(&frame(Rotation::Deg90, true));
    let p = Point::new(123.0, 456.0);
    let once = space.transform_point(p).unwrap();
    let twice = space.transform_point(once).unwrap();
    assert_eq!(twice, p);
}

#[test]
fn processor_projects_rotated_mirrored_detection() {
    let detection = Detection::new(
        Rect::new(100.0, 50.0, 20.0, 30.0),
        Classification::new("face", 0.9),
    );
    let backend = StubBackend::with_script([StubStep::Detections(vec![detection])]);
    let processor = DetectionProcessor::builder(Box::new(backend))
        .display_size(640, 480)
        .build()
        .unwrap();

    let pool = FramePool::new(1, 640 * 480);
    processor.on_frame(pool.lease(frame(Rotation::Deg90, true), 1, |_| {}).unwrap());

    let deadline = Instant::now() + Duration::from_secs(5);
    while processor.stats().completed == 0 {
        assert!(Instant::now() < deadline, "detection never completed");
        std::thread::sleep(Duration::from_millis(2));
    }

    let info = processor.source_info().unwrap();
    assert_eq!((info.detection_width, info.detection_height), (480, 640));
    assert!(info.is_mirrored);

    let snapshot = processor.store().snapshot_for_render();
    assert_eq!(snapshot.len(), 1);
    let r = snapshot[0].bounds;
    assert_eq!(r.x, 480.0);
    assert_eq!(r.y, 37.5);
    assert!((r.w - 20.0 * 640.0 / 480.0).abs() < 1e-4);
    assert_eq!(r.h, 22.5);
}
