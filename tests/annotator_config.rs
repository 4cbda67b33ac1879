use std::sync::Mutex;

use tempfile::NamedTempFile;

use frame_annotator::config::AnnotatorConfig;
use frame_annotator::{LensFacing, PerformanceMode, Rotation};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ANNOTATOR_CONFIG",
        "ANNOTATOR_BACKEND",
        "ANNOTATOR_LENS",
        "ANNOTATOR_ROTATION",
        "ANNOTATOR_TARGET_FPS",
        "ANNOTATOR_MIN_OBJECT_SIZE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": {
            "width": 1280,
            "height": 720,
            "target_fps": 15,
            "rotation_degrees": 90,
            "lens": "back",
            "pool_buffers": 4
        },
        "detector": {
            "backend": "stub",
            "performance_mode": "accurate",
            "classification": false,
            "landmarks": true,
            "tracking": false,
            "min_object_size": 0.2
        },
        "display": {
            "width": 1080,
            "height": 1920
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ANNOTATOR_CONFIG", file.path());
    std::env::set_var("ANNOTATOR_LENS", "front");
    std::env::set_var("ANNOTATOR_ROTATION", "270");

    let cfg = AnnotatorConfig::load().expect("load config");

    assert_eq!(cfg.source.width, 1280);
    assert_eq!(cfg.source.height, 720);
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.source.rotation, Rotation::Deg270);
    assert_eq!(cfg.source.lens, LensFacing::Front);
    assert_eq!(cfg.source.pool_buffers, 4);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.options.performance_mode, PerformanceMode::Accurate);
    assert!(!cfg.detector.options.classification);
    assert!(cfg.detector.options.landmarks);
    assert!(!cfg.detector.options.tracking);
    assert!((cfg.detector.options.min_object_size - 0.2).abs() < f32::EPSILON);
    assert_eq!(cfg.display.width, 1080);
    assert_eq!(cfg.display.height, 1920);

    clear_env();
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AnnotatorConfig::load().expect("load config");
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 480);
    assert_eq!(cfg.source.target_fps, 30);
    assert_eq!(cfg.source.rotation, Rotation::Deg0);
    assert_eq!(cfg.source.lens, LensFacing::Front);
    assert_eq!(cfg.source.pool_buffers, 3);
    assert_eq!(cfg.detector.backend, "blob");
    assert_eq!(cfg.display.width, 480);
    assert_eq!(cfg.display.height, 640);

    clear_env();
}

#[test]
fn env_backend_is_normalised() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ANNOTATOR_BACKEND", "  BLOB ");
    std::env::set_var("ANNOTATOR_TARGET_FPS", "12");
    std::env::set_var("ANNOTATOR_MIN_OBJECT_SIZE", "0.05");
    let cfg = AnnotatorConfig::load().expect("load config");
    assert_eq!(cfg.detector.backend, "blob");
    assert_eq!(cfg.source.target_fps, 12);
    assert!((cfg.detector.options.min_object_size - 0.05).abs() < f32::EPSILON);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ANNOTATOR_ROTATION", "45");
    assert!(AnnotatorConfig::load().is_err());
    clear_env();

    std::env::set_var("ANNOTATOR_TARGET_FPS", "0");
    assert!(AnnotatorConfig::load().is_err());
    clear_env();

    std::env::set_var("ANNOTATOR_LENS", "sideways");
    assert!(AnnotatorConfig::load().is_err());
    clear_env();

    std::env::set_var("ANNOTATOR_MIN_OBJECT_SIZE", "1.5");
    assert!(AnnotatorConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("ANNOTATOR_CONFIG", file.path());
    let err = AnnotatorConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
