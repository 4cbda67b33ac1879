use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::{DetectorOptions, PerformanceMode};
use crate::frame::Rotation;
use crate::ingest::{LensFacing, SyntheticConfig};

const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_POOL_BUFFERS: usize = 3;
const DEFAULT_BACKEND: &str = "blob";
const DEFAULT_MIN_OBJECT_SIZE: f32 = 0.1;
const DEFAULT_DISPLAY_WIDTH: u32 = 480;
const DEFAULT_DISPLAY_HEIGHT: u32 = 640;
const MAX_TARGET_FPS: u32 = 240;

#[derive(Debug, Deserialize, Default)]
struct AnnotatorConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    rotation_degrees: Option<u32>,
    lens: Option<LensFacing>,
    pool_buffers: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    performance_mode: Option<PerformanceMode>,
    classification: Option<bool>,
    landmarks: Option<bool>,
    tracking: Option<bool>,
    min_object_size: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub rotation: Rotation,
    pub lens: LensFacing,
    pub pool_buffers: usize,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub options: DetectorOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        // Defaults are infallible: rotation 0 always parses.
        Self {
            source: SourceSettings {
                width: DEFAULT_SOURCE_WIDTH,
                height: DEFAULT_SOURCE_HEIGHT,
                target_fps: DEFAULT_TARGET_FPS,
                rotation: Rotation::Deg0,
                lens: LensFacing::Front,
                pool_buffers: DEFAULT_POOL_BUFFERS,
            },
            detector: DetectorSettings {
                backend: DEFAULT_BACKEND.to_string(),
                options: DetectorOptions {
                    min_object_size: DEFAULT_MIN_OBJECT_SIZE,
                    ..DetectorOptions::default()
                },
            },
            display: DisplaySettings {
                width: DEFAULT_DISPLAY_WIDTH,
                height: DEFAULT_DISPLAY_HEIGHT,
            },
        }
    }
}

impl AnnotatorConfig {
    /// Defaults, then the JSON file named by `ANNOTATOR_CONFIG`, then `ANNOTATOR_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ANNOTATOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AnnotatorConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let display = file.display.unwrap_or_default();

        let rotation = match source.rotation_degrees {
            Some(degrees) => Rotation::from_degrees(degrees)?,
            None => defaults.source.rotation,
        };
        let base = defaults.detector.options;
        Ok(Self {
            source: SourceSettings {
                width: source.width.unwrap_or(defaults.source.width),
                height: source.height.unwrap_or(defaults.source.height),
                target_fps: source.target_fps.unwrap_or(defaults.source.target_fps),
                rotation,
                lens: source.lens.unwrap_or(defaults.source.lens),
                pool_buffers: source.pool_buffers.unwrap_or(defaults.source.pool_buffers),
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(defaults.detector.backend),
                options: DetectorOptions {
                    performance_mode: detector.performance_mode.unwrap_or(base.performance_mode),
                    classification: detector.classification.unwrap_or(base.classification),
                    landmarks: detector.landmarks.unwrap_or(base.landmarks),
                    tracking: detector.tracking.unwrap_or(base.tracking),
                    min_object_size: detector.min_object_size.unwrap_or(base.min_object_size),
                },
            },
            display: DisplaySettings {
                width: display.width.unwrap_or(defaults.display.width),
                height: display.height.unwrap_or(defaults.display.height),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("ANNOTATOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(lens) = std::env::var("ANNOTATOR_LENS") {
            if !lens.trim().is_empty() {
                self.source.lens = lens.parse()?;
            }
        }
        if let Ok(rotation) = std::env::var("ANNOTATOR_ROTATION") {
            let degrees: u32 = rotation
                .trim()
                .parse()
                .map_err(|_| anyhow!("ANNOTATOR_ROTATION must be 0, 90, 180 or 270"))?;
            self.source.rotation = Rotation::from_degrees(degrees)?;
        }
        if let Ok(fps) = std::env::var("ANNOTATOR_TARGET_FPS") {
            self.source.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("ANNOTATOR_TARGET_FPS must be an integer"))?;
        }
        if let Ok(size) = std::env::var("ANNOTATOR_MIN_OBJECT_SIZE") {
            self.detector.options.min_object_size = size
                .trim()
                .parse()
                .map_err(|_| anyhow!("ANNOTATOR_MIN_OBJECT_SIZE must be a number"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.source.target_fps == 0 || self.source.target_fps > MAX_TARGET_FPS {
            return Err(anyhow!(
                "source target_fps must be between 1 and {}",
                MAX_TARGET_FPS
            ));
        }
        if self.source.pool_buffers == 0 {
            return Err(anyhow!("source pool_buffers must be at least 1"));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow!("display width and height must be greater than zero"));
        }
        self.detector.backend = self.detector.backend.to_lowercase();
        if self.detector.backend.is_empty() {
            return Err(anyhow!("detector backend must not be empty"));
        }
        self.detector.options.validate()?;
        Ok(())
    }

    /// Camera settings for the synthetic source.
    pub fn synthetic_source(&self) -> SyntheticConfig {
        SyntheticConfig {
            width: self.source.width,
            height: self.source.height,
            rotation: self.source.rotation,
            lens: self.source.lens,
            pool_buffers: self.source.pool_buffers,
            blob_side: self.source.width.min(self.source.height) / 5,
            seed: None,
        }
    }
}

fn read_config_file(path: &Path) -> Result<AnnotatorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
