//! Frame ingestion sources.
//!
//! A source owns a bounded `FramePool` and emits frames on its own cadence. It
//! never waits for consumers: when every buffer is still leased the capture tick
//! is skipped, so a consumer that leaks frames stalls the source instead of
//! growing memory.
//!
//! Sources report orientation changes as `SourceEvent`s. The pipeline turns
//! them into an explicit source reset on the overlay coordinate space.

pub mod synthetic;

use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::frame::{Frame, FramePool, Rotation};

pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Which way the camera faces. Front-facing capture is mirrored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    #[default]
    Front,
    Back,
}

impl LensFacing {
    pub fn is_mirrored(self) -> bool {
        matches!(self, Self::Front)
    }
}

impl FromStr for LensFacing {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            other => Err(PipelineError::config(format!(
                "lens must be 'front' or 'back', got '{}'",
                other
            ))),
        }
    }
}

/// Something the consumer must react to before the next frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceEvent {
    /// Geometry changed (rotation or lens): overlay source info must be recomputed.
    Changed { rotation: Rotation, mirrored: bool },
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub name: String,
    pub frames_captured: u64,
    /// Capture ticks skipped because every pool buffer was leased.
    pub frames_starved: u64,
}

pub trait FrameSource: Send {
    /// Capture the next frame. `Ok(None)` when no buffer is free this tick.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Device orientation changed.
    fn set_target_rotation(&mut self, rotation: Rotation);

    /// Next pending event, if any.
    fn take_event(&mut self) -> Option<SourceEvent>;

    fn stats(&self) -> SourceStats;

    /// Buffer pool backing this source, when it has one.
    fn frame_pool(&self) -> Option<FramePool> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lens_parses_and_front_is_mirrored() {
        assert_eq!("FRONT".parse::<LensFacing>().unwrap(), LensFacing::Front);
        assert_eq!(" back ".parse::<LensFacing>().unwrap(), LensFacing::Back);
        assert!("side".parse::<LensFacing>().is_err());
        assert!(LensFacing::Front.is_mirrored());
        assert!(!LensFacing::Back.is_mirrored());
    }
}
