//! Error types for the annotation pipeline.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the detection pipeline.
///
/// `Setup` is fatal to the processor being built. `Detection` and
/// `PortClosed` are recovered locally: the overlay is cleared and the error is
/// handed to the observer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("detector setup failed: {0}")]
    Setup(String),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("detection port is closed")]
    PortClosed,

    #[error("unsupported rotation: {0} degrees")]
    InvalidRotation(u32),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn setup<S: Into<String>>(msg: S) -> Self {
        Self::Setup(msg.into())
    }

    pub fn detection<S: Into<String>>(msg: S) -> Self {
        Self::Detection(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that only affect the current frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Detection(_) | Self::PortClosed)
    }
}
