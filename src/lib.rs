//! Frame Annotator
//!
//! Real-time detection overlays for a live camera feed.
//!
//! # Architecture
//!
//! A capture worker leases frames from a bounded pool and hands each one to a
//! `DetectionProcessor`. The processor keeps at most one detection in flight and
//! drops frames that arrive while it is busy. Results are projected from
//! upright detection coordinates into display coordinates (scaled, mirrored for
//! front-facing capture) and published to the `OverlayStore` as a single atomic
//! batch. The render context drains completions and paints the latest snapshot.
//!
//! Invariants held by construction:
//!
//! 1. **Exactly-once release**: every frame goes back to its pool exactly once,
//!    whether it was detected, dropped, rejected or discarded during shutdown.
//! 2. **No late writes**: once shutdown begins, no result touches the overlay.
//! 3. **Newest wins**: a result never overwrites one from a later frame.
//! 4. **Whole batches**: readers see the previous batch or the new one, never a mix.
//!
//! # Module Structure
//!
//! - `frame`: frames, rotation and the bounded `FramePool`
//! - `ingest`: frame sources (synthetic camera)
//! - `detect`: detector backends, registry and the asynchronous `DetectionPort`
//! - `overlay`: coordinate space, overlay store and renderer
//! - `processor`: single-in-flight policy and shutdown gating
//! - `dispatch`: completion contexts
//! - `session`: capture worker plus render pump
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod processor;
pub mod session;

pub use config::AnnotatorConfig;
pub use detect::{
    BackendRegistry, Classification, Detection, DetectionPort, DetectorBackend, DetectorOptions,
    Landmark, LandmarkKind, PerformanceMode, Point, Rect,
};
pub use dispatch::{CompletionContext, Immediate, RenderQueue};
pub use error::{PipelineError, Result};
pub use frame::{Frame, FrameGeometry, FramePool, Rotation};
pub use ingest::{FrameSource, LensFacing, SourceEvent, SourceStats, SyntheticConfig, SyntheticSource};
pub use overlay::{
    Canvas, OverlayCoordinateSpace, OverlayGeometry, OverlayRenderer, OverlayStore,
    RecordingCanvas, SourceInfo,
};
pub use processor::{
    DetectionObserver, DetectionProcessor, LogObserver, ProcessorState, ProcessorStats,
};
pub use session::{CameraSession, SessionOptions, SessionReport};
