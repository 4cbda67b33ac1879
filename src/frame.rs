//! Frame ownership layer.
//!
//! - `Frame`: Exclusively owned camera frame. Pixels are private; there is no `Clone`.
//! - `FramePool`: Bounded set of reusable buffers owned by the frame source.
//!
//! A frame leased from a pool goes back to that pool exactly once: either through
//! `Frame::release` or when the frame is dropped on any other exit path. Because
//! release consumes the frame, a second release does not compile:
//!
//! ```compile_fail
//! use frame_annotator::{Frame, Rotation};
//!
//! let frame = Frame::new(vec![0; 4], 2, 2, Rotation::Deg0, false);
//! frame.release();
//! frame.release();
//! ```
//!
//! and a frame cannot be duplicated to sneak a second owner past the pool:
//!
//! ```compile_fail
//! use frame_annotator::{Frame, Rotation};
//!
//! let frame = Frame::new(vec![0; 4], 2, 2, Rotation::Deg0, false);
//! let _copy = frame.clone();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::PipelineError;

// ----------------------------------------------------------------------------
// Rotation
// ----------------------------------------------------------------------------

/// Clockwise rotation that makes the sensor buffer upright on the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Result<Self, PipelineError> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(PipelineError::InvalidRotation(other)),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// True for the 90/270 rotation class, where width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Shape metadata of a frame, without the pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub mirrored: bool,
}

impl FrameGeometry {
    /// Dimensions of the frame once rotated upright.
    pub fn upright_size(&self) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured frame: an 8-bit luma plane of `width * height` bytes.
pub struct Frame {
    /// Private pixel data. Only the detection port reads it.
    pixels: Vec<u8>,

    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,

    /// Horizontally flipped relative to the sensor (front-facing capture).
    pub mirrored: bool,

    /// Capture index assigned by the source.
    pub capture_index: u64,

    /// Pool the buffer goes back to. `None` for detached frames.
    pool: Option<Arc<PoolShared>>,
}

// Explicitly NOT implementing Clone: one frame, one owner, one release.

impl Frame {
    /// Build a detached frame that is not backed by a pool.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, rotation: Rotation, mirrored: bool) -> Self {
        Self {
            pixels,
            width,
            height,
            rotation,
            mirrored,
            capture_index: 0,
            pool: None,
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            mirrored: self.mirrored,
        }
    }

    pub(crate) fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Hand the buffer back to its source.
    pub fn release(self) {
        // Drop performs the hand-back.
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.give_back(std::mem::take(&mut self.pixels));
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("mirrored", &self.mirrored)
            .field("capture_index", &self.capture_index)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// FramePool: bounded buffer set owned by the source
// ----------------------------------------------------------------------------

struct PoolShared {
    free: Mutex<Vec<Vec<u8>>>,
    leased: AtomicU64,
    released: AtomicU64,
}

impl PoolShared {
    fn give_back(&self, mut buffer: Vec<u8>) {
        buffer.fill(0);
        // A poisoned lock only loses the buffer for reuse; the release still counts.
        if let Ok(mut free) = self.free.lock() {
            free.push(buffer);
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bounded pool of frame buffers.
///
/// When every buffer is leased the source cannot capture: this is the stall a
/// leaked frame causes, and the counters make it observable.
#[derive(Clone)]
pub struct FramePool {
    shared: Arc<PoolShared>,
    capacity: usize,
}

impl FramePool {
    pub fn new(capacity: usize, buffer_len: usize) -> Self {
        let buffers = (0..capacity).map(|_| vec![0u8; buffer_len]).collect();
        Self {
            shared: Arc::new(PoolShared {
                free: Mutex::new(buffers),
                leased: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
            capacity,
        }
    }

    /// Lease a buffer and let `fill` write the pixels. `None` when the pool is exhausted.
    pub fn lease(
        &self,
        geometry: FrameGeometry,
        capture_index: u64,
        fill: impl FnOnce(&mut [u8]),
    ) -> Option<Frame> {
        let mut pixels = self.shared.free.lock().ok()?.pop()?;
        self.shared.leased.fetch_add(1, Ordering::SeqCst);

        let len = (geometry.width as usize) * (geometry.height as usize);
        pixels.resize(len, 0);
        fill(&mut pixels);

        Some(Frame {
            pixels,
            width: geometry.width,
            height: geometry.height,
            rotation: geometry.rotation,
            mirrored: geometry.mirrored,
            capture_index,
            pool: Some(self.shared.clone()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total buffers handed out.
    pub fn leased(&self) -> u64 {
        self.shared.leased.load(Ordering::SeqCst)
    }

    /// Total buffers handed back.
    pub fn released(&self) -> u64 {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Buffers currently held by consumers.
    pub fn outstanding(&self) -> u64 {
        self.leased().saturating_sub(self.released())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
