//! Detection processor: one long-lived owner of a detection port per camera session.
//!
//! Frame lifecycle:
//! 1. `on_frame` takes ownership of a frame from the capture worker.
//! 2. While shutting down, or while a detection is outstanding, the frame is
//!    released at once and nothing is submitted. Frames are never queued.
//! 3. An accepted frame gets the next sequence number and goes to the port.
//! 4. The completion releases the frame first, then dispatches the result to the
//!    completion context, where it is gated by state and sequence number before
//!    it touches the overlay store. Only then does the processor accept the
//!    next frame.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::detect::{Detection, DetectionPort, DetectorBackend, Rejected};
use crate::dispatch::{CompletionContext, Immediate};
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::overlay::{OverlayCoordinateSpace, OverlayStore, SourceInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessorState {
    Active,
    ShuttingDown,
}

/// Receives recoverable detection errors. Fire-and-forget.
pub trait DetectionObserver: Send + Sync {
    fn on_detection_error(&self, error: &PipelineError);
}

/// Observer that logs errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl DetectionObserver for LogObserver {
    fn on_detection_error(&self, error: &PipelineError) {
        log::error!("detection failed: {}", error);
    }
}

/// Counter snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub accepted: u64,
    pub dropped_busy: u64,
    pub skipped_shutdown: u64,
    pub completed: u64,
    pub failed: u64,
    pub superseded: u64,
    pub discarded_after_shutdown: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    dropped_busy: AtomicU64,
    skipped_shutdown: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    superseded: AtomicU64,
    discarded_after_shutdown: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> ProcessorStats {
        ProcessorStats {
            accepted: self.accepted.load(Ordering::SeqCst),
            dropped_busy: self.dropped_busy.load(Ordering::SeqCst),
            skipped_shutdown: self.skipped_shutdown.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            superseded: self.superseded.load(Ordering::SeqCst),
            discarded_after_shutdown: self.discarded_after_shutdown.load(Ordering::SeqCst),
        }
    }
}

/// State and last applied sequence share one lock with every store write, so
/// nothing reaches the store once `shutdown` has flipped the state.
struct Gate {
    state: ProcessorState,
    last_applied: u64,
}

struct Shared {
    gate: Mutex<Gate>,
    in_flight: AtomicBool,
    next_seq: AtomicU64,
    coords: Mutex<OverlayCoordinateSpace>,
    store: Arc<OverlayStore>,
    context: Arc<dyn CompletionContext>,
    observer: Arc<dyn DetectionObserver>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Runs on the port worker (or inline for a rejected submission).
    ///
    /// The in-flight mark clears after the result is applied on the completion
    /// context: at most one completion is ever pending there.
    fn complete(this: &Arc<Self>, seq: u64, info: SourceInfo, outcome: Result<Vec<Detection>>) {
        let shared = this.clone();
        this.context.dispatch(Box::new(move || {
            shared.apply(seq, info, outcome);
            shared.in_flight.store(false, Ordering::SeqCst);
        }));
    }

    /// Runs on the completion context.
    fn apply(&self, seq: u64, info: SourceInfo, outcome: Result<Vec<Detection>>) {
        let mut gate = lock(&self.gate);
        if gate.state == ProcessorState::ShuttingDown {
            Counters::bump(&self.counters.discarded_after_shutdown);
            log::debug!("discarding result of frame #{} after shutdown", seq);
            return;
        }
        if seq <= gate.last_applied {
            Counters::bump(&self.counters.superseded);
            log::debug!(
                "discarding result of frame #{} (frame #{} already shown)",
                seq,
                gate.last_applied
            );
            return;
        }
        gate.last_applied = seq;

        match outcome {
            Ok(detections) => {
                let projection = lock(&self.coords).projection_for(info);
                let mut batch = self.store.stage();
                batch.clear();
                batch.extend(detections.iter().map(|d| projection.project(d)));
                self.store.publish(batch);
                self.store.request_redraw();
                Counters::bump(&self.counters.completed);
            }
            Err(error) => {
                // Stale detections must not outlive a failed frame.
                self.store.clear();
                self.store.request_redraw();
                Counters::bump(&self.counters.failed);
                drop(gate);
                self.observer.on_detection_error(&error);
            }
        }
    }
}

pub struct DetectionProcessor {
    shared: Arc<Shared>,
    port: DetectionPort,
}

/// Builder for `DetectionProcessor`.
pub struct ProcessorBuilder {
    backend: Box<dyn DetectorBackend>,
    store: Option<Arc<OverlayStore>>,
    context: Arc<dyn CompletionContext>,
    observer: Arc<dyn DetectionObserver>,
    display_size: (u32, u32),
}

impl ProcessorBuilder {
    pub fn store(mut self, store: Arc<OverlayStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context(mut self, context: Arc<dyn CompletionContext>) -> Self {
        self.context = context;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn DetectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn display_size(mut self, width: u32, height: u32) -> Self {
        self.display_size = (width, height);
        self
    }

    /// Open the detection port. Fails with `PipelineError::Setup`.
    pub fn build(self) -> Result<DetectionProcessor> {
        let port = DetectionPort::open(self.backend)?;
        let (width, height) = self.display_size;
        let shared = Arc::new(Shared {
            gate: Mutex::new(Gate {
                state: ProcessorState::Active,
                last_applied: 0,
            }),
            in_flight: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            coords: Mutex::new(OverlayCoordinateSpace::new(width, height)),
            store: self.store.unwrap_or_default(),
            context: self.context,
            observer: self.observer,
            counters: Counters::default(),
        });
        log::info!(
            "detection processor ready (backend={}, display={}x{})",
            port.backend_name(),
            width,
            height
        );
        Ok(DetectionProcessor { shared, port })
    }
}

impl DetectionProcessor {
    /// Start building a processor around `backend`.
    ///
    /// Defaults: a fresh store, inline completion, errors logged, 640x480 display.
    pub fn builder(backend: Box<dyn DetectorBackend>) -> ProcessorBuilder {
        ProcessorBuilder {
            backend,
            store: None,
            context: Arc::new(Immediate),
            observer: Arc::new(LogObserver),
            display_size: (640, 480),
        }
    }

    pub fn state(&self) -> ProcessorState {
        lock(&self.shared.gate).state
    }

    pub fn store(&self) -> &Arc<OverlayStore> {
        &self.shared.store
    }

    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ProcessorStats {
        self.shared.counters.snapshot()
    }

    /// Source reset event: the next frame recomputes the SourceInfo.
    pub fn on_source_changed(&self) {
        lock(&self.shared.coords).on_source_changed();
    }

    pub fn set_display_size(&self, width: u32, height: u32) {
        lock(&self.shared.coords).set_display_size(width, height);
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        lock(&self.shared.coords).source_info()
    }

    /// Take one frame from the capture worker. Never blocks on detection.
    pub fn on_frame(&self, frame: Frame) {
        let shared = &self.shared;
        if self.state() == ProcessorState::ShuttingDown {
            Counters::bump(&shared.counters.skipped_shutdown);
            frame.release();
            return;
        }
        if shared
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            Counters::bump(&shared.counters.dropped_busy);
            log::trace!("frame {} dropped: detection in flight", frame.capture_index);
            frame.release();
            return;
        }

        let info = lock(&shared.coords).prepare(&frame.geometry());
        let seq = shared.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Counters::bump(&shared.counters.accepted);

        let completion_shared = shared.clone();
        let submitted = self.port.submit(
            frame,
            Box::new(move |frame, outcome| {
                frame.release();
                Shared::complete(&completion_shared, seq, info, outcome);
            }),
        );
        if let Err(Rejected { frame, error }) = submitted {
            frame.release();
            Shared::complete(shared, seq, info, Err(error));
        }
    }

    /// Stop accepting frames and release the detector.
    ///
    /// Does not wait for an in-flight detection; its result is discarded when it
    /// arrives, and its frame is still released. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut gate = lock(&self.shared.gate);
            if gate.state == ProcessorState::ShuttingDown {
                return;
            }
            gate.state = ProcessorState::ShuttingDown;
        }
        self.port.close();
        log::info!("detection processor shut down");
    }

    /// `shutdown`, then wait for the detection worker to finish and release its frame.
    pub fn join(&self) -> Result<()> {
        self.shutdown();
        self.port.join()
    }
}

impl Drop for DetectionProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
