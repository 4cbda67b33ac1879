//! Detection port: one detector backend behind a dedicated worker thread.
//!
//! `submit` never blocks on detection. The worker runs one command at a time and
//! hands the frame back to the completion callback together with the result, so
//! the caller decides when the frame is released.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::detect::backend::{DetectionInput, DetectorBackend};
use crate::detect::result::Detection;
use crate::error::{PipelineError, Result};
use crate::frame::Frame;

/// Completion callback. Runs on the port's worker thread.
pub type Completion = Box<dyn FnOnce(Frame, Result<Vec<Detection>>) + Send>;

/// A submission the port refused. The frame comes back to the caller.
pub struct Rejected {
    pub frame: Frame,
    pub error: PipelineError,
}

/// One queued detection. Dropping the sender is the close signal.
struct DetectJob {
    frame: Frame,
    on_complete: Completion,
}

pub struct DetectionPort {
    backend_name: &'static str,
    job_tx: Mutex<Option<Sender<DetectJob>>>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DetectionPort {
    /// Warm the backend up and start the worker. Failures are setup errors.
    pub fn open(mut backend: Box<dyn DetectorBackend>) -> Result<Self> {
        let backend_name = backend.name();
        backend.warm_up().map_err(|e| match e {
            PipelineError::Setup(msg) => PipelineError::Setup(msg),
            other => PipelineError::setup(format!("{} warm-up failed: {}", backend_name, other)),
        })?;

        let (job_tx, job_rx) = mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));
        let worker_closed = closed.clone();
        let worker = std::thread::Builder::new()
            .name(format!("detect-{}", backend_name))
            .spawn(move || run_worker(backend, job_rx, worker_closed))
            .map_err(|e| PipelineError::setup(format!("failed to spawn detection worker: {}", e)))?;

        log::debug!("detection port opened (backend={})", backend_name);
        Ok(Self {
            backend_name,
            job_tx: Mutex::new(Some(job_tx)),
            closed,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue a frame for detection. Returns immediately.
    pub fn submit(&self, frame: Frame, on_complete: Completion) -> std::result::Result<(), Rejected> {
        if self.is_closed() {
            return Err(Rejected {
                frame,
                error: PipelineError::PortClosed,
            });
        }
        let guard = self
            .job_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(Rejected {
                frame,
                error: PipelineError::PortClosed,
            });
        };
        tx.send(DetectJob { frame, on_complete })
            .map_err(|mpsc::SendError(job)| Rejected {
                frame: job.frame,
                error: PipelineError::detection("detection worker has exited"),
            })
    }

    /// Release the backend. Idempotent and non-blocking.
    ///
    /// A detection already running finishes on the worker and its completion still
    /// fires; queued submissions complete with `PortClosed` without reaching the
    /// backend.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // The worker drains what is already queued, then sees the channel hang up.
        drop(
            self.job_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        log::debug!("detection port closed (backend={})", self.backend_name);
    }

    /// Close and wait for the worker to exit. Blocks while a detection is running.
    pub fn join(&self) -> Result<()> {
        self.close();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| PipelineError::detection("detection worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for DetectionPort {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    mut backend: Box<dyn DetectorBackend>,
    job_rx: Receiver<DetectJob>,
    closed: Arc<AtomicBool>,
) {
    let name = backend.name();
    log::debug!("detection worker started (backend={})", name);
    while let Ok(DetectJob { frame, on_complete }) = job_rx.recv() {
        let result = if closed.load(Ordering::SeqCst) {
            Err(PipelineError::PortClosed)
        } else {
            let input = DetectionInput {
                pixels: frame.pixels(),
                width: frame.width,
                height: frame.height,
                rotation: frame.rotation,
            };
            panic::catch_unwind(AssertUnwindSafe(|| backend.detect(&input))).unwrap_or_else(
                |_| Err(PipelineError::detection(format!("backend '{}' panicked", name))),
            )
        };
        on_complete(frame, result);
    }
    // Dropping the backend here releases its resources.
    log::debug!("detection worker stopped (backend={})", name);
}
