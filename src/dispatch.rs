//! Completion contexts: where detection results are applied.
//!
//! Detections complete on the detection port's worker thread, but overlay
//! updates belong on the rendering context. A `CompletionContext` carries each
//! completion task across that boundary.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

pub type Task = Box<dyn FnOnce() + Send>;

pub trait CompletionContext: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Runs tasks inline on the completing thread. For headless use and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl CompletionContext for Immediate {
    fn dispatch(&self, task: Task) {
        task();
    }
}

/// FIFO of tasks drained by the render thread.
pub struct RenderQueue {
    tx: Mutex<Sender<Task>>,
    rx: Mutex<Receiver<Task>>,
}

impl RenderQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
        }
    }

    /// Run every queued task on the calling thread. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ran = 0;
        while let Ok(task) = rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionContext for RenderQueue {
    fn dispatch(&self, task: Task) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        // The receiver lives in `self`, so the send cannot fail.
        let _ = tx.send(task);
    }
}
