use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::detect::backend::{DetectionInput, DetectorBackend};
use crate::detect::result::Detection;
use crate::error::{PipelineError, Result};

/// One scripted answer.
#[derive(Clone, Debug)]
pub enum StubStep {
    Detections(Vec<Detection>),
    Fail(String),
}

/// Stub backend for testing. Replays scripted answers, empty once the script runs out.
///
/// A gated stub blocks every call until its `StubGate` lets one through, which
/// keeps a detection in flight for as long as a test needs.
pub struct StubBackend {
    script: Arc<Mutex<VecDeque<StubStep>>>,
    calls: Arc<AtomicU64>,
    gate: Option<Receiver<()>>,
}

/// Test-side handle of a `StubBackend`.
#[derive(Clone)]
pub struct StubHandle {
    script: Arc<Mutex<VecDeque<StubStep>>>,
    calls: Arc<AtomicU64>,
}

/// Releases calls held by a gated `StubBackend`. Dropping it opens the gate for good.
pub struct StubGate {
    tx: Sender<()>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicU64::new(0)),
            gate: None,
        }
    }

    pub fn with_script(steps: impl IntoIterator<Item = StubStep>) -> Self {
        let backend = Self::new();
        if let Ok(mut script) = backend.script.lock() {
            script.extend(steps);
        }
        backend
    }

    pub fn gated(mut self) -> (Self, StubGate) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(rx);
        (self, StubGate { tx })
    }

    pub fn handle(&self) -> StubHandle {
        StubHandle {
            script: self.script.clone(),
            calls: self.calls.clone(),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StubHandle {
    pub fn push(&self, step: StubStep) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }

    /// Number of `detect` calls that have started.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StubGate {
    /// Let one held call complete.
    pub fn release_one(&self) {
        let _ = self.tx.send(());
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _input: &DetectionInput<'_>) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            // Err means the gate was dropped: run freely from then on.
            let _ = gate.recv();
        }
        let step = self
            .script
            .lock()
            .map_err(|_| PipelineError::detection("stub script lock poisoned"))?
            .pop_front();
        match step {
            Some(StubStep::Detections(detections)) => Ok(detections),
            Some(StubStep::Fail(msg)) => Err(PipelineError::Detection(msg)),
            None => Ok(Vec::new()),
        }
    }
}
