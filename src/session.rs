//! Camera session: capture worker, detection processor and render pump.
//!
//! The capture worker is the only thread that calls `on_frame`. Completions are
//! queued on a `RenderQueue` and applied when the render context calls `pump`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::config::AnnotatorConfig;
use crate::detect::DetectorBackend;
use crate::dispatch::RenderQueue;
use crate::frame::Rotation;
use crate::ingest::{FrameSource, SourceEvent, SourceStats};
use crate::overlay::{Canvas, OverlayRenderer, OverlayStore};
use crate::processor::{DetectionObserver, DetectionProcessor, LogObserver, ProcessorStats};

/// Pause after a source error before the next capture attempt.
const SOURCE_ERROR_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct SessionOptions {
    pub target_fps: u32,
    pub display_width: u32,
    pub display_height: u32,
    pub observer: Arc<dyn DetectionObserver>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            target_fps: 30,
            display_width: 480,
            display_height: 640,
            observer: Arc::new(LogObserver),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &AnnotatorConfig) -> Self {
        Self {
            target_fps: config.source.target_fps,
            display_width: config.display.width,
            display_height: config.display.height,
            ..Self::default()
        }
    }
}

/// Frame pool counters at the end of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolCounters {
    pub leased: u64,
    pub released: u64,
    pub outstanding: u64,
}

#[derive(Clone, Debug)]
pub struct SessionReport {
    pub processor: ProcessorStats,
    pub source: SourceStats,
    pub pool: Option<PoolCounters>,
    pub overlays_visible: usize,
}

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

pub struct CameraSession {
    processor: Arc<DetectionProcessor>,
    queue: Arc<RenderQueue>,
    source: SharedSource,
    renderer: OverlayRenderer,
    running: Arc<AtomicBool>,
    capture: Option<JoinHandle<()>>,
}

impl CameraSession {
    pub fn start<S>(source: S, backend: Box<dyn DetectorBackend>, options: SessionOptions) -> Result<Self>
    where
        S: FrameSource + 'static,
    {
        if options.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        let queue = Arc::new(RenderQueue::new());
        let processor = DetectionProcessor::builder(backend)
            .context(queue.clone())
            .observer(options.observer.clone())
            .display_size(options.display_width, options.display_height)
            .build()?;
        let processor = Arc::new(processor);
        let source: SharedSource = Arc::new(Mutex::new(Box::new(source)));
        let running = Arc::new(AtomicBool::new(true));

        let period = Duration::from_secs_f64(1.0 / options.target_fps as f64);
        let capture = {
            let processor = processor.clone();
            let source = source.clone();
            let running = running.clone();
            std::thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || capture_loop(source, processor, running, period))
                .map_err(|e| anyhow!("failed to spawn capture worker: {}", e))?
        };

        log::info!(
            "camera session started ({} fps, display {}x{})",
            options.target_fps,
            options.display_width,
            options.display_height
        );
        Ok(Self {
            processor,
            queue,
            source,
            renderer: OverlayRenderer::new(),
            running,
            capture: Some(capture),
        })
    }

    /// Render-context tick: apply queued completions, then redraw if needed.
    pub fn pump(&self, canvas: &mut dyn Canvas) -> bool {
        self.queue.run_pending();
        self.renderer.render_if_dirty(self.processor.store(), canvas)
    }

    /// Device orientation changed.
    pub fn rotate(&self, rotation: Rotation) {
        lock_source(&self.source).set_target_rotation(rotation);
    }

    pub fn set_display_size(&self, width: u32, height: u32) {
        self.processor.set_display_size(width, height);
    }

    pub fn store(&self) -> &Arc<OverlayStore> {
        self.processor.store()
    }

    pub fn processor(&self) -> &DetectionProcessor {
        &self.processor
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop capture, shut the processor down and wait for the detector to go idle.
    pub fn stop(mut self) -> Result<SessionReport> {
        self.halt()?;
        // Discarded completions still sit in the queue; run them so they are counted.
        self.queue.run_pending();

        let source = lock_source(&self.source);
        let pool = source.frame_pool().map(|pool| PoolCounters {
            leased: pool.leased(),
            released: pool.released(),
            outstanding: pool.outstanding(),
        });
        let report = SessionReport {
            processor: self.processor.stats(),
            source: source.stats(),
            pool,
            overlays_visible: self.processor.store().snapshot_for_render().len(),
        };
        log::info!(
            "camera session stopped: accepted={} completed={} dropped_busy={}",
            report.processor.accepted,
            report.processor.completed,
            report.processor.dropped_busy
        );
        Ok(report)
    }

    fn halt(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture.take() {
            handle
                .join()
                .map_err(|_| anyhow!("capture worker panicked"))?;
        }
        self.processor.join()?;
        Ok(())
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if let Err(err) = self.halt() {
            log::warn!("camera session teardown: {}", err);
        }
    }
}

fn lock_source(source: &SharedSource) -> std::sync::MutexGuard<'_, Box<dyn FrameSource>> {
    source.lock().unwrap_or_else(PoisonError::into_inner)
}

fn capture_loop(
    source: SharedSource,
    processor: Arc<DetectionProcessor>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    log::debug!("capture worker started ({:?} per frame)", period);
    while running.load(Ordering::SeqCst) {
        let tick = Instant::now();
        let (event, captured) = {
            let mut source = lock_source(&source);
            let event = source.take_event();
            (event, source.next_frame())
        };

        if let Some(SourceEvent::Changed { rotation, mirrored }) = event {
            log::debug!(
                "source changed: rotation={} mirrored={}",
                rotation.degrees(),
                mirrored
            );
            processor.on_source_changed();
        }

        match captured {
            Ok(Some(frame)) => processor.on_frame(frame),
            Ok(None) => {}
            Err(err) => {
                log::warn!("frame capture failed: {}", err);
                std::thread::sleep(SOURCE_ERROR_BACKOFF);
                continue;
            }
        }

        if let Some(remaining) = period.checked_sub(tick.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
    log::debug!("capture worker stopped");
}
