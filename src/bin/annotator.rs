//! annotator - run the overlay pipeline against the synthetic camera

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use frame_annotator::{
    AnnotatorConfig, BackendRegistry, CameraSession, LensFacing, RecordingCanvas, Rotation,
    SessionOptions, SyntheticSource,
};

/// Render-context tick.
const PUMP_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// How long to run, in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Capture rate (overrides config).
    #[arg(long)]
    fps: Option<u32>,
    /// Rotate the device by 90 degrees every N seconds.
    #[arg(long)]
    rotate_every: Option<u64>,
    /// Detector backend (overrides config).
    #[arg(long, env = "ANNOTATOR_BACKEND")]
    backend: Option<String>,
    /// Lens facing: front or back (overrides config).
    #[arg(long)]
    lens: Option<LensFacing>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AnnotatorConfig::load()?;
    if let Some(fps) = args.fps {
        if fps == 0 {
            return Err(anyhow!("fps must be >= 1"));
        }
        cfg.source.target_fps = fps;
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.to_lowercase();
    }
    if let Some(lens) = args.lens {
        cfg.source.lens = lens;
    }

    let registry = BackendRegistry::with_builtin();
    let backend = registry.create(&cfg.detector.backend, &cfg.detector.options)?;
    let source = SyntheticSource::new(cfg.synthetic_source())?;
    let session = CameraSession::start(source, backend, SessionOptions::from_config(&cfg))?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.seconds);
    let mut rotation = cfg.source.rotation;
    let mut last_rotation = started;
    let mut canvas = RecordingCanvas::new();
    let mut redraws = 0u64;

    while Instant::now() < deadline && !stop.load(Ordering::SeqCst) {
        if let Some(every) = args.rotate_every.filter(|secs| *secs > 0) {
            if last_rotation.elapsed() >= Duration::from_secs(every) {
                rotation = next_rotation(rotation);
                log::info!("rotating device to {} degrees", rotation.degrees());
                session.rotate(rotation);
                last_rotation = Instant::now();
            }
        }
        if session.pump(&mut canvas) {
            redraws += 1;
            log::debug!("redraw {}: {} boxes", redraws, canvas.rects().count());
            canvas.take_ops();
        }
        std::thread::sleep(PUMP_INTERVAL);
    }
    if stop.load(Ordering::SeqCst) {
        log::info!("shutdown signal received, stopping session...");
    }

    let report = session.stop()?;
    println!("annotator summary:");
    println!("  backend: {}", cfg.detector.backend);
    println!("  frames captured: {}", report.source.frames_captured);
    println!("  frames starved: {}", report.source.frames_starved);
    println!("  detections accepted: {}", report.processor.accepted);
    println!("  dropped while busy: {}", report.processor.dropped_busy);
    println!("  completed: {}", report.processor.completed);
    println!("  failed: {}", report.processor.failed);
    println!("  superseded: {}", report.processor.superseded);
    println!(
        "  discarded after shutdown: {}",
        report.processor.discarded_after_shutdown
    );
    println!("  redraws: {}", redraws);
    println!("  overlays visible at exit: {}", report.overlays_visible);
    if let Some(pool) = report.pool {
        println!(
            "  frame pool: leased={} released={} outstanding={}",
            pool.leased, pool.released, pool.outstanding
        );
    }
    Ok(())
}

fn next_rotation(rotation: Rotation) -> Rotation {
    match rotation {
        Rotation::Deg0 => Rotation::Deg90,
        Rotation::Deg90 => Rotation::Deg180,
        Rotation::Deg180 => Rotation::Deg270,
        Rotation::Deg270 => Rotation::Deg0,
    }
}
