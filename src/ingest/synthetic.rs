//! Synthetic camera.
//!
//! Renders a bright square drifting over a dark, slightly noisy background into
//! buffers leased from a `FramePool`. Used by the `annotator` binary and tests.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, LensFacing, SourceEvent, SourceStats};
use crate::frame::{Frame, FrameGeometry, FramePool, Rotation};

const BACKGROUND_LUMA: u8 = 24;
const BLOB_LUMA: u8 = 240;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub lens: LensFacing,
    pub pool_buffers: usize,
    /// Side of the bright square, in pixels.
    pub blob_side: u32,
    /// Fixed seed for reproducible noise and motion.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            rotation: Rotation::Deg0,
            lens: LensFacing::Front,
            pool_buffers: 3,
            blob_side: 96,
            seed: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    pool: FramePool,
    rng: StdRng,
    position: (i64, i64),
    velocity: (i64, i64),
    frames_captured: u64,
    frames_starved: u64,
    pending: Option<SourceEvent>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source needs a non-empty frame size"));
        }
        if config.pool_buffers == 0 {
            return Err(anyhow!("synthetic source needs at least one pool buffer"));
        }
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let side = config.blob_side.min(config.width).min(config.height) as i64;
        let position = (
            rng.gen_range(0..=(config.width as i64 - side)),
            rng.gen_range(0..=(config.height as i64 - side)),
        );
        let velocity = (rng.gen_range(2..=6), rng.gen_range(2..=6));
        let pool = FramePool::new(
            config.pool_buffers,
            config.width as usize * config.height as usize,
        );
        // The first frame after start is a source reset.
        let pending = Some(SourceEvent::Changed {
            rotation: config.rotation,
            mirrored: config.lens.is_mirrored(),
        });
        log::info!(
            "synthetic camera {}x{} rot={} lens={:?} ({} buffers)",
            config.width,
            config.height,
            config.rotation.degrees(),
            config.lens,
            config.pool_buffers
        );
        Ok(Self {
            config,
            pool,
            rng,
            position,
            velocity,
            frames_captured: 0,
            frames_starved: 0,
            pending,
        })
    }

    fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.config.width,
            height: self.config.height,
            rotation: self.config.rotation,
            mirrored: self.config.lens.is_mirrored(),
        }
    }

    fn advance(&mut self) {
        let side = self.config.blob_side.min(self.config.width).min(self.config.height) as i64;
        let max_x = self.config.width as i64 - side;
        let max_y = self.config.height as i64 - side;

        let (mut x, mut y) = (self.position.0 + self.velocity.0, self.position.1 + self.velocity.1);
        if x < 0 || x > max_x {
            self.velocity.0 = -self.velocity.0;
            x = x.clamp(0, max_x);
        }
        if y < 0 || y > max_y {
            self.velocity.1 = -self.velocity.1;
            y = y.clamp(0, max_y);
        }
        self.position = (x, y);
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let geometry = self.geometry();
        let index = self.frames_captured + 1;
        let width = self.config.width as usize;
        let side = self.config.blob_side.min(self.config.width).min(self.config.height) as usize;
        let (bx, by) = (self.position.0 as usize, self.position.1 as usize);
        let noise: u64 = self.rng.gen();

        let frame = self.pool.lease(geometry, index, |pixels| {
            for (i, px) in pixels.iter_mut().enumerate() {
                // Cheap per-pixel hash keeps the background from being byte-identical.
                let jitter = ((i as u64).wrapping_mul(0x9E37_79B9) ^ noise) % 8;
                *px = BACKGROUND_LUMA + jitter as u8;
            }
            for row in by..by + side {
                let start = row * width + bx;
                if let Some(line) = pixels.get_mut(start..start + side) {
                    line.fill(BLOB_LUMA);
                }
            }
        });

        match frame {
            Some(frame) => {
                self.frames_captured = index;
                self.advance();
                Ok(Some(frame))
            }
            None => {
                self.frames_starved += 1;
                log::trace!("synthetic camera starved: all {} buffers leased", self.pool.capacity());
                Ok(None)
            }
        }
    }

    fn set_target_rotation(&mut self, rotation: Rotation) {
        if rotation == self.config.rotation {
            return;
        }
        self.config.rotation = rotation;
        self.pending = Some(SourceEvent::Changed {
            rotation,
            mirrored: self.config.lens.is_mirrored(),
        });
        log::info!("synthetic camera rotated to {} degrees", rotation.degrees());
    }

    fn take_event(&mut self) -> Option<SourceEvent> {
        self.pending.take()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            name: "synthetic".to_string(),
            frames_captured: self.frames_captured,
            frames_starved: self.frames_starved,
        }
    }

    fn frame_pool(&self) -> Option<FramePool> {
        Some(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyntheticConfig {
        SyntheticConfig {
            width: 64,
            height: 48,
            pool_buffers: 2,
            blob_side: 16,
            seed: Some(7),
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn starts_with_a_source_reset_event() {
        let mut source = SyntheticSource::new(config()).unwrap();
        assert_eq!(
            source.take_event(),
            Some(SourceEvent::Changed {
                rotation: Rotation::Deg0,
                mirrored: true
            })
        );
        assert_eq!(source.take_event(), None);
    }

    #[test]
    fn skips_ticks_while_pool_is_exhausted() {
        let mut source = SyntheticSource::new(config()).unwrap();
        let a = source.next_frame().unwrap().unwrap();
        let _b = source.next_frame().unwrap().unwrap();
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_starved, 1);

        a.release();
        let c = source.next_frame().unwrap().unwrap();
        assert_eq!(c.capture_index, 3);
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn frames_carry_the_bright_square() {
        let mut source = SyntheticSource::new(config()).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        let bright = frame.pixels().iter().filter(|&&p| p == BLOB_LUMA).count();
        assert_eq!(bright, 16 * 16);
        assert!(frame.mirrored);
    }

    #[test]
    fn rotation_change_emits_event_once() {
        let mut source = SyntheticSource::new(config()).unwrap();
        source.take_event();
        source.set_target_rotation(Rotation::Deg0);
        assert_eq!(source.take_event(), None);

        source.set_target_rotation(Rotation::Deg90);
        assert!(matches!(
            source.take_event(),
            Some(SourceEvent::Changed {
                rotation: Rotation::Deg90,
                ..
            })
        ));
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.rotation, Rotation::Deg90);
    }

    #[test]
    fn rejects_empty_configuration() {
        let mut cfg = config();
        cfg.pool_buffers = 0;
        assert!(SyntheticSource::new(cfg).is_err());
    }
}
