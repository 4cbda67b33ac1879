use sha2::{Digest, Sha256};

use crate::detect::backend::{DetectionInput, DetectorBackend, DetectorOptions, PerformanceMode};
use crate::detect::result::{Classification, Detection, LandmarkKind, Rect};
use crate::error::{PipelineError, Result};

/// Luma above which a pixel counts as part of a blob.
const BRIGHT_THRESHOLD: u8 = 200;
/// Minimum IoU for a blob to keep the tracking id of a previous one.
const TRACK_IOU: f32 = 0.3;

/// CPU backend that reports bright connected regions of the luma plane.
///
/// Blobs are found on a sampling grid (stride 4 in fast mode, 1 in accurate
/// mode), filtered by `min_object_size`, and tracked across frames by IoU.
/// An unchanged frame (same pixel digest) reuses the previous answer.
pub struct BlobBackend {
    options: DetectorOptions,
    last_digest: Option<[u8; 32]>,
    last_detections: Vec<Detection>,
    tracks: Vec<(u32, Rect)>,
    next_track_id: u32,
}

struct Component {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    cells: u32,
    luma_sum: u64,
}

impl BlobBackend {
    pub fn new(options: DetectorOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            last_digest: None,
            last_detections: Vec::new(),
            tracks: Vec::new(),
            next_track_id: 1,
        })
    }

    fn stride(&self) -> u32 {
        match self.options.performance_mode {
            PerformanceMode::Fast => 4,
            PerformanceMode::Accurate => 1,
        }
    }

    fn components(&self, input: &DetectionInput<'_>) -> Vec<Component> {
        let stride = self.stride();
        let cols = input.width.div_ceil(stride);
        let rows = input.height.div_ceil(stride);
        let luma = |cx: u32, cy: u32| -> u8 {
            let idx = (cy * stride) as usize * input.width as usize + (cx * stride) as usize;
            input.pixels.get(idx).copied().unwrap_or(0)
        };

        let mut visited = vec![false; (cols * rows) as usize];
        let mut found = Vec::new();
        let mut stack = Vec::new();

        for cy in 0..rows {
            for cx in 0..cols {
                let start = (cy * cols + cx) as usize;
                if visited[start] || luma(cx, cy) < BRIGHT_THRESHOLD {
                    continue;
                }
                visited[start] = true;
                stack.push((cx, cy));
                let mut comp = Component {
                    min_x: cx,
                    min_y: cy,
                    max_x: cx,
                    max_y: cy,
                    cells: 0,
                    luma_sum: 0,
                };
                while let Some((x, y)) = stack.pop() {
                    comp.min_x = comp.min_x.min(x);
                    comp.min_y = comp.min_y.min(y);
                    comp.max_x = comp.max_x.max(x);
                    comp.max_y = comp.max_y.max(y);
                    comp.cells += 1;
                    comp.luma_sum += luma(x, y) as u64;

                    let neighbours = [
                        (x.wrapping_sub(1), y),
                        (x + 1, y),
                        (x, y.wrapping_sub(1)),
                        (x, y + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= cols || ny >= rows {
                            continue;
                        }
                        let idx = (ny * cols + nx) as usize;
                        if !visited[idx] && luma(nx, ny) >= BRIGHT_THRESHOLD {
                            visited[idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
                found.push(comp);
            }
        }
        found
    }

    fn to_detection(&self, comp: &Component, input: &DetectionInput<'_>) -> Detection {
        let stride = self.stride();
        let x0 = comp.min_x * stride;
        let y0 = comp.min_y * stride;
        let x1 = ((comp.max_x + 1) * stride).min(input.width);
        let y1 = ((comp.max_y + 1) * stride).min(input.height);
        let buffer_rect = Rect::new(x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32);
        let bounds = input.upright_rect(buffer_rect);

        let mean_luma = comp.luma_sum as f32 / comp.cells.max(1) as f32;
        let grid_cells = (comp.max_x - comp.min_x + 1) * (comp.max_y - comp.min_y + 1);
        let mut classification = Classification::new("blob", mean_luma / 255.0);
        if self.options.classification {
            classification = classification
                .with_attribute("fill", comp.cells as f32 / grid_cells.max(1) as f32);
        }

        let mut detection = Detection::new(bounds, classification);
        if self.options.landmarks {
            detection = detection.with_landmark(
                LandmarkKind::Centroid,
                input.upright_point(buffer_rect.center()),
            );
        }
        detection
    }

    fn assign_tracks(&mut self, detections: &mut [Detection]) {
        let mut next_tracks = Vec::with_capacity(detections.len());
        for detection in detections.iter_mut() {
            let matched = self
                .tracks
                .iter()
                .filter(|(id, _)| !next_tracks.iter().any(|(taken, _)| taken == id))
                .map(|(id, bounds)| (*id, bounds.iou(&detection.bounds)))
                .filter(|(_, iou)| *iou >= TRACK_IOU)
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id);
            let id = matched.unwrap_or_else(|| {
                let id = self.next_track_id;
                self.next_track_id = self.next_track_id.wrapping_add(1).max(1);
                id
            });
            detection.tracking_id = Some(id);
            next_tracks.push((id, detection.bounds));
        }
        self.tracks = next_tracks;
    }
}

impl DetectorBackend for BlobBackend {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn detect(&mut self, input: &DetectionInput<'_>) -> Result<Vec<Detection>> {
        let expected = input.width as usize * input.height as usize;
        if input.pixels.len() < expected {
            return Err(PipelineError::detection(format!(
                "frame buffer holds {} bytes, expected {}x{} = {}",
                input.pixels.len(),
                input.width,
                input.height,
                expected
            )));
        }

        // Same pixels under another rotation land elsewhere in upright space.
        let mut hasher = Sha256::new();
        hasher.update(input.width.to_le_bytes());
        hasher.update(input.height.to_le_bytes());
        hasher.update(input.rotation.degrees().to_le_bytes());
        hasher.update(input.pixels);
        let digest: [u8; 32] = hasher.finalize().into();
        if self.last_digest == Some(digest) {
            return Ok(self.last_detections.clone());
        }

        let (uw, uh) = input.upright_size();
        let min_side = self.options.min_object_size * uw.min(uh) as f32;
        let mut detections: Vec<Detection> = self
            .components(input)
            .iter()
            .map(|comp| self.to_detection(comp, input))
            .filter(|d| d.bounds.w.min(d.bounds.h) >= min_side)
            .collect();

        if self.options.tracking {
            self.assign_tracks(&mut detections);
        }

        self.last_digest = Some(digest);
        self.last_detections = detections.clone();
        Ok(detections)
    }
}
