//! Iterative graph-cut style foreground/background labeling
//!
//! Energy-minimization segmentation seeded from a coarse trimap: per-class
//! color histograms provide the data term, a Potts-style neighborhood prior
//! provides the smoothness term, and probable labels are re-estimated over a
//! fixed number of sweeps. Definite labels are never flipped.

use crate::error::{PhotoError, Result};
use crate::types::{FaceRegion, SegmentationMask};
use image::RgbImage;

/// Definite background label
pub const LABEL_BGD: u8 = 0;
/// Definite foreground label
pub const LABEL_FGD: u8 = 1;
/// Probable background label
pub const LABEL_PR_BGD: u8 = 2;
/// Probable foreground label
pub const LABEL_PR_FGD: u8 = 3;

/// Color histogram bins per channel (4-bit quantization)
const BINS_PER_CHANNEL: usize = 16;
const BIN_SHIFT: u32 = 4;

/// Tuning for the iterative labeling
#[derive(Debug, Clone, Copy)]
pub struct GrabCutParams {
    /// Number of re-estimation sweeps
    pub iterations: usize,
    /// Minimum foreground and background seed samples required
    pub min_samples: usize,
    /// Weight of the neighborhood smoothness prior
    pub smoothness: f32,
}

impl Default for GrabCutParams {
    fn default() -> Self {
        Self {
            iterations: 8,
            min_samples: 100,
            smoothness: 1.5,
        }
    }
}

/// Coarse pixel labeling used to seed the iterative segmentation
#[derive(Debug, Clone)]
pub struct Trimap {
    labels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Trimap {
    /// All pixels probable background
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            labels: vec![LABEL_PR_BGD; (width * height) as usize],
            width,
            height,
        }
    }

    /// Seed a trimap from a confidence mask
    ///
    /// Values above `fg_hi` become definite foreground, above `fg_lo`
    /// probable foreground, below `bg_hi` definite background; the rest stay
    /// probable background.
    #[must_use]
    pub fn from_mask(mask: &SegmentationMask, fg_hi: u8, fg_lo: u8, bg_hi: u8) -> Self {
        let (width, height) = mask.dimensions;
        let mut trimap = Self::new(width, height);
        for (label, &value) in trimap.labels.iter_mut().zip(mask.data.iter()) {
            *label = if value > fg_hi {
                LABEL_FGD
            } else if value > fg_lo {
                LABEL_PR_FGD
            } else if value < bg_hi {
                LABEL_BGD
            } else {
                LABEL_PR_BGD
            };
        }
        trimap
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Mark every non-definite-foreground pixel of a region as probable foreground
    pub fn mark_probable_foreground(&mut self, region: &FaceRegion) {
        let clamped = region.clamp_to(self.width, self.height);
        for y in clamped.y as u32..clamped.y as u32 + clamped.height {
            for x in clamped.x as u32..clamped.x as u32 + clamped.width {
                let idx = self.index(x, y);
                if self.labels[idx] != LABEL_FGD {
                    self.labels[idx] = LABEL_PR_FGD;
                }
            }
        }
    }

    /// Mark a band along the image border as definite background
    pub fn mark_border_background(&mut self, margin: u32) {
        let margin = margin.min(self.width / 2).min(self.height / 2);
        for y in 0..self.height {
            for x in 0..self.width {
                if x < margin || x >= self.width - margin || y < margin || y >= self.height - margin
                {
                    let idx = self.index(x, y);
                    self.labels[idx] = LABEL_BGD;
                }
            }
        }
    }

    /// Seed sample counts: (foreground, background)
    ///
    /// Foreground counts definite plus probable assignments, background only
    /// definite ones; probable background is the default fill and carries no
    /// evidence.
    #[must_use]
    pub fn sample_counts(&self) -> (usize, usize) {
        let mut fg = 0;
        let mut bg = 0;
        for &label in &self.labels {
            match label {
                LABEL_FGD | LABEL_PR_FGD => fg += 1,
                LABEL_BGD => bg += 1,
                _ => {},
            }
        }
        (fg, bg)
    }

    /// Inject synthetic seed samples: a center block as definite foreground
    /// and a border band as definite background
    pub fn inject_synthetic_samples(&mut self) {
        let half = (self.width.min(self.height) / 4).max(1);
        let center = FaceRegion::new(
            i64::from(self.width / 2) - i64::from(half),
            i64::from(self.height / 2) - i64::from(half),
            half * 2,
            half * 2,
        )
        .clamp_to(self.width, self.height);

        for y in center.y as u32..center.y as u32 + center.height {
            for x in center.x as u32..center.x as u32 + center.width {
                let idx = self.index(x, y);
                self.labels[idx] = LABEL_FGD;
            }
        }

        self.mark_border_background(10);
    }
}

/// Per-class quantized color histogram with Laplace smoothing
struct ColorModel {
    counts: Vec<u32>,
    total: u64,
}

impl ColorModel {
    fn new() -> Self {
        Self {
            counts: vec![0; BINS_PER_CHANNEL * BINS_PER_CHANNEL * BINS_PER_CHANNEL],
            total: 0,
        }
    }

    fn bin(pixel: &image::Rgb<u8>) -> usize {
        let r = (pixel[0] >> BIN_SHIFT) as usize;
        let g = (pixel[1] >> BIN_SHIFT) as usize;
        let b = (pixel[2] >> BIN_SHIFT) as usize;
        (r * BINS_PER_CHANNEL + g) * BINS_PER_CHANNEL + b
    }

    fn add(&mut self, pixel: &image::Rgb<u8>) {
        self.counts[Self::bin(pixel)] += 1;
        self.total += 1;
    }

    fn log_likelihood(&self, pixel: &image::Rgb<u8>) -> f32 {
        let count = f64::from(self.counts[Self::bin(pixel)]);
        let smoothed =
            (count + 1.0) / (self.total as f64 + self.counts.len() as f64);
        smoothed.ln() as f32
    }
}

/// Run the iterative labeling over a seeded trimap
///
/// Returns the union of definite and probable foreground as an 8-bit mask.
///
/// # Errors
/// Returns `PhotoError::Processing` when the trimap does not carry enough
/// foreground/background seed samples for the color statistics; callers may
/// inject synthetic samples and retry (see [`run_with_sample_injection`]).
pub fn run(
    image: &RgbImage,
    trimap: &Trimap,
    params: &GrabCutParams,
) -> Result<SegmentationMask> {
    let (width, height) = image.dimensions();
    if (width, height) != (trimap.width, trimap.height) {
        return Err(PhotoError::processing(format!(
            "Trimap dimensions {}x{} do not match image {}x{}",
            trimap.width, trimap.height, width, height
        )));
    }

    let (fg_samples, bg_samples) = trimap.sample_counts();
    if fg_samples < params.min_samples || bg_samples < params.min_samples {
        return Err(PhotoError::processing(format!(
            "Insufficient graph-cut seed samples (foreground: {fg_samples}, background: {bg_samples})"
        )));
    }

    let mut labels = trimap.labels.clone();
    let mut next_labels = labels.clone();

    for iteration in 0..params.iterations {
        // Re-estimate the per-class color statistics from the current labeling
        let mut fg_model = ColorModel::new();
        let mut bg_model = ColorModel::new();
        for (idx, pixel) in image.pixels().enumerate() {
            match labels[idx] {
                LABEL_FGD | LABEL_PR_FGD => fg_model.add(pixel),
                LABEL_BGD | LABEL_PR_BGD => bg_model.add(pixel),
                _ => {},
            }
        }

        let mut changed = 0usize;
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                let current = labels[idx];
                if current == LABEL_FGD || current == LABEL_BGD {
                    next_labels[idx] = current;
                    continue;
                }

                let pixel = image.get_pixel(x, y);
                let data_term = fg_model.log_likelihood(pixel) - bg_model.log_likelihood(pixel);

                // Potts prior over the 4-neighborhood
                let mut neighbor_balance = 0i32;
                let mut neighbors = 0i32;
                let mut visit = |nx: i64, ny: i64| {
                    if nx >= 0 && ny >= 0 && (nx as u32) < width && (ny as u32) < height {
                        let nidx = (ny as u32 * width + nx as u32) as usize;
                        neighbors += 1;
                        match labels[nidx] {
                            LABEL_FGD | LABEL_PR_FGD => neighbor_balance += 1,
                            _ => neighbor_balance -= 1,
                        }
                    }
                };
                visit(i64::from(x) - 1, i64::from(y));
                visit(i64::from(x) + 1, i64::from(y));
                visit(i64::from(x), i64::from(y) - 1);
                visit(i64::from(x), i64::from(y) + 1);

                let smoothness_term = if neighbors > 0 {
                    params.smoothness * neighbor_balance as f32 / neighbors as f32
                } else {
                    0.0
                };

                let new_label = if data_term + smoothness_term > 0.0 {
                    LABEL_PR_FGD
                } else {
                    LABEL_PR_BGD
                };
                if new_label != current {
                    changed += 1;
                }
                next_labels[idx] = new_label;
            }
        }

        std::mem::swap(&mut labels, &mut next_labels);
        if changed == 0 {
            log::debug!("Graph-cut labeling converged after {} iterations", iteration + 1);
            break;
        }
    }

    let data = labels
        .iter()
        .map(|&label| {
            if label == LABEL_FGD || label == LABEL_PR_FGD {
                255
            } else {
                0
            }
        })
        .collect();

    Ok(SegmentationMask::new(data, (width, height)))
}

/// Run the iterative labeling, injecting synthetic seed samples and retrying
/// once when the trimap statistics are too thin
pub fn run_with_sample_injection(
    image: &RgbImage,
    trimap: &mut Trimap,
    params: &GrabCutParams,
) -> Result<SegmentationMask> {
    match run(image, trimap, params) {
        Ok(mask) => Ok(mask),
        Err(err) => {
            log::warn!("Graph-cut seeding too thin, injecting synthetic samples: {err}");
            trimap.inject_synthetic_samples();
            run(image, trimap, params)
        },
    }
}
