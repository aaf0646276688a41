//! Texture-based pixel selection for the spatial embedder.
//!
//! Each pixel is scored on a `patch_size x patch_size` grayscale neighbourhood
//! (borders replicated):
//!
//! ```text
//! score = 1.0 * var(laplacian) + 0.8 * entropy(histogram) + 0.2 * var(gray)
//! ```
//!
//! Busy regions hide LSB changes better, so the highest scores are used first.
//! Scoring costs O(width * height * patch_size^2); rows are scored in parallel.

use image::RgbImage;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config;
use crate::error::{self, Result, StegoError};
use crate::transform::color;

/// Strategy that assigns every pixel a "safe to modify" score.
///
/// Scores are returned row-major, one per pixel. A learned model can be
/// plugged in here without touching the embedders.
pub trait PixelScorer: Sync {
    fn score(&self, image: &RgbImage) -> Result<Vec<f64>>;
}

/// Heuristic scorer built on local Laplacian energy, entropy and variance.
#[derive(Debug, Clone, Copy)]
pub struct TextureScorer {
    pub patch_size: usize,
}

impl Default for TextureScorer {
    fn default() -> Self {
        Self {
            patch_size: config::DEFAULT_PATCH_SIZE,
        }
    }
}

impl TextureScorer {
    pub fn new(patch_size: usize) -> Result<Self> {
        if patch_size == 0 || patch_size % 2 == 0 {
            return Err(StegoError::InvalidGeometry(format!(
                "patch size must be odd and positive, got {patch_size}"
            )));
        }
        Ok(Self { patch_size })
    }
}

impl PixelScorer for TextureScorer {
    fn score(&self, image: &RgbImage) -> Result<Vec<f64>> {
        let (width, height) = (image.width(), image.height());
        error::ensure_dimensions(width, height)?;
        let scorer = Self::new(self.patch_size)?;

        let (w, h) = (width as usize, height as usize);
        let gray = color::grayscale(image);
        let lap = laplacian(&gray, w, h);
        let radius = (scorer.patch_size / 2) as isize;

        let rows: Vec<Vec<f64>> = (0..h)
            .into_par_iter()
            .map(|y| {
                let mut row = Vec::with_capacity(w);
                let mut lap_patch = Vec::with_capacity(scorer.patch_size * scorer.patch_size);
                let mut gray_patch = Vec::with_capacity(scorer.patch_size * scorer.patch_size);
                for x in 0..w {
                    lap_patch.clear();
                    gray_patch.clear();
                    for dy in -radius..=radius {
                        let py = clamp_index(y as isize + dy, h);
                        for dx in -radius..=radius {
                            let px = clamp_index(x as isize + dx, w);
                            lap_patch.push(lap[py * w + px] as f64);
                            gray_patch.push(gray[py * w + px]);
                        }
                    }
                    let gray_values: Vec<f64> = gray_patch.iter().map(|&g| g as f64).collect();

                    row.push(
                        config::LAPLACIAN_WEIGHT * variance(&lap_patch)
                            + config::ENTROPY_WEIGHT * entropy(&mut gray_patch)
                            + config::VARIANCE_WEIGHT * variance(&gray_values),
                    );
                }
                row
            })
            .collect();

        Ok(rows.concat())
    }
}

/// Pick `ceil(payload_bits / (3 * lsb_bits))` coordinates, best score first.
///
/// Equal scores keep scan order (row by row, then column) unless `seed` is
/// given, in which case ties are broken by a shuffle seeded with it. Either
/// way the result is reproducible.
pub fn select_pixels(
    image: &RgbImage,
    payload_bits: usize,
    patch_size: usize,
    lsb_bits: usize,
    seed: Option<u64>,
) -> Result<Vec<(u32, u32)>> {
    select_with(&TextureScorer::new(patch_size)?, image, payload_bits, lsb_bits, seed)
}

/// [`select_pixels`] with an arbitrary scorer.
pub fn select_with<S: PixelScorer + ?Sized>(
    scorer: &S,
    image: &RgbImage,
    payload_bits: usize,
    lsb_bits: usize,
    seed: Option<u64>,
) -> Result<Vec<(u32, u32)>> {
    let (width, height) = (image.width(), image.height());
    error::ensure_dimensions(width, height)?;
    if lsb_bits == 0 || lsb_bits > 8 {
        return Err(StegoError::InvalidGeometry(format!(
            "lsb_bits must be in 1..=8, got {lsb_bits}"
        )));
    }

    let bits_per_pixel = config::RGB_CHANNELS * lsb_bits;
    let total = width as usize * height as usize;
    error::ensure_fits(payload_bits, total * bits_per_pixel)?;
    let count = payload_bits.div_ceil(bits_per_pixel);

    let scores = scorer.score(image)?;
    if scores.len() != total {
        return Err(StegoError::InvalidGeometry(format!(
            "scorer returned {} scores for {total} pixels",
            scores.len()
        )));
    }

    let mut order: Vec<usize> = (0..total).collect();
    if let Some(seed) = seed {
        order.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    // stable: ties keep the order above
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    debug!("selected {count} of {total} pixels for {payload_bits} bits");

    Ok(order
        .into_iter()
        .take(count)
        .map(|i| ((i % width as usize) as u32, (i / width as usize) as u32))
        .collect())
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// 3x3 Laplacian `[0 1 0; 1 -4 1; 0 1 0]` with replicated borders.
fn laplacian(gray: &[u8], w: usize, h: usize) -> Vec<i32> {
    let at = |x: isize, y: isize| gray[clamp_index(y, h) * w + clamp_index(x, w)] as i32;
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h as isize {
        for x in 0..w as isize {
            out.push(at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4 * at(x, y));
        }
    }
    out
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// Shannon entropy (bits) of the value histogram. Sorts `values` in place.
fn entropy(values: &mut [u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let n = values.len() as f64;
    values
        .chunk_by(|a, b| a == b)
        .map(|run| {
            let p = run.len() as f64 / n;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Flat left half, noisy right half.
    fn half_textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if x < width / 2 {
                Rgb([120, 120, 120])
            } else {
                let v = ((x * 97 + y * 31 + x * y * 13) % 200) as u8 + 20;
                Rgb([v, v, v])
            }
        })
    }

    #[test]
    fn test_entropy_and_variance() {
        assert_eq!(entropy(&mut [7; 25]), 0.0);
        assert!((entropy(&mut [0, 1, 2, 3]) - 2.0).abs() < 1e-12);
        assert_eq!(variance(&[3.0; 9]), 0.0);
        assert!((variance(&[0.0, 2.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_image_scores_zero() {
        let img = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        let scores = TextureScorer::default().score(&img).unwrap();
        assert_eq!(scores.len(), 64);
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_count_and_uniqueness() {
        let img = half_textured(32, 16);
        let coords = select_pixels(&img, 100, 5, 1, None).unwrap();
        // ceil(100 / 3)
        assert_eq!(coords.len(), 34);

        let mut sorted = coords.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), coords.len());
        assert!(coords.iter().all(|&(x, y)| x < 32 && y < 16));
    }

    #[test]
    fn test_prefers_textured_region() {
        let img = half_textured(32, 16);
        let coords = select_pixels(&img, 60, 3, 1, None).unwrap();
        // Keep clear of the boundary column where patches straddle both halves.
        assert!(coords.iter().all(|&(x, _)| x >= 14));
    }

    #[test]
    fn test_ties_follow_scan_order() {
        let img = RgbImage::from_pixel(4, 3, Rgb([50, 50, 50]));
        let coords = select_pixels(&img, 15, 5, 1, None).unwrap();
        assert_eq!(coords, vec![(0, 0), (1, 0), (2, 0), (3, 0), (0, 1)]);
    }

    #[test]
    fn test_seeded_ties_are_shuffled_and_reproducible() {
        let img = RgbImage::from_pixel(16, 16, Rgb([50, 50, 50]));
        let scan = select_pixels(&img, 60, 3, 1, None).unwrap();
        let a = select_pixels(&img, 60, 3, 1, Some(9)).unwrap();
        let b = select_pixels(&img, 60, 3, 1, Some(9)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, scan);
        assert_eq!(a.len(), scan.len());
    }

    #[test]
    fn test_seed_does_not_reorder_distinct_scores() {
        let img = half_textured(4, 4);
        struct Ramp;
        impl PixelScorer for Ramp {
            fn score(&self, image: &RgbImage) -> Result<Vec<f64>> {
                Ok((0..image.width() * image.height()).map(|i| i as f64).collect())
            }
        }
        let plain = select_with(&Ramp, &img, 15, 1, None).unwrap();
        let seeded = select_with(&Ramp, &img, 15, 1, Some(3)).unwrap();
        assert_eq!(plain, seeded);
        assert_eq!(plain[0], (3, 3));
    }

    #[test]
    fn test_lsb_bits_shrinks_selection() {
        let img = half_textured(16, 16);
        assert_eq!(select_pixels(&img, 60, 5, 2, None).unwrap().len(), 10);
    }

    #[test]
    fn test_invalid_patch_size() {
        let img = half_textured(8, 8);
        for patch in [0, 4] {
            assert!(matches!(
                select_pixels(&img, 8, patch, 1, None),
                Err(StegoError::InvalidGeometry(_))
            ));
        }
    }

    #[test]
    fn test_too_many_bits() {
        let img = half_textured(4, 4);
        assert!(matches!(
            select_pixels(&img, 4 * 4 * 3 + 1, 3, 1, None),
            Err(StegoError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_custom_scorer() {
        struct Diagonal;
        impl PixelScorer for Diagonal {
            fn score(&self, image: &RgbImage) -> Result<Vec<f64>> {
                let w = image.width();
                Ok((0..image.width() * image.height())
                    .map(|i| if i % w == i / w { 1.0 } else { 0.0 })
                    .collect())
            }
        }
        let img = half_textured(4, 4);
        let coords = select_with(&Diagonal, &img, 12, 1, None).unwrap();
        assert_eq!(coords, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }
}
