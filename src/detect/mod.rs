//! Blind steganalysis.
//!
//! Five statistics are computed from the image alone. Each one that crosses
//! its threshold adds a fixed weight, scaled by `sensitivity / 5`; the sum is
//! clipped to 100.
//!
//! | metric                  | flagged when | weight |
//! |-------------------------|--------------|--------|
//! | LSB entropy             | > 0.85       | 30     |
//! | histogram chi-square    | < 100        | 20     |
//! | LSB bit-plane entropy   | > 0.95       | 25     |
//! | mean 16x16 tile variance| < 100        | 15     |
//! | pixel-pair diff == 1    | > 0.15       | 20     |
//!
//! This is a heuristic. Noisy or heavily processed clean images can score
//! high, and sparse or transform-domain embeddings can score low. Treat the
//! verdict as a hint, never as proof.

use std::fmt;

use image::RgbImage;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{self, StegoConfig};
use crate::error::{self, Result, StegoError};

/// Three-way verdict derived from the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Uncertain,
    Suspicious,
}

impl Verdict {
    /// `< 25` clean, `25..=50` uncertain, `> 50` suspicious.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            Verdict::Clean
        } else if score <= 50.0 {
            Verdict::Uncertain
        } else {
            Verdict::Suspicious
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Clean => "clean",
            Verdict::Uncertain => "uncertain",
            Verdict::Suspicious => "suspicious",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    LsbEntropy,
    HistogramChiSquare,
    BitPlaneRandomness,
    RegionalVariance,
    PixelPairDifference,
}

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::LsbEntropy => "lsb entropy",
            MetricKind::HistogramChiSquare => "histogram chi-square",
            MetricKind::BitPlaneRandomness => "bit-plane randomness",
            MetricKind::RegionalVariance => "regional variance",
            MetricKind::PixelPairDifference => "pixel-pair difference",
        }
    }
}

/// One computed statistic and its contribution to the score.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: f64,
    pub flagged: bool,
    /// Weight added to the score, after sensitivity scaling. Zero when not flagged.
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub metrics: Vec<Metric>,
    /// Mean entropy of bit-planes 0..=7, for reference; not scored.
    pub average_bit_plane_entropy: f64,
    /// Aggregate in `[0, 100]`.
    pub score: f64,
    pub verdict: Verdict,
}

impl DetectionReport {
    pub fn metric(&self, kind: MetricKind) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.kind == kind)
    }
}

impl fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "score {:.1} ({})", self.score, self.verdict)?;
        for m in &self.metrics {
            let mark = if m.flagged { "!" } else { " " };
            writeln!(f, "  {mark} {:<22} {:>12.4}  +{:.1}", m.kind.name(), m.value, m.contribution)?;
        }
        write!(f, "    average bit-plane entropy {:.4}", self.average_bit_plane_entropy)
    }
}

/// Composite LSB steganalysis scorer.
#[derive(Debug, Clone)]
pub struct Detector {
    sensitivity: u8,
    seed: u64,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            sensitivity: config::DEFAULT_SENSITIVITY,
            seed: config::DETECTOR_SEED,
        }
    }
}

impl Detector {
    /// `sensitivity` must be in 1..=10; 5 applies the base weights unchanged.
    pub fn new(sensitivity: u8) -> Result<Self> {
        if !(1..=10).contains(&sensitivity) {
            return Err(StegoError::InvalidSensitivity(sensitivity));
        }
        Ok(Self {
            sensitivity,
            ..Default::default()
        })
    }

    /// Detector at the sensitivity configured in `cfg`.
    pub fn from_config(cfg: &StegoConfig) -> Result<Self> {
        Self::new(cfg.sensitivity)
    }

    /// Seed for the pixel-pair sampler. Reports are reproducible for a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn sensitivity(&self) -> u8 {
        self.sensitivity
    }

    pub fn analyze(&self, image: &RgbImage) -> Result<DetectionReport> {
        error::ensure_dimensions(image.width(), image.height())?;
        let samples: &[u8] = image;
        let factor = self.sensitivity as f64 / 5.0;

        let plane_entropies: Vec<f64> = (0..8).map(|bit| bit_plane_entropy(samples, bit)).collect();
        let average_bit_plane_entropy = plane_entropies.iter().sum::<f64>() / 8.0;

        let lsb = plane_entropies[0];
        let chi2 = chi_square_uniform(samples);
        let tile_variance = mean_tile_variance(image, config::REGION_SIZE);
        let pair_ratio = pair_difference_ratio(image, self.seed);

        let metric = |kind, value: f64, flagged: bool, weight: f64| Metric {
            kind,
            value,
            flagged,
            contribution: if flagged { weight * factor } else { 0.0 },
        };

        let metrics = vec![
            metric(MetricKind::LsbEntropy, lsb, lsb > 0.85, 30.0),
            metric(MetricKind::HistogramChiSquare, chi2, chi2 < 100.0, 20.0),
            metric(MetricKind::BitPlaneRandomness, lsb, lsb > 0.95, 25.0),
            match tile_variance {
                Some(v) => metric(MetricKind::RegionalVariance, v, v < 100.0, 15.0),
                None => metric(MetricKind::RegionalVariance, 0.0, false, 15.0),
            },
            metric(MetricKind::PixelPairDifference, pair_ratio, pair_ratio > 0.15, 20.0),
        ];

        let score = metrics.iter().map(|m| m.contribution).sum::<f64>().min(100.0);
        let verdict = Verdict::from_score(score);
        debug!("detector: score {score:.1} -> {verdict}");

        Ok(DetectionReport {
            metrics,
            average_bit_plane_entropy,
            score,
            verdict,
        })
    }
}

/// Binary entropy (bits) of one bit-plane over all channel values.
fn bit_plane_entropy(samples: &[u8], bit: u32) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let ones = samples.iter().filter(|&&v| (v >> bit) & 1 == 1).count();
    let p = ones as f64 / samples.len() as f64;
    [p, 1.0 - p]
        .iter()
        .filter(|&&q| q > 0.0)
        .map(|&q| -q * q.log2())
        .sum()
}

/// `sum((observed - expected)^2 / expected)` against a flat 256-bin histogram.
fn chi_square_uniform(samples: &[u8]) -> f64 {
    let mut hist = [0u64; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    let expected = samples.len() as f64 / 256.0;
    hist.iter()
        .map(|&o| {
            let d = o as f64 - expected;
            d * d / expected
        })
        .sum()
}

/// Mean variance of all channel values inside each complete tile.
/// `None` when the image holds no complete tile.
fn mean_tile_variance(image: &RgbImage, tile: usize) -> Option<f64> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let (tiles_x, tiles_y) = (w / tile, h / tile);
    if tiles_x == 0 || tiles_y == 0 {
        return None;
    }

    let samples: &[u8] = image;
    let mut total = 0.0;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            for y in ty * tile..(ty + 1) * tile {
                let row = (y * w + tx * tile) * config::RGB_CHANNELS;
                for &v in &samples[row..row + tile * config::RGB_CHANNELS] {
                    let v = v as f64;
                    sum += v;
                    sum_sq += v * v;
                }
            }
            let n = (tile * tile * config::RGB_CHANNELS) as f64;
            let mean = sum / n;
            total += (sum_sq / n - mean * mean).max(0.0);
        }
    }
    Some(total / (tiles_x * tiles_y) as f64)
}

/// Fraction of consecutive random red-channel samples that differ by exactly one.
fn pair_difference_ratio(image: &RgbImage, seed: u64) -> f64 {
    let (w, h) = (image.width(), image.height());
    let sample_size = config::PAIR_SAMPLE_LIMIT.min(w as usize * h as usize / 2);
    let mut rng = StdRng::seed_from_u64(seed);

    let values: Vec<i16> = (0..sample_size.min(config::PAIR_DIFF_WINDOW))
        .map(|_| {
            let (x, y) = (rng.gen_range(0..w), rng.gen_range(0..h));
            image.get_pixel(x, y).0[0] as i16
        })
        .collect();

    if values.len() < 2 {
        return 0.0;
    }
    let ones = values.windows(2).filter(|p| (p[1] - p[0]).abs() == 1).count();
    ones as f64 / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Values on multiples of 4 with broad texture: every LSB is zero.
    fn quantized(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let n = ((x * 7 + y * 3 + x * y) % 16) * 4;
            let base = 40 + ((x + y) % 24) * 4;
            Rgb([(base + n) as u8, (base + 60 - n) as u8, (base + n / 2 * 2) as u8])
        })
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(Verdict::from_score(0.0), Verdict::Clean);
        assert_eq!(Verdict::from_score(24.9), Verdict::Clean);
        assert_eq!(Verdict::from_score(25.0), Verdict::Uncertain);
        assert_eq!(Verdict::from_score(50.0), Verdict::Uncertain);
        assert_eq!(Verdict::from_score(50.1), Verdict::Suspicious);
    }

    #[test]
    fn test_sensitivity_range() {
        assert!(matches!(Detector::new(0), Err(StegoError::InvalidSensitivity(0))));
        assert!(matches!(Detector::new(11), Err(StegoError::InvalidSensitivity(11))));
        assert_eq!(Detector::new(10).unwrap().sensitivity(), 10);
    }

    #[test]
    fn test_from_config() {
        let cfg = StegoConfig {
            sensitivity: 8,
            ..Default::default()
        };
        assert_eq!(Detector::from_config(&cfg).unwrap().sensitivity(), 8);
        let cfg = StegoConfig {
            sensitivity: 0,
            ..Default::default()
        };
        assert!(matches!(Detector::from_config(&cfg), Err(StegoError::InvalidSensitivity(0))));
    }

    #[test]
    fn test_bit_plane_entropy() {
        assert_eq!(bit_plane_entropy(&[0, 2, 4, 6], 0), 0.0);
        assert!((bit_plane_entropy(&[0, 1, 2, 3], 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_chi_square() {
        let flat: Vec<u8> = (0..=255).collect();
        assert_eq!(chi_square_uniform(&flat), 0.0);
        // 256 values in one bin: (256-1)^2/1 + 255 * 1
        assert_eq!(chi_square_uniform(&[9u8; 256]), 255.0 * 255.0 + 255.0);
    }

    #[test]
    fn test_tile_variance() {
        let flat = RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]));
        assert_eq!(mean_tile_variance(&flat, 16), Some(0.0));
        let small = RgbImage::from_pixel(15, 40, Rgb([10, 10, 10]));
        assert_eq!(mean_tile_variance(&small, 16), None);
    }

    #[test]
    fn test_clean_quantized_image() {
        let report = Detector::default().analyze(&quantized(128, 96)).unwrap();
        assert_eq!(report.score, 0.0);
        assert_eq!(report.verdict, Verdict::Clean);
        assert_eq!(report.metric(MetricKind::LsbEntropy).unwrap().value, 0.0);
        assert_eq!(report.metric(MetricKind::PixelPairDifference).unwrap().value, 0.0);
    }

    #[test]
    fn test_random_lsbs_are_flagged_and_scaled() {
        let mut rng = StdRng::seed_from_u64(3);
        let img = RgbImage::from_fn(64, 64, |_, _| {
            Rgb([rng.gen_range(0..2), rng.gen_range(0..2), rng.gen_range(0..2)])
        });

        let base = Detector::new(5).unwrap().analyze(&img).unwrap();
        assert!(base.metric(MetricKind::LsbEntropy).unwrap().flagged);
        assert!(base.metric(MetricKind::BitPlaneRandomness).unwrap().flagged);

        let strict = Detector::new(10).unwrap().analyze(&img).unwrap();
        assert_eq!(strict.score, (base.score * 2.0).min(100.0));
        assert!(strict.score <= 100.0);
    }

    #[test]
    fn test_reproducible() {
        let img = quantized(40, 40);
        let a = Detector::default().analyze(&img).unwrap();
        let b = Detector::default().analyze(&img).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_image() {
        let img = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        let report = Detector::default().analyze(&img).unwrap();
        assert!(!report.metric(MetricKind::RegionalVariance).unwrap().flagged);
        assert_eq!(report.metric(MetricKind::PixelPairDifference).unwrap().value, 0.0);
    }
}
