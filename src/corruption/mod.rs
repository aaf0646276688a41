//! Transmission damage models used to exercise recovery paths.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{Result, StegoError};

/// Re-encode `image` as JPEG at `quality` (1..=100) in memory and decode it again.
pub fn recompress_and_reload(image: &RgbImage, quality: u8) -> Result<RgbImage> {
    if !(1..=100).contains(&quality) {
        return Err(StegoError::InvalidQuality(quality));
    }

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .write_with_encoder(encoder)
        .map_err(StegoError::CorruptionSimulationFailed)?;
    debug!(
        "recompressed {}x{} image to {} JPEG bytes at quality {quality}",
        image.width(),
        image.height(),
        buf.len()
    );

    let reloaded = image::load(Cursor::new(&buf), ImageFormat::Jpeg)
        .map_err(StegoError::CorruptionSimulationFailed)?;
    Ok(reloaded.to_rgb8())
}

/// Flip one random bit in each of `n_flips` distinct bytes.
///
/// Deterministic for a given seed; `n_flips` is capped at `data.len()`.
pub fn random_byte_flips(data: &[u8], n_flips: usize, seed: u64) -> Vec<u8> {
    let mut out = data.to_vec();
    if out.is_empty() {
        return out;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let n = n_flips.min(out.len());
    for i in index::sample(&mut rng, out.len(), n).into_iter() {
        let bit: u32 = rng.gen_range(0..8);
        out[i] ^= 1 << bit;
    }
    out
}

/// Flip the bits at absolute positions (`byte * 8 + bit`, MSB first).
/// Positions past the end are ignored.
pub fn flip_bits(data: &[u8], positions: &[usize]) -> Vec<u8> {
    let mut out = data.to_vec();
    for &pos in positions {
        if let Some(byte) = out.get_mut(pos / 8) {
            *byte ^= 0x80 >> (pos % 8);
        }
    }
    out
}
