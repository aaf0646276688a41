//! Chroma wavelet embedding.
//!
//! One level of Haar DWT on the Cb plane; Y and Cr are left alone. Every
//! stream bit is written into three consecutive LL coefficients, and within
//! each coefficient into bit-planes 2, 3 and 4 of `|round(c)|`. The sign is
//! restored afterwards, so negative coefficients keep their sign. Decoding
//! takes a majority over the three planes of a coefficient, then over the
//! three copies of a bit.
//!
//! Each LL coefficient belongs to exactly one 2x2 pixel block, so the encoder
//! pushes every modified block through the same 8-bit conversion the decoder
//! will see and checks the bit. Where clipped chroma or a rounding carry
//! breaks it, the nearest other magnitude with the right planes is used.
//!
//! The stream is a 16-bit big-endian length header followed by the message.

use image::{Rgb, RgbImage};
use log::debug;
use rayon::prelude::*;

use crate::bits;
use crate::config::{self, WAVELET_BIT_PLANES, WAVELET_REPETITION};
use crate::error::{self, Result, StegoError};
use crate::transform::color::{self, YCbCrPlanes};
use crate::transform::haar::{self, HaarBands};

const PLANE_MASK: i64 = (1 << 2) | (1 << 3) | (1 << 4);
const LOW_MASK: i64 = 0b11;
const CENTRED_LOW: i64 = 0b10;
/// Candidate magnitudes stay below `CANDIDATE_SPANS * 32`; |LL| of an 8-bit
/// image never exceeds 511.
const CANDIDATE_SPANS: i64 = 32;

/// Embeddable bits: `floor(ll_height * ll_width / 3)`.
pub fn capacity_bits(width: u32, height: u32) -> usize {
    (height as usize / 2) * (width as usize / 2) / WAVELET_REPETITION
}

/// Write `bit` into bit-planes 2..=4 of the magnitude of `coef`.
///
/// Bits 0 and 1 are set to `0b10`, so a later error of one step either way
/// leaves the planes alone. The result is an integer with the sign of `coef`
/// and a magnitude of at least 2.
pub fn embed_coefficient(coef: f64, bit: u8) -> f64 {
    let mut magnitude = coef.abs().round() as i64;

    if bit & 1 == 1 {
        magnitude |= PLANE_MASK;
    } else {
        magnitude &= !PLANE_MASK;
    }
    magnitude = (magnitude & !LOW_MASK) | CENTRED_LOW;

    let value = magnitude as f64;
    if coef < 0.0 {
        -value
    } else {
        value
    }
}

/// Majority over bit-planes 2..=4 of `|round(coef)|`.
pub fn extract_coefficient(coef: f64) -> u8 {
    let magnitude = coef.round().abs() as i64;
    let ones = WAVELET_BIT_PLANES
        .iter()
        .filter(|&&plane| (magnitude >> plane) & 1 == 1)
        .count();
    u8::from(ones * 2 > WAVELET_BIT_PLANES.len())
}

/// Values for `coef` that carry `bit`, best first: [`embed_coefficient`],
/// then every magnitude with the right planes, centred low bits first and
/// nearest first. The sign of `coef` is kept throughout.
fn candidates(coef: f64, bit: u8) -> impl Iterator<Item = f64> {
    let current = coef.abs().round() as i64;
    let planes = if bit & 1 == 1 { PLANE_MASK } else { 0 };
    let mut magnitudes: Vec<i64> = (0..CANDIDATE_SPANS)
        .flat_map(|span| (0..=LOW_MASK).map(move |low| (span << 5) | planes | low))
        .collect();
    magnitudes.sort_by_key(|&m| (m & LOW_MASK != CENTRED_LOW, (m - current).abs()));

    let sign = if coef < 0.0 { -1.0 } else { 1.0 };
    std::iter::once(embed_coefficient(coef, bit))
        .chain(magnitudes.into_iter().map(move |m| sign * m as f64))
}

/// Pixels behind LL coefficient (bx, by), in [`haar::approximation`] order.
fn block_pixels(bx: usize, by: usize) -> [(usize, usize); 4] {
    let (x, y) = (2 * bx, 2 * by);
    [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]
}

/// Final RGB values for one block such that the decoder reads `bit` back.
fn embed_block(planes: &YCbCrPlanes, bx: usize, by: usize, coef: f64, bit: u8) -> Option<[[u8; 3]; 4]> {
    let index = block_pixels(bx, by).map(|(x, y)| y * planes.width + x);

    candidates(coef, bit).find_map(|target| {
        // moving LL by d moves each Cb sample of the block by d / 2
        let shift = (target - coef) / 2.0;
        let pixels = index.map(|i| color::to_rgb8(planes.y[i], planes.cb[i] + shift, planes.cr[i]));
        let [p0, p1, p2, p3] = pixels.map(|[r, g, b]| color::cb(r, g, b));
        (extract_coefficient(haar::approximation(p0, p1, p2, p3)) == bit).then_some(pixels)
    })
}

/// Hide `payload` in the Cb wavelet approximation band.
///
/// Only the 2x2 blocks behind used coefficients are rewritten; every other
/// pixel is copied from `image`.
pub fn encode(image: &RgbImage, payload: &[u8]) -> Result<RgbImage> {
    let (width, height) = (image.width(), image.height());
    error::ensure_dimensions(width, height)?;
    if width < 2 || height < 2 {
        return Err(StegoError::InvalidGeometry(format!(
            "wavelet embedding needs at least 2x2 pixels, got {width}x{height}"
        )));
    }

    let stream = bits::with_length_header(payload)?;
    error::ensure_fits(stream.len(), capacity_bits(width, height))?;
    debug!(
        "dwt: embedding {} bits into {} LL coefficients",
        stream.len(),
        stream.len() * WAVELET_REPETITION
    );

    let planes = YCbCrPlanes::from_rgb(image);
    let bands = HaarBands::forward(&planes.cb, planes.width, planes.height);
    let repeated: Vec<u8> = stream
        .iter()
        .flat_map(|&bit| std::iter::repeat(bit).take(WAVELET_REPETITION))
        .collect();

    let blocks: Vec<[[u8; 3]; 4]> = repeated
        .par_iter()
        .enumerate()
        .map(|(index, &bit)| {
            let (bx, by) = (index % bands.half_width, index / bands.half_width);
            embed_block(&planes, bx, by, bands.ll[index], bit).ok_or_else(|| {
                StegoError::EmbeddingFailed(format!(
                    "no value of LL coefficient {index} keeps its bit through 8-bit RGB"
                ))
            })
        })
        .collect::<Result<_>>()?;

    let mut out = image.clone();
    for (index, pixels) in blocks.iter().enumerate() {
        let (bx, by) = (index % bands.half_width, index / bands.half_width);
        for (&(x, y), &px) in block_pixels(bx, by).iter().zip(pixels) {
            out.put_pixel(x as u32, y as u32, Rgb(px));
        }
    }
    Ok(out)
}

/// Recover a payload written by [`encode`].
///
/// `None` when the length header is zero or claims more bits than the band holds.
pub fn decode(image: &RgbImage) -> Option<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    let capacity = capacity_bits(width, height);
    if capacity < config::LENGTH_HEADER_BITS {
        return None;
    }

    let planes = YCbCrPlanes::from_rgb(image);
    let bands = HaarBands::forward(&planes.cb, planes.width, planes.height);
    let voted: Vec<u8> = bands
        .ll
        .chunks_exact(WAVELET_REPETITION)
        .map(|copies| {
            let ones = copies.iter().filter(|&&c| extract_coefficient(c) == 1).count();
            u8::from(ones * 2 > WAVELET_REPETITION)
        })
        .collect();

    let length = bits::read_length_header(&voted)?;
    let total_bits = config::LENGTH_HEADER_BITS + length * 8;
    if length == 0 || total_bits > capacity {
        debug!("dwt: implausible length header {length}");
        return None;
    }

    Some(bits::from_bits(&voted[config::LENGTH_HEADER_BITS..total_bits]))
}

/// [`decode`], rejecting anything that is not printable text.
pub fn decode_text(image: &RgbImage) -> Option<String> {
    decode(image).and_then(|bytes| bits::printable_text(&bytes))
}
