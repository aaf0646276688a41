//! Luma DCT embedding.
//!
//! The Y plane is tiled into complete 8x8 blocks (row-major; partial edge
//! blocks are skipped). Each block carries one bit in each of the AC
//! coefficients at (1,1), (1,2), (2,1) and (2,2). A coefficient holds its bit
//! in the parity of its quantisation index `round(c / step)`; with `step = 1`
//! this is plain integer LSB replacement. Larger steps let the bit survive the
//! inverse transform, RGB rounding and moderate JPEG recompression.
//!
//! Blocks are never clipped after embedding. A block that would leave 0..=255
//! is shifted through its DC term (and, if its range is too wide, has its
//! non-carrier AC terms scaled down). Luma is turned back into RGB with
//! [`color::rgb_with_luma`], which gives up chroma before luma on saturated
//! pixels. Each block is then read back exactly as the decoder will read it
//! and re-aimed if rounding moved a carrier; a cover that still loses bits is
//! rejected with [`StegoError::EmbeddingFailed`].
//!
//! The stream is a 16-bit big-endian length header followed by the message.

use image::{Rgb, RgbImage};
use log::debug;
use rayon::prelude::*;

use crate::bits;
use crate::config::{self, BLOCK_SIZE, EMBED_POSITIONS};
use crate::error::{self, Result, StegoError};
use crate::transform::color::{self, YCbCrPlanes};
use crate::transform::dct::{self, Block, DctBasis};

/// Re-aim rounds per block before the cover is rejected.
const EMBED_ATTEMPTS: usize = 8;
/// Reconstructed luma is kept this far inside 0..=255.
const LUMA_MARGIN: f64 = 1.0;
/// Factors tried on non-carrier AC terms when a block is too wide to fit.
const TEXTURE_SCALES: [f64; 5] = [1.0, 0.75, 0.5, 0.25, 0.0];

type BlockPixels = [[u8; 3]; BLOCK_SIZE * BLOCK_SIZE];

/// Embeddable bits: four per complete 8x8 block.
pub fn capacity_bits(width: u32, height: u32) -> usize {
    config::blocks_per_image(width, height) * EMBED_POSITIONS.len()
}

/// Quantisation index of a coefficient.
fn quantize(coef: f64, step: f64) -> i64 {
    (coef / step).round() as i64
}

/// Move `coef` to the nearest multiple of `step` whose index parity is `bit`.
pub fn embed_bit(coef: f64, bit: u8, step: f64) -> f64 {
    let scaled = coef / step;
    let mut q = scaled.round() as i64;
    if (q & 1) as u8 != bit & 1 {
        q += if scaled >= q as f64 { 1 } else { -1 };
    }
    q as f64 * step
}

/// Bit carried by a coefficient.
pub fn extract_bit(coef: f64, step: f64) -> u8 {
    (quantize(coef, step) & 1) as u8
}

fn check_step(step: f64) -> Result<()> {
    if !(step.is_finite() && step > 0.0) {
        return Err(StegoError::InvalidGeometry(format!(
            "coefficient step must be positive, got {step}"
        )));
    }
    Ok(())
}

fn carrier_index(row: usize, col: usize) -> usize {
    row * BLOCK_SIZE + col
}

fn bounds(block: &Block) -> (f64, f64) {
    block
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)))
}

/// Spatial luma of `coeffs`, moved inside `[LUMA_MARGIN, 255 - LUMA_MARGIN]`
/// without touching any carrier coefficient.
fn fit_luma(dct: &DctBasis, coeffs: &Block) -> Block {
    let carriers = EMBED_POSITIONS.map(|(row, col)| carrier_index(row, col));
    let mut spatial = dct.inverse(coeffs);

    for scale in TEXTURE_SCALES {
        let mut scaled = *coeffs;
        for (k, c) in scaled.iter_mut().enumerate().skip(1) {
            if !carriers.contains(&k) {
                *c *= scale;
            }
        }
        spatial = dct.inverse(&scaled);
        let (lo, hi) = bounds(&spatial);
        if hi - lo <= 255.0 - 2.0 * LUMA_MARGIN {
            break;
        }
    }

    let (lo, hi) = bounds(&spatial);
    let offset = if lo < LUMA_MARGIN {
        LUMA_MARGIN - lo
    } else if hi > 255.0 - LUMA_MARGIN {
        255.0 - LUMA_MARGIN - hi
    } else {
        0.0
    };
    for p in spatial.iter_mut() {
        *p += offset;
    }
    spatial
}

/// Final RGB values of block (bx, by) such that the decoder reads
/// `block_bits` from its carriers.
fn embed_block(planes: &YCbCrPlanes, bx: usize, by: usize, block_bits: &[u8], step: f64) -> Result<BlockPixels> {
    let dct = DctBasis::get();
    let w = planes.width;
    let mut coeffs = dct.forward(&dct::read_block(&planes.y, w, bx, by));

    let targets: Vec<(usize, f64, u8)> = EMBED_POSITIONS
        .iter()
        .zip(block_bits)
        .map(|(&(row, col), &bit)| {
            let k = carrier_index(row, col);
            (k, embed_bit(coeffs[k], bit, step), bit)
        })
        .collect();
    let mut aims: Vec<f64> = targets.iter().map(|&(_, target, _)| target).collect();

    for _ in 0..EMBED_ATTEMPTS {
        for (&(k, _, _), &aim) in targets.iter().zip(&aims) {
            coeffs[k] = aim;
        }
        let luma = fit_luma(dct, &coeffs);

        let mut pixels: BlockPixels = [[0; 3]; BLOCK_SIZE * BLOCK_SIZE];
        let mut seen: Block = [0.0; BLOCK_SIZE * BLOCK_SIZE];
        for (i, (px, y)) in pixels.iter_mut().zip(seen.iter_mut()).enumerate() {
            let p = (by * BLOCK_SIZE + i / BLOCK_SIZE) * w + bx * BLOCK_SIZE + i % BLOCK_SIZE;
            *px = color::rgb_with_luma(luma[i], planes.cb[p], planes.cr[p]);
            *y = color::luma(px[0], px[1], px[2]);
        }

        let mut intact = true;
        for (&(k, target, bit), aim) in targets.iter().zip(aims.iter_mut()) {
            let got = dct.coefficient(&seen, k / BLOCK_SIZE, k % BLOCK_SIZE);
            intact &= extract_bit(got, step) == bit;
            *aim += target - got;
        }
        if intact {
            return Ok(pixels);
        }
    }

    Err(StegoError::EmbeddingFailed(format!(
        "8x8 block ({bx}, {by}) does not keep its bits through 8-bit RGB at step {step}"
    )))
}

/// Hide `payload` in the luma DCT coefficients of `image`.
///
/// Only the blocks that carry stream bits are rewritten; every other pixel is
/// copied from `image`.
pub fn encode(image: &RgbImage, payload: &[u8], step: f64) -> Result<RgbImage> {
    let (width, height) = (image.width(), image.height());
    error::ensure_dimensions(width, height)?;
    check_step(step)?;

    let capacity = capacity_bits(width, height);
    if payload.len() > config::DCT_MAX_MESSAGE_BYTES {
        return Err(StegoError::PayloadTooLarge {
            required_bits: config::LENGTH_HEADER_BITS + payload.len() * 8,
            capacity_bits: capacity
                .min(config::LENGTH_HEADER_BITS + config::DCT_MAX_MESSAGE_BYTES * 8),
        });
    }
    let stream = bits::with_length_header(payload)?;
    error::ensure_fits(stream.len(), capacity)?;

    let blocks_x = width as usize / BLOCK_SIZE;
    let blocks_used = stream.len().div_ceil(EMBED_POSITIONS.len());
    debug!(
        "dct: embedding {} bits into {blocks_used} of {} blocks",
        stream.len(),
        config::blocks_per_image(width, height)
    );

    let planes = YCbCrPlanes::from_rgb(image);
    let blocks: Vec<BlockPixels> = stream
        .par_chunks(EMBED_POSITIONS.len())
        .enumerate()
        .map(|(index, block_bits)| embed_block(&planes, index % blocks_x, index / blocks_x, block_bits, step))
        .collect::<Result<_>>()?;

    let mut out = image.clone();
    for (index, pixels) in blocks.iter().enumerate() {
        let (x0, y0) = ((index % blocks_x) * BLOCK_SIZE, (index / blocks_x) * BLOCK_SIZE);
        for (i, &px) in pixels.iter().enumerate() {
            out.put_pixel((x0 + i % BLOCK_SIZE) as u32, (y0 + i / BLOCK_SIZE) as u32, Rgb(px));
        }
    }
    Ok(out)
}

/// Recover a payload written by [`encode`].
///
/// `None` when the length header is zero, above the message limit, or
/// larger than the image can hold.
pub fn decode(image: &RgbImage, step: f64) -> Option<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 || check_step(step).is_err() {
        return None;
    }
    let capacity = capacity_bits(width, height);
    if capacity < config::LENGTH_HEADER_BITS {
        return None;
    }

    let planes = YCbCrPlanes::from_rgb(image);
    let blocks_x = width as usize / BLOCK_SIZE;
    let header_blocks = config::LENGTH_HEADER_BITS / EMBED_POSITIONS.len();

    let header = read_blocks(&planes, blocks_x, 0..header_blocks, step);
    let length = bits::read_length_header(&header)?;
    if length == 0 || length > config::DCT_MAX_MESSAGE_BYTES {
        debug!("dct: implausible length header {length}");
        return None;
    }

    let total_bits = config::LENGTH_HEADER_BITS + length * 8;
    if total_bits > capacity {
        debug!("dct: length header {length} exceeds capacity");
        return None;
    }

    let blocks_used = total_bits.div_ceil(EMBED_POSITIONS.len());
    let body = read_blocks(&planes, blocks_x, header_blocks..blocks_used, step);
    let needed = total_bits - config::LENGTH_HEADER_BITS;
    Some(bits::from_bits(&body[..needed]))
}

/// [`decode`], rejecting anything that is not printable text.
pub fn decode_text(image: &RgbImage, step: f64) -> Option<String> {
    decode(image, step).and_then(|bytes| bits::printable_text(&bytes))
}

/// Read the four carrier bits of each block in `range`, in block order.
fn read_blocks(
    planes: &YCbCrPlanes,
    blocks_x: usize,
    range: std::ops::Range<usize>,
    step: f64,
) -> Vec<u8> {
    let dct = DctBasis::get();
    let per_block: Vec<[u8; 4]> = range
        .into_par_iter()
        .map(|index| {
            let block = dct::read_block(&planes.y, planes.width, index % blocks_x, index / blocks_x);
            let mut out = [0u8; 4];
            for (slot, &(row, col)) in out.iter_mut().zip(EMBED_POSITIONS.iter()) {
                *slot = extract_bit(dct.coefficient(&block, row, col), step);
            }
            out
        })
        .collect();
    per_block.concat()
}
