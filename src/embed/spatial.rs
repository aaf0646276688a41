//! Spatial (LSB) embedding.
//!
//! Bits go into the `lsb_bits` low-order bits of each channel value, lowest
//! bit first, channels in R, G, B order. Pixels are visited row-major or in
//! the order of an explicit coordinate list. The stream is terminated by the
//! 8-bit sentinel `0b11111110`; there is no length header, so a sentinel byte
//! inside the message ends a blind decode early.

use image::RgbImage;
use log::debug;

use crate::bits;
use crate::config;
use crate::error::{self, Result, StegoError};

/// Embeddable bits when every pixel is used.
pub fn capacity_bits(width: u32, height: u32, lsb_bits: usize) -> usize {
    width as usize * height as usize * config::RGB_CHANNELS * lsb_bits
}

/// Hide `payload` in the lowest bit of every channel, row-major.
pub fn encode(image: &RgbImage, payload: &[u8]) -> Result<RgbImage> {
    embed_row_major(image, payload, config::DEFAULT_LSB_BITS)
}

/// Recover a payload written by [`encode`]; `None` when no sentinel is found.
pub fn decode(image: &RgbImage) -> Option<Vec<u8>> {
    extract_row_major(image, config::DEFAULT_LSB_BITS)
}

/// [`decode`], rejecting anything that is not printable text.
pub fn decode_text(image: &RgbImage) -> Option<String> {
    decode(image).and_then(|bytes| bits::printable_text(&bytes))
}

pub fn embed_row_major(image: &RgbImage, payload: &[u8], lsb_bits: usize) -> Result<RgbImage> {
    check_geometry(image, lsb_bits)?;
    let stream = bits::with_sentinel(payload);
    error::ensure_fits(stream.len(), capacity_bits(image.width(), image.height(), lsb_bits))?;

    let pixels = 0..pixel_count(image);
    Ok(write_bits(image, pixels, lsb_bits, &stream))
}

pub fn extract_row_major(image: &RgbImage, lsb_bits: usize) -> Option<Vec<u8>> {
    if lsb_bits == 0 || lsb_bits > 8 {
        return None;
    }
    let message = bits::take_until_sentinel(read_bits(image, 0..pixel_count(image), lsb_bits))?;
    (!message.is_empty()).then_some(message)
}

/// Hide `payload` at the given pixel coordinates, consumed in order.
///
/// # Panics
///
/// Coordinates outside the image are a caller bug and panic. Duplicate
/// coordinates are checked in debug builds only.
pub fn embed_at(
    image: &RgbImage,
    payload: &[u8],
    coords: &[(u32, u32)],
    lsb_bits: usize,
) -> Result<RgbImage> {
    check_geometry(image, lsb_bits)?;
    check_coordinates(image, coords);

    let stream = bits::with_sentinel(payload);
    error::ensure_fits(stream.len(), coords.len() * config::RGB_CHANNELS * lsb_bits)?;
    debug!("embedding {} bits at {} coordinates", stream.len(), coords.len());

    Ok(write_bits(image, pixel_indices(image, coords), lsb_bits, &stream))
}

/// Recover a payload written by [`embed_at`], scanning for the sentinel.
pub fn extract_at(image: &RgbImage, coords: &[(u32, u32)], lsb_bits: usize) -> Option<Vec<u8>> {
    if lsb_bits == 0 || lsb_bits > 8 {
        return None;
    }
    check_coordinates(image, coords);
    let message =
        bits::take_until_sentinel(read_bits(image, pixel_indices(image, coords), lsb_bits))?;
    (!message.is_empty()).then_some(message)
}

/// Read exactly `frame_bits` bits (payload plus sentinel) and strip the sentinel.
///
/// Used when the receiver knows the frame length, so a sentinel byte inside
/// the payload does not cut it short. `None` when the trailing byte is not the
/// sentinel or the payload is empty.
pub fn extract_frame(
    image: &RgbImage,
    coords: Option<&[(u32, u32)]>,
    lsb_bits: usize,
    frame_bits: usize,
) -> Option<Vec<u8>> {
    if lsb_bits == 0 || lsb_bits > 8 || frame_bits < 16 || frame_bits % 8 != 0 {
        return None;
    }

    let stream: Vec<u8> = match coords {
        Some(coords) => {
            check_coordinates(image, coords);
            read_bits(image, pixel_indices(image, coords), lsb_bits)
                .take(frame_bits)
                .collect()
        }
        None => read_bits(image, 0..pixel_count(image), lsb_bits)
            .take(frame_bits)
            .collect(),
    };
    if stream.len() < frame_bits {
        return None;
    }

    let mut bytes = bits::from_bits(&stream);
    match bytes.pop() {
        Some(config::SENTINEL) => Some(bytes),
        _ => None,
    }
}

fn check_geometry(image: &RgbImage, lsb_bits: usize) -> Result<()> {
    error::ensure_dimensions(image.width(), image.height())?;
    if lsb_bits == 0 || lsb_bits > 8 {
        return Err(StegoError::InvalidGeometry(format!(
            "lsb_bits must be in 1..=8, got {lsb_bits}"
        )));
    }
    Ok(())
}

fn check_coordinates(image: &RgbImage, coords: &[(u32, u32)]) {
    for &(x, y) in coords {
        assert!(
            x < image.width() && y < image.height(),
            "coordinate ({x}, {y}) outside {}x{} image",
            image.width(),
            image.height()
        );
    }
    debug_assert!(
        {
            let mut seen = std::collections::HashSet::with_capacity(coords.len());
            coords.iter().all(|c| seen.insert(*c))
        },
        "duplicate pixel coordinates"
    );
}

fn pixel_count(image: &RgbImage) -> usize {
    image.width() as usize * image.height() as usize
}

fn pixel_indices<'a>(image: &RgbImage, coords: &'a [(u32, u32)]) -> impl Iterator<Item = usize> + 'a {
    let width = image.width() as usize;
    coords.iter().map(move |&(x, y)| y as usize * width + x as usize)
}

/// Subpixel offset and bit position of every slot, in embedding order.
fn slots(pixels: impl Iterator<Item = usize>, lsb_bits: usize) -> impl Iterator<Item = (usize, usize)> {
    pixels.flat_map(move |p| {
        (0..config::RGB_CHANNELS)
            .flat_map(move |c| (0..lsb_bits).map(move |b| (p * config::RGB_CHANNELS + c, b)))
    })
}

fn write_bits(
    image: &RgbImage,
    pixels: impl Iterator<Item = usize>,
    lsb_bits: usize,
    stream: &[u8],
) -> RgbImage {
    let mut out = image.clone();
    let samples: &mut [u8] = &mut out;
    for ((offset, bit_pos), &bit) in slots(pixels, lsb_bits).zip(stream) {
        samples[offset] = (samples[offset] & !(1 << bit_pos)) | ((bit & 1) << bit_pos);
    }
    out
}

fn read_bits<'a>(
    image: &'a RgbImage,
    pixels: impl Iterator<Item = usize> + 'a,
    lsb_bits: usize,
) -> impl Iterator<Item = u8> + 'a {
    let samples: &'a [u8] = image;
    slots(pixels, lsb_bits).map(move |(offset, bit_pos)| (samples[offset] >> bit_pos) & 1)
}
