pub mod frequency;
pub mod spatial;
pub mod wavelet;

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use log::info;
use thiserror::Error;

use crate::capacity;
use crate::config::{self, StegoConfig};
use crate::error::{self, Result};
use crate::scorer;

/// The three embedding domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingMethod {
    /// Raw RGB least-significant bits.
    Spatial,
    /// Low-frequency AC coefficients of 8x8 luma DCT blocks.
    Frequency,
    /// Mid bit-planes of the Cb Haar LL band.
    Wavelet,
}

impl EmbeddingMethod {
    pub const ALL: [EmbeddingMethod; 3] = [Self::Spatial, Self::Frequency, Self::Wavelet];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Spatial => "lsb",
            Self::Frequency => "dct",
            Self::Wavelet => "dwt",
        }
    }
}

impl fmt::Display for EmbeddingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown embedding method {0:?} (expected lsb, dct or dwt)")]
pub struct ParseMethodError(String);

impl FromStr for EmbeddingMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lsb" | "spatial" => Ok(Self::Spatial),
            "dct" | "frequency" => Ok(Self::Frequency),
            "dwt" | "wavelet" => Ok(Self::Wavelet),
            _ => Err(ParseMethodError(s.to_string())),
        }
    }
}

/// Where the bits of a plan go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Every pixel, row-major, channels R, G, B.
    RowMajor,
    /// Scorer-chosen pixels, consumed in list order.
    Coordinates(Vec<(u32, u32)>),
    /// The first `blocks_used` complete 8x8 luma blocks of a `blocks_x x blocks_y` grid.
    BlockGrid {
        blocks_x: usize,
        blocks_y: usize,
        blocks_used: usize,
    },
    /// The first `coefficients_used` coefficients of the Cb LL band.
    LlBand { coefficients_used: usize },
}

/// Everything needed to embed one payload into one image.
///
/// `required_bit_capacity` counts framing bits too and never exceeds the
/// method capacity: [`plan`] fails before any pixel is touched otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingPlan {
    pub method: EmbeddingMethod,
    pub lsb_bits: usize,
    pub required_bit_capacity: usize,
    pub placement: Placement,
}

/// Size a payload against `image` and decide where its bits go.
pub fn plan(
    image: &RgbImage,
    method: EmbeddingMethod,
    payload_len: usize,
    cfg: &StegoConfig,
) -> Result<EmbeddingPlan> {
    let (width, height) = (image.width(), image.height());
    let capacity_bits = capacity::method_capacity_bits(method, width, height, cfg.lsb_bits)?;
    let required = payload_len * 8 + capacity::framing_overhead_bits(method);
    error::ensure_fits(required, capacity_bits)?;

    let placement = match method {
        EmbeddingMethod::Spatial if cfg.select_pixels => {
            Placement::Coordinates(scorer::select_pixels(
                image,
                required,
                cfg.patch_size,
                cfg.lsb_bits,
                cfg.selection_seed,
            )?)
        }
        EmbeddingMethod::Spatial => Placement::RowMajor,
        EmbeddingMethod::Frequency => Placement::BlockGrid {
            blocks_x: width as usize / config::BLOCK_SIZE,
            blocks_y: height as usize / config::BLOCK_SIZE,
            blocks_used: required.div_ceil(config::EMBED_POSITIONS.len()),
        },
        EmbeddingMethod::Wavelet => Placement::LlBand {
            coefficients_used: required * config::WAVELET_REPETITION,
        },
    };

    Ok(EmbeddingPlan {
        method,
        lsb_bits: cfg.lsb_bits,
        required_bit_capacity: required,
        placement,
    })
}

/// Embed `payload` according to `plan`, returning a new image.
pub fn embed(image: &RgbImage, payload: &[u8], plan: &EmbeddingPlan, cfg: &StegoConfig) -> Result<RgbImage> {
    info!(
        "embedding {} bytes with {} ({} bits)",
        payload.len(),
        plan.method,
        plan.required_bit_capacity
    );
    match (&plan.placement, plan.method) {
        (Placement::Coordinates(coords), EmbeddingMethod::Spatial) => {
            spatial::embed_at(image, payload, coords, plan.lsb_bits)
        }
        (_, EmbeddingMethod::Spatial) => spatial::embed_row_major(image, payload, plan.lsb_bits),
        (_, EmbeddingMethod::Frequency) => frequency::encode(image, payload, cfg.coefficient_step),
        (_, EmbeddingMethod::Wavelet) => wavelet::encode(image, payload),
    }
}

/// Blind extraction: the receiver knows only the method and configuration.
///
/// Spatial extraction scans row-major for the sentinel; scorer-chosen
/// coordinates cannot be recovered without the plan.
pub fn extract(image: &RgbImage, method: EmbeddingMethod, cfg: &StegoConfig) -> Option<Vec<u8>> {
    match method {
        EmbeddingMethod::Spatial => spatial::extract_row_major(image, cfg.lsb_bits),
        EmbeddingMethod::Frequency => frequency::decode(image, cfg.coefficient_step),
        EmbeddingMethod::Wavelet => wavelet::decode(image),
    }
}

/// Extraction with the plan used at embed time.
///
/// Spatial frames are read to their exact length, so a sentinel byte inside
/// the payload does not truncate it.
pub fn extract_with_plan(image: &RgbImage, plan: &EmbeddingPlan, cfg: &StegoConfig) -> Option<Vec<u8>> {
    match (&plan.placement, plan.method) {
        (Placement::Coordinates(coords), EmbeddingMethod::Spatial) => {
            spatial::extract_frame(image, Some(coords), plan.lsb_bits, plan.required_bit_capacity)
        }
        (_, EmbeddingMethod::Spatial) => {
            spatial::extract_frame(image, None, plan.lsb_bits, plan.required_bit_capacity)
        }
        (_, method) => extract(image, method, cfg),
    }
}
