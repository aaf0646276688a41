use thiserror::Error;

use crate::crypto::CryptoError;
use crate::ecc::EccError;

/// Errors raised by the embedding engine.
///
/// Absence of a hidden message is not an error: extractors return `None`.
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("payload too large: need {required_bits} bits, capacity is {capacity_bits} bits")]
    PayloadTooLarge {
        required_bits: usize,
        capacity_bits: usize,
    },
    /// The cover has no value for some carrier that survives 8-bit RGB conversion.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),
    #[error("error correction failed: {0}")]
    EccRecoveryFailed(#[from] EccError),
    #[error("corruption simulation failed: {0}")]
    CorruptionSimulationFailed(#[source] image::ImageError),
    #[error("JPEG quality must be in 1..=100, got {0}")]
    InvalidQuality(u8),
    #[error("detector sensitivity must be in 1..=10, got {0}")]
    InvalidSensitivity(u8),
    #[error("payload sealing failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, StegoError>;

/// Fail with `InvalidGeometry` unless `width` and `height` are both non-zero.
pub(crate) fn ensure_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(StegoError::InvalidGeometry(format!(
            "image dimensions must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Fail with `PayloadTooLarge` when `required_bits` exceeds `capacity_bits`.
pub(crate) fn ensure_fits(required_bits: usize, capacity_bits: usize) -> Result<()> {
    if required_bits > capacity_bits {
        return Err(StegoError::PayloadTooLarge {
            required_bits,
            capacity_bits,
        });
    }
    Ok(())
}
