use crate::ecc::EccScheme;

// Framing
pub const SENTINEL: u8 = 0b1111_1110;
pub const LENGTH_HEADER_BITS: usize = 16;
pub const MAX_PAYLOAD_BYTES: usize = u16::MAX as usize;

// Spatial (LSB) parameters
pub const DEFAULT_LSB_BITS: usize = 1;
pub const RGB_CHANNELS: usize = 3;

// Pixel selection
pub const DEFAULT_PATCH_SIZE: usize = 5;
pub const LAPLACIAN_WEIGHT: f64 = 1.0;
pub const ENTROPY_WEIGHT: f64 = 0.8;
pub const VARIANCE_WEIGHT: f64 = 0.2;

// Frequency (DCT) parameters
pub const BLOCK_SIZE: usize = 8;
pub const DEFAULT_COEFFICIENT_STEP: f64 = 12.0;
pub const DCT_MAX_MESSAGE_BYTES: usize = 10_000;

/// Low-frequency AC coefficients (row, col) that carry one bit each per 8x8 block.
pub const EMBED_POSITIONS: [(usize, usize); 4] = [(1, 1), (1, 2), (2, 1), (2, 2)];

// Wavelet (DWT) parameters
/// Bit-planes of |LL| that carry the payload bit.
pub const WAVELET_BIT_PLANES: [u32; 3] = [2, 3, 4];
pub const WAVELET_REPETITION: usize = 3;

// Error correction
pub const DEFAULT_NSYM: usize = 32;
pub const RS_CODEWORD_LEN: usize = 255;
pub const REPLICATION_FACTOR: usize = 3;

// Capacity accounting
pub const HEADER_RESERVE_BYTES: usize = 42;

// Corruption simulation
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

// Detection
pub const DEFAULT_SENSITIVITY: u8 = 5;
pub const REGION_SIZE: usize = 16;
pub const PAIR_SAMPLE_LIMIT: usize = 5000;
pub const PAIR_DIFF_WINDOW: usize = 1000;
pub const DETECTOR_SEED: u64 = 0x5EED_0F_D37EC7;

// Sealing: argon2id salt + XChaCha20 nonce + poly1305 tag
pub const SALT_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 24;
pub const AEAD_TAG_SIZE: usize = 16;
pub const SEAL_OVERHEAD: usize = SALT_SIZE + NONCE_SIZE + AEAD_TAG_SIZE;

// Argon2id parameters
pub const ARGON2_MEM_COST: u32 = 19_456; // 19 MiB
pub const ARGON2_TIME_COST: u32 = 2;
pub const ARGON2_PARALLELISM: u32 = 1;
pub const ARGON2_OUTPUT_LEN: usize = 32;

/// Number of complete 8x8 blocks in an image; trailing partial blocks are skipped.
pub fn blocks_per_image(width: u32, height: u32) -> usize {
    (width as usize / BLOCK_SIZE) * (height as usize / BLOCK_SIZE)
}

/// Runtime configuration for an embed/extract/detect operation.
#[derive(Debug, Clone)]
pub struct StegoConfig {
    pub lsb_bits: usize,
    pub patch_size: usize,
    /// Route spatial embedding through the pixel scorer instead of row-major order.
    pub select_pixels: bool,
    /// Shuffle equal pixel scores with this seed instead of keeping scan order.
    pub selection_seed: Option<u64>,
    pub coefficient_step: f64,
    pub ecc: Option<EccScheme>,
    pub header_reserve_bytes: usize,
    pub jpeg_quality: u8,
    pub sensitivity: u8,
}

impl Default for StegoConfig {
    fn default() -> Self {
        Self {
            lsb_bits: DEFAULT_LSB_BITS,
            patch_size: DEFAULT_PATCH_SIZE,
            select_pixels: false,
            selection_seed: None,
            coefficient_step: DEFAULT_COEFFICIENT_STEP,
            ecc: None,
            header_reserve_bytes: HEADER_RESERVE_BYTES,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

impl StegoConfig {
    /// Shorthand for a config that wraps payloads in Reed-Solomon parity.
    pub fn with_reed_solomon(nsym: usize) -> Self {
        Self {
            ecc: Some(EccScheme::ReedSolomon { nsym }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_skip_partial_edges() {
        assert_eq!(blocks_per_image(64, 64), 64);
        assert_eq!(blocks_per_image(15, 17), 2);
        assert_eq!(blocks_per_image(7, 100), 0);
    }

    #[test]
    fn test_seal_overhead() {
        assert_eq!(SEAL_OVERHEAD, 56);
    }
}
