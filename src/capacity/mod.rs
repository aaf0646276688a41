//! Capacity accounting.
//!
//! [`can_fit_payload`] keeps a flat 42-byte header reserve for every method.
//! [`method_capacity_bits`] and [`framing_overhead_bits`] give the exact
//! per-method figures used when an [`EmbeddingPlan`](crate::embed::EmbeddingPlan)
//! is built.

use crate::config::{self, StegoConfig};
use crate::embed::EmbeddingMethod;
use crate::error::{self, Result, StegoError};

/// Outcome of a capacity query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadFit {
    pub fits: bool,
    /// Capacity left for payload and parity after the header reserve; negative
    /// when the reserve alone exceeds the image capacity.
    pub available_bytes: i64,
}

fn ensure_depth(channels: usize, lsb_bits: usize) -> Result<()> {
    if channels == 0 {
        return Err(StegoError::InvalidGeometry("channel count must be positive".into()));
    }
    if lsb_bits == 0 || lsb_bits > 8 {
        return Err(StegoError::InvalidGeometry(format!(
            "lsb_bits must be in 1..=8, got {lsb_bits}"
        )));
    }
    Ok(())
}

/// Capacity in bytes: `floor(width * height * channels * lsb_bits / 8)`.
pub fn image_capacity_bytes(width: u32, height: u32, channels: usize, lsb_bits: usize) -> Result<usize> {
    error::ensure_dimensions(width, height)?;
    ensure_depth(channels, lsb_bits)?;
    Ok(width as usize * height as usize * channels * lsb_bits / 8)
}

/// Whether `payload_bytes + nsym` fits after reserving `header_reserve_bytes`.
pub fn can_fit_payload(
    image_size: (u32, u32),
    payload_bytes: usize,
    nsym: usize,
    channels: usize,
    lsb_bits: usize,
    header_reserve_bytes: usize,
) -> Result<PayloadFit> {
    let (width, height) = image_size;
    let capacity = image_capacity_bytes(width, height, channels, lsb_bits)?;
    let available_bytes = capacity as i64 - header_reserve_bytes as i64;
    let required = (payload_bytes + nsym) as i64;

    Ok(PayloadFit {
        fits: required <= available_bytes,
        available_bytes,
    })
}

/// [`can_fit_payload`] with the parity, bit depth and reserve taken from `cfg`.
pub fn can_fit_with(image_size: (u32, u32), payload_bytes: usize, cfg: &StegoConfig) -> Result<PayloadFit> {
    let parity = cfg
        .ecc
        .map_or(0, |scheme| scheme.encoded_len(payload_bytes) - payload_bytes);
    can_fit_payload(
        image_size,
        payload_bytes,
        parity,
        config::RGB_CHANNELS,
        cfg.lsb_bits,
        cfg.header_reserve_bytes,
    )
}

/// Raw embeddable bits for `method`, before framing overhead.
pub fn method_capacity_bits(method: EmbeddingMethod, width: u32, height: u32, lsb_bits: usize) -> Result<usize> {
    error::ensure_dimensions(width, height)?;
    let (w, h) = (width as usize, height as usize);

    Ok(match method {
        EmbeddingMethod::Spatial => {
            ensure_depth(config::RGB_CHANNELS, lsb_bits)?;
            w * h * config::RGB_CHANNELS * lsb_bits
        }
        EmbeddingMethod::Frequency => {
            config::blocks_per_image(width, height) * config::EMBED_POSITIONS.len()
        }
        EmbeddingMethod::Wavelet => (h / 2) * (w / 2) / config::WAVELET_REPETITION,
    })
}

/// Bits spent on framing: the sentinel byte or the 16-bit length header.
pub fn framing_overhead_bits(method: EmbeddingMethod) -> usize {
    match method {
        EmbeddingMethod::Spatial => 8,
        EmbeddingMethod::Frequency | EmbeddingMethod::Wavelet => config::LENGTH_HEADER_BITS,
    }
}

/// Largest payload in bytes `method` can carry with exact framing overhead.
pub fn max_payload_bytes(method: EmbeddingMethod, width: u32, height: u32, lsb_bits: usize) -> Result<usize> {
    let bits = method_capacity_bits(method, width, height, lsb_bits)?;
    let bytes = bits.saturating_sub(framing_overhead_bits(method)) / 8;
    Ok(match method {
        EmbeddingMethod::Spatial => bytes,
        EmbeddingMethod::Frequency => bytes.min(config::DCT_MAX_MESSAGE_BYTES),
        EmbeddingMethod::Wavelet => bytes.min(config::MAX_PAYLOAD_BYTES),
    })
}

/// Multi-line summary of a capacity query.
pub fn capacity_report(
    image_size: (u32, u32),
    payload_bytes: usize,
    nsym: usize,
    channels: usize,
    lsb_bits: usize,
    header_reserve_bytes: usize,
) -> Result<String> {
    let fit = can_fit_payload(image_size, payload_bytes, nsym, channels, lsb_bits, header_reserve_bytes)?;
    let (width, height) = image_size;
    let mut report = format!(
        "Image: {width}x{height}, channels={channels}, lsb_bits={lsb_bits}\n\
         Capacity (bytes): {} total, {} available after header\n\
         Payload required (payload+nsym): {} bytes (payload={payload_bytes}, nsym={nsym})\n\
         Fits: {}\n",
        fit.available_bytes + header_reserve_bytes as i64,
        fit.available_bytes,
        payload_bytes + nsym,
        fit.fits,
    );

    for method in EmbeddingMethod::ALL {
        let max = max_payload_bytes(method, width, height, lsb_bits)?;
        report.push_str(&format!("{method}: up to {max} payload bytes\n"));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_fit_with_reads_config() {
        // 20x20 at one bit: 150 bytes, 108 after the default reserve;
        // payloads this short are a single codeword with 32 parity bytes
        let cfg = StegoConfig::with_reed_solomon(32);
        assert!(can_fit_with((20, 20), 76, &cfg).unwrap().fits);
        assert!(!can_fit_with((20, 20), 77, &cfg).unwrap().fits);

        let cfg = StegoConfig {
            header_reserve_bytes: 0,
            ..Default::default()
        };
        let fit = can_fit_with((100, 100), 3750, &cfg).unwrap();
        assert!(fit.fits);
        assert_eq!(fit.available_bytes, 3750);
    }

    #[test]
    fn test_image_capacity_bytes() {
        assert_eq!(image_capacity_bytes(800, 600, 3, 1).unwrap(), 180_000);
        assert_eq!(image_capacity_bytes(3, 1, 3, 1).unwrap(), 1);
        assert_eq!(image_capacity_bytes(10, 10, 3, 2).unwrap(), 75);
    }

    #[test]
    fn test_capacity_is_pure() {
        let a = image_capacity_bytes(123, 77, 3, 2).unwrap();
        let b = image_capacity_bytes(123, 77, 3, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_geometry() {
        for (w, h, c, l) in [(0, 10, 3, 1), (10, 0, 3, 1), (10, 10, 0, 1), (10, 10, 3, 0), (10, 10, 3, 9)] {
            assert!(matches!(
                image_capacity_bytes(w, h, c, l),
                Err(StegoError::InvalidGeometry(_))
            ));
        }
    }

    #[test]
    fn test_fit_boundary() {
        // 64x64x3 / 8 = 1536 bytes, minus 42 reserve = 1494 available.
        let at = can_fit_payload((64, 64), 1494 - 32, 32, 3, 1, 42).unwrap();
        assert!(at.fits);
        assert_eq!(at.available_bytes, 1494);

        let over = can_fit_payload((64, 64), 1494 - 31, 32, 3, 1, 42).unwrap();
        assert!(!over.fits);
    }

    #[test]
    fn test_reserve_larger_than_capacity() {
        let fit = can_fit_payload((4, 4), 0, 0, 3, 1, 42).unwrap();
        assert!(!fit.fits);
        assert_eq!(fit.available_bytes, 6 - 42);
    }

    #[test]
    fn test_method_capacity() {
        assert_eq!(method_capacity_bits(EmbeddingMethod::Spatial, 64, 64, 1).unwrap(), 12_288);
        // 8x6 blocks * 4 coefficients
        assert_eq!(method_capacity_bits(EmbeddingMethod::Frequency, 70, 50, 1).unwrap(), 192);
        // LL is 32x32, one bit per three coefficients
        assert_eq!(method_capacity_bits(EmbeddingMethod::Wavelet, 64, 64, 1).unwrap(), 341);
    }

    #[test]
    fn test_max_payload_bytes() {
        // (12288 - 8) / 8
        assert_eq!(max_payload_bytes(EmbeddingMethod::Spatial, 64, 64, 1).unwrap(), 1535);
        // (341 - 16) / 8
        assert_eq!(max_payload_bytes(EmbeddingMethod::Wavelet, 64, 64, 1).unwrap(), 40);
        // 64 blocks * 4 = 256 bits -> (256 - 16) / 8
        assert_eq!(max_payload_bytes(EmbeddingMethod::Frequency, 64, 64, 1).unwrap(), 30);
    }

    #[test]
    fn test_report_mentions_every_method() {
        let report = capacity_report((800, 600), 256, 32, 3, 1, 42).unwrap();
        assert!(report.contains("Fits: true"));
        assert!(report.contains("lsb:"));
        assert!(report.contains("dct:"));
        assert!(report.contains("dwt:"));
    }
}
