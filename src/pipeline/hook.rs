use anyhow::{Context, Result};
use image::RgbImage;

use crate::config::StegoConfig;
use crate::corruption;

/// A hook invoked between encoding and decoding in a [`roundtrip`](super::roundtrip).
///
/// Implement this trait to model what happens to the stego image in transit,
/// for example a social network recompressing uploads.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use image::RgbImage;
/// use stegforge::PipelineHook;
///
/// struct Crop;
///
/// impl PipelineHook for Crop {
///     fn after_encode(&self, image: RgbImage) -> Result<RgbImage> {
///         let (w, h) = image.dimensions();
///         Ok(image::imageops::crop_imm(&image, 0, 0, w / 2, h / 2).to_image())
///     }
/// }
/// ```
pub trait PipelineHook {
    /// Called with the freshly encoded image. Return the image the decoder should read.
    fn after_encode(&self, image: RgbImage) -> Result<RgbImage>;
}

/// A no-op hook that passes the encoded image through unchanged.
///
/// Used as the default when no intermediate steps are needed.
pub struct NoopHook;

impl PipelineHook for NoopHook {
    fn after_encode(&self, image: RgbImage) -> Result<RgbImage> {
        Ok(image)
    }
}

/// Round-trips the encoded image through JPEG at `quality`.
pub struct RecompressHook {
    pub quality: u8,
}

impl From<&StegoConfig> for RecompressHook {
    fn from(cfg: &StegoConfig) -> Self {
        Self {
            quality: cfg.jpeg_quality,
        }
    }
}

impl PipelineHook for RecompressHook {
    fn after_encode(&self, image: RgbImage) -> Result<RgbImage> {
        corruption::recompress_and_reload(&image, self.quality)
            .with_context(|| format!("JPEG recompression at quality {} failed", self.quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_recompress_hook_uses_configured_quality() {
        let cfg = StegoConfig {
            jpeg_quality: 40,
            ..Default::default()
        };
        let hook = RecompressHook::from(&cfg);
        assert_eq!(hook.quality, 40);

        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 90]));
        assert_eq!(hook.after_encode(img).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn test_invalid_configured_quality_fails() {
        let cfg = StegoConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        let img = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        assert!(RecompressHook::from(&cfg).after_encode(img).is_err());
    }
}
