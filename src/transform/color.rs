use image::RgbImage;

/// Full-range BT.601 (JPEG) luma of an RGB triple.
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Full-range BT.601 blue-difference chroma of an RGB triple.
pub fn cb(r: u8, g: u8, b: u8) -> f64 {
    128.0 - 0.168736 * r as f64 - 0.331264 * g as f64 + 0.5 * b as f64
}

/// Full-range BT.601 red-difference chroma of an RGB triple.
pub fn cr(r: u8, g: u8, b: u8) -> f64 {
    128.0 + 0.5 * r as f64 - 0.418688 * g as f64 - 0.081312 * b as f64
}

/// Inverse BT.601 conversion, rounded and clamped to 8 bits.
pub fn to_rgb8(y: f64, cb: f64, cr: f64) -> [u8; 3] {
    unclamped_rgb(y, cb, cr).map(to_u8)
}

fn unclamped_rgb(y: f64, cb: f64, cr: f64) -> [f64; 3] {
    let (cb, cr) = (cb - 128.0, cr - 128.0);
    [y + 1.402 * cr, y - 0.344136 * cb - 0.714136 * cr, y + 1.772 * cb]
}

const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// An 8-bit pixel whose luma is as close to `y` as rounding allows.
///
/// Starts from the BT.601 inverse of `(y, cb, cr)`. When a channel clips, the
/// luma it could not carry is pushed onto the channels that still have
/// headroom, so chroma gives way before luma does. `y` is clamped to 0..=255.
pub fn rgb_with_luma(y: f64, cb: f64, cr: f64) -> [u8; 3] {
    let y = y.clamp(0.0, 255.0);
    let mut rgb = unclamped_rgb(y, cb, cr).map(|c| c.clamp(0.0, 255.0));

    for _ in 0..LUMA_WEIGHTS.len() {
        let deficit = y - rgb.iter().zip(LUMA_WEIGHTS).map(|(c, w)| c * w).sum::<f64>();
        if deficit.abs() < 1e-9 {
            break;
        }
        let movable = |c: f64| if deficit > 0.0 { c < 255.0 } else { c > 0.0 };
        let free_weight: f64 = rgb
            .iter()
            .zip(LUMA_WEIGHTS)
            .filter(|(&c, _)| movable(c))
            .map(|(_, w)| w)
            .sum();
        if free_weight == 0.0 {
            break;
        }
        let shift = deficit / free_weight;
        for c in rgb.iter_mut().filter(|c| movable(**c)) {
            *c = (*c + shift).clamp(0.0, 255.0);
        }
    }

    rgb.map(to_u8)
}

/// Luma rounded to 8 bits.
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    luma(r, g, b).round().clamp(0.0, 255.0) as u8
}

/// An image split into floating-point Y, Cb and Cr planes, row-major.
///
/// Planes stay unquantised so that a plane left untouched converts back to
/// the original RGB values exactly after rounding.
#[derive(Debug, Clone)]
pub struct YCbCrPlanes {
    pub width: usize,
    pub height: usize,
    pub y: Vec<f64>,
    pub cb: Vec<f64>,
    pub cr: Vec<f64>,
}

impl YCbCrPlanes {
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let n = width * height;
        let mut y = Vec::with_capacity(n);
        let mut cb = Vec::with_capacity(n);
        let mut cr = Vec::with_capacity(n);

        for px in image.pixels() {
            let [r, g, b] = px.0;
            y.push(luma(r, g, b));
            cb.push(self::cb(r, g, b));
            cr.push(self::cr(r, g, b));
        }

        Self { width, height, y, cb, cr }
    }
}

fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// BT.601 grayscale plane, rounded to 8 bits.
pub fn grayscale(image: &RgbImage) -> Vec<u8> {
    image
        .pixels()
        .map(|px| luma_u8(px.0[0], px.0[1], px.0[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_untouched_planes_roundtrip_exactly() {
        let img = RgbImage::from_fn(16, 9, |x, y| {
            Rgb([(x * 15) as u8, (y * 27) as u8, ((x * y) % 256) as u8])
        });
        let planes = YCbCrPlanes::from_rgb(&img);
        for (i, px) in img.pixels().enumerate() {
            assert_eq!(to_rgb8(planes.y[i], planes.cb[i], planes.cr[i]), px.0);
        }
    }

    #[test]
    fn test_gray_pixel_has_neutral_chroma() {
        let img = RgbImage::from_pixel(1, 1, Rgb([90, 90, 90]));
        let planes = YCbCrPlanes::from_rgb(&img);
        assert!((planes.y[0] - 90.0).abs() < 1e-9);
        assert!((planes.cb[0] - 128.0).abs() < 1e-3);
        assert!((planes.cr[0] - 128.0).abs() < 1e-3);
    }

    #[test]
    fn test_rgb_with_luma_matches_plain_inverse_in_gamut() {
        for px in [[90u8, 140, 30], [12, 200, 250], [128, 128, 128]] {
            let [r, g, b] = px;
            let back = rgb_with_luma(luma(r, g, b), cb(r, g, b), cr(r, g, b));
            assert_eq!(back, px);
        }
    }

    #[test]
    fn test_rgb_with_luma_moves_unsaturated_channels() {
        // pure blue cannot get brighter through B
        let [r, g, b] = [0u8, 0, 255];
        let target = luma(r, g, b) + 10.0;
        let out = rgb_with_luma(target, cb(r, g, b), cr(r, g, b));
        assert_eq!(out[2], 255);
        assert!((luma(out[0], out[1], out[2]) - target).abs() <= 0.5);

        // black can only get brighter, white only darker
        let out = rgb_with_luma(6.0, 128.0, 128.0);
        assert!((luma(out[0], out[1], out[2]) - 6.0).abs() <= 0.5);
        let out = rgb_with_luma(249.0, 128.0, 128.0);
        assert!((luma(out[0], out[1], out[2]) - 249.0).abs() <= 0.5);
    }

    #[test]
    fn test_grayscale_weights() {
        let img = RgbImage::from_pixel(2, 1, Rgb([255, 0, 0]));
        assert_eq!(grayscale(&img), vec![76, 76]);
    }
}
