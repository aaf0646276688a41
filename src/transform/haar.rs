//! Single-level orthonormal 2-D Haar transform.
//!
//! Works on the even-sized top-left region of a plane; an odd trailing row or
//! column is carried through untouched by the caller.

/// The four sub-bands of one decomposition level, each `half_width * half_height`.
#[derive(Debug, Clone)]
pub struct HaarBands {
    pub half_width: usize,
    pub half_height: usize,
    pub ll: Vec<f64>,
    pub hl: Vec<f64>,
    pub lh: Vec<f64>,
    pub hh: Vec<f64>,
}

/// LL coefficient of one 2x2 block given as top-left, top-right,
/// bottom-left, bottom-right.
pub fn approximation(a: f64, b: f64, c: f64, d: f64) -> f64 {
    (a + b + c + d) / 2.0
}

impl HaarBands {
    /// Decompose the even-cropped `width x height` region of a row-major plane.
    pub fn forward(plane: &[f64], width: usize, height: usize) -> Self {
        let (half_width, half_height) = (width / 2, height / 2);
        let n = half_width * half_height;
        let mut bands = Self {
            half_width,
            half_height,
            ll: Vec::with_capacity(n),
            hl: Vec::with_capacity(n),
            lh: Vec::with_capacity(n),
            hh: Vec::with_capacity(n),
        };

        for by in 0..half_height {
            for bx in 0..half_width {
                let top = 2 * by * width + 2 * bx;
                let bottom = top + width;
                let (a, b) = (plane[top], plane[top + 1]);
                let (c, d) = (plane[bottom], plane[bottom + 1]);

                bands.ll.push(approximation(a, b, c, d));
                bands.hl.push((a - b + c - d) / 2.0);
                bands.lh.push((a + b - c - d) / 2.0);
                bands.hh.push((a - b - c + d) / 2.0);
            }
        }

        bands
    }
}
