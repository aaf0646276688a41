use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::config::BLOCK_SIZE;

const N: usize = BLOCK_SIZE * BLOCK_SIZE;

/// An 8x8 block, row-major.
pub type Block = [f64; N];

/// Precomputed orthonormal 8x8 DCT-II basis functions.
///
/// `basis[row * 8 + col]` is the spatial pattern of coefficient (row, col);
/// row is the vertical frequency and col the horizontal one. Forward and
/// inverse transforms are projections onto the same orthonormal basis.
pub struct DctBasis {
    basis: Vec<Block>,
}

impl DctBasis {
    fn new() -> Self {
        let mut basis = Vec::with_capacity(N);
        for row in 0..BLOCK_SIZE {
            for col in 0..BLOCK_SIZE {
                basis.push(dct_basis(col, row));
            }
        }
        Self { basis }
    }

    /// Shared tables, built on first use.
    pub fn get() -> &'static DctBasis {
        static BASIS: OnceLock<DctBasis> = OnceLock::new();
        BASIS.get_or_init(DctBasis::new)
    }

    /// Single coefficient (row, col) of a spatial block.
    pub fn coefficient(&self, block: &Block, row: usize, col: usize) -> f64 {
        block
            .iter()
            .zip(self.basis[row * BLOCK_SIZE + col].iter())
            .map(|(&p, &b)| p * b)
            .sum()
    }

    /// 2-D type-II DCT with orthonormal scaling.
    pub fn forward(&self, block: &Block) -> Block {
        let mut coeffs = [0.0f64; N];
        for (k, c) in coeffs.iter_mut().enumerate() {
            *c = block
                .iter()
                .zip(self.basis[k].iter())
                .map(|(&p, &b)| p * b)
                .sum();
        }
        coeffs
    }

    /// Inverse of [`forward`](Self::forward).
    pub fn inverse(&self, coeffs: &Block) -> Block {
        let mut block = [0.0f64; N];
        for (k, &c) in coeffs.iter().enumerate() {
            if c == 0.0 {
                continue;
            }
            for (p, &b) in block.iter_mut().zip(self.basis[k].iter()) {
                *p += c * b;
            }
        }
        block
    }
}

/// Compute the 8x8 DCT-II basis function for frequency indices (u, v).
/// `u` runs along x (columns), `v` along y (rows).
fn dct_basis(u: usize, v: usize) -> Block {
    let mut basis = [0.0f64; N];
    let cu = if u == 0 { 1.0 / (2.0_f64).sqrt() } else { 1.0 };
    let cv = if v == 0 { 1.0 / (2.0_f64).sqrt() } else { 1.0 };

    for y in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            let cos_x = ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos();
            let cos_y = ((2 * y + 1) as f64 * v as f64 * PI / 16.0).cos();
            basis[y * BLOCK_SIZE + x] = 0.25 * cu * cv * cos_x * cos_y;
        }
    }

    basis
}

/// Copy the 8x8 block at block coordinates (bx, by) out of a row-major plane.
pub fn read_block(plane: &[f64], width: usize, bx: usize, by: usize) -> Block {
    let mut block = [0.0f64; N];
    for row in 0..BLOCK_SIZE {
        let offset = (by * BLOCK_SIZE + row) * width + bx * BLOCK_SIZE;
        block[row * BLOCK_SIZE..(row + 1) * BLOCK_SIZE]
            .copy_from_slice(&plane[offset..offset + BLOCK_SIZE]);
    }
    block
}
