//! Colour-space and frequency transforms shared by the embedders.

pub mod color;
pub mod dct;
pub mod haar;
