//! Q8_0 quantization kernel (CPU)
//!
//! Q8_0 format: 8-bit quantization with constant scale
//! - Block size: 32 elements
//! - Per block (34 bytes): 2 bytes f16 scale + 32 bytes int8 codes
//! - Dequantization: value = code * scale
//!
//! The scale is computed in f32 and narrowed when stored. Narrowing rounds
//! up so the stored scale still covers the block, and saturates at the
//! largest finite f16 (65504). Blocks with `amax` beyond `127 * 65504`
//! saturate their codes instead of storing an infinite scale.

use half::f16;

use super::common::{self, Q8Layout, Q8_0_BLOCK_BYTES};
use crate::error::ForgeResult;

/// Block layout with a half-precision scale
pub struct Q8_0;

impl Q8Layout for Q8_0 {
    const SCALE_BYTES: usize = 2;
    const BLOCK_BYTES: usize = Q8_0_BLOCK_BYTES;

    #[inline]
    fn store_scale(d: f32, out: &mut [u8]) {
        let mut h = f16::from_f32(d.min(f16::MAX.to_f32()));
        if h.to_f32() < d && h != f16::MAX {
            // also lifts scales below the smallest subnormal off zero
            h = f16::from_bits(h.to_bits() + 1);
        }
        out.copy_from_slice(&h.to_bits().to_le_bytes());
    }

    #[inline]
    fn load_scale(bytes: &[u8]) -> f32 {
        f16::from_bits(u16::from_le_bytes([bytes[0], bytes[1]])).to_f32()
    }
}

/// Quantize a row of floats into Q8_0 blocks
pub fn quantize_row_q8_0(src: &[f32], dst: &mut [u8]) -> ForgeResult<()> {
    common::quantize_blocks::<Q8_0>(src, dst)
}

/// Dequantize Q8_0 blocks into `dst.len()` floats (parallelized with Rayon)
pub fn dequantize_row_q8_0(src: &[u8], dst: &mut [f32]) -> ForgeResult<()> {
    common::dequantize_blocks::<Q8_0>(src, dst)
}

/// Dot product of two Q8_0 rows of `n` logical elements
pub fn vec_dot_q8_0_q8_0(n: usize, x: &[u8], y: &[u8]) -> ForgeResult<f32> {
    common::vec_dot_blocks::<Q8_0>(n, x, y)
}
