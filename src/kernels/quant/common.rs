//! Shared block engine for the 8-bit symmetric formats
//!
//! Q8_0 and Q8_A8 share everything except how the block scale is stored:
//! - Block size: 32 elements
//! - Per block: scale `d` followed by 32 signed 8-bit codes
//! - Quantization: `d = amax / 127`, `code = round(x / d)`
//! - Dequantization: `value = code * d`
//!
//! Scale policy:
//! - the stored scale is the smallest value the layout can represent that
//!   is `>= amax / 127`, saturating at the layout's largest finite scale
//! - a block with `amax > 0` never stores a zero scale
//! - codes are computed against the scale read back from the block, so
//!   `|to_float(quantize(x)) - x| <= d_stored / 2` up to rounding whenever
//!   `amax <= 127 * max_scale`
//! - past that range codes saturate at +-127 and decoding stays finite;
//!   infinite inputs saturate the same way and NaN inputs encode as 0
//!
//! An all-zero block stores `d = 0`, so its codes are all 0 and it decodes
//! to exactly 0.
//!
//! A trailing partial block is zero padded: quantization writes
//! `ceil(k / 32)` blocks and fills the unused codes with 0, dequantization
//! writes only as many values as the destination holds, and the dot product
//! only accumulates the first `n % 32` codes of the last block.

use rayon::prelude::*;

use crate::error::{ForgeError, ForgeResult};

/// Elements per 8-bit block
pub const QK8: usize = 32;

/// Block size for Q8_0 quantization
pub const QK8_0: usize = QK8;

/// Block size for Q8_A8 quantization
pub const QK8_A8: usize = QK8;

/// Bytes of one Q8_0 block: f16 scale + 32 codes
pub const Q8_0_BLOCK_BYTES: usize = 2 + QK8_0;

/// Bytes of one Q8_A8 block: f32 scale + 32 codes
pub const Q8_A8_BLOCK_BYTES: usize = 4 + QK8_A8;

/// Largest code magnitude; `d` maps `amax` onto it
pub const I8_MAX: i8 = 127;

/// How a format serializes its per-block scale.
pub trait Q8Layout {
    /// Bytes occupied by the scale at the start of each block
    const SCALE_BYTES: usize;

    /// Total block size in bytes
    const BLOCK_BYTES: usize = Self::SCALE_BYTES + QK8;

    /// Store the smallest representable scale `>= d`, saturating at the
    /// largest finite one. `d` is finite and non-negative.
    fn store_scale(d: f32, out: &mut [u8]);

    fn load_scale(bytes: &[u8]) -> f32;
}

/// Largest scale whose codes still decode to finite f32 values
pub const MAX_SCALE: f32 = f32::MAX / 128.0;

/// Smallest f32 scale with `d * 127 >= amax`, capped at [`MAX_SCALE`];
/// 0 for an all-zero block
#[inline]
pub fn block_scale(amax: f32) -> f32 {
    if amax.is_nan() || amax <= 0.0 {
        return 0.0;
    }
    let d = amax / I8_MAX as f32;
    if d >= MAX_SCALE {
        return MAX_SCALE;
    }
    if d * (I8_MAX as f32) < amax {
        // rounded down or underflowed to 0
        f32::from_bits(d.to_bits() + 1)
    } else {
        d
    }
}

/// Quantize one value against the stored scale `d`
#[inline]
pub fn quantize_code(x: f32, d: f32) -> i8 {
    if d == 0.0 {
        return 0;
    }
    // NaN stays NaN through clamp and `as` maps it to 0
    (x / d).round().clamp(-(I8_MAX as f32), I8_MAX as f32) as i8
}

/// Dequantizes an 8-bit value to f32
#[inline]
pub fn dequant_q8_to_f32(value: i8, scale: f32) -> f32 {
    (value as f32) * scale
}

/// Number of blocks covering `k` elements
#[inline]
pub fn block_count(k: usize) -> usize {
    k.div_ceil(QK8)
}

fn check_len(expected: usize, actual: usize) -> ForgeResult<()> {
    if actual < expected {
        return Err(ForgeError::BufferTooSmall { expected, actual });
    }
    Ok(())
}

/// Quantize `src` into `ceil(src.len() / 32)` blocks at the start of `dst`
pub fn quantize_blocks<L: Q8Layout>(src: &[f32], dst: &mut [u8]) -> ForgeResult<()> {
    let nblocks = block_count(src.len());
    check_len(nblocks * L::BLOCK_BYTES, dst.len())?;

    dst[..nblocks * L::BLOCK_BYTES]
        .par_chunks_mut(L::BLOCK_BYTES)
        .enumerate()
        .for_each(|(block_idx, block)| {
            let start = block_idx * QK8;
            let end = (start + QK8).min(src.len());
            let xs = &src[start..end];

            let amax = xs.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
            let (scale, codes) = block.split_at_mut(L::SCALE_BYTES);
            L::store_scale(block_scale(amax), scale);
            let d = L::load_scale(scale);

            for (j, code) in codes.iter_mut().enumerate() {
                *code = match xs.get(j) {
                    Some(&x) => quantize_code(x, d) as u8,
                    None => 0,
                };
            }
        });
    Ok(())
}

/// Decode `dst.len()` values from the blocks in `src`
pub fn dequantize_blocks<L: Q8Layout>(src: &[u8], dst: &mut [f32]) -> ForgeResult<()> {
    let nblocks = block_count(dst.len());
    check_len(nblocks * L::BLOCK_BYTES, src.len())?;

    dst.par_chunks_mut(QK8)
        .enumerate()
        .for_each(|(block_idx, out)| {
            let block = &src[block_idx * L::BLOCK_BYTES..(block_idx + 1) * L::BLOCK_BYTES];
            let d = L::load_scale(&block[..L::SCALE_BYTES]);
            let codes = &block[L::SCALE_BYTES..];
            for (value, &q) in out.iter_mut().zip(codes) {
                *value = dequant_q8_to_f32(q as i8, d);
            }
        });
    Ok(())
}

/// Dot product of the first `n` logical elements of two block rows.
///
/// Codes are multiplied as integers per block and scaled once by `dx * dy`.
pub fn vec_dot_blocks<L: Q8Layout>(n: usize, x: &[u8], y: &[u8]) -> ForgeResult<f32> {
    let nblocks = block_count(n);
    let expected = nblocks * L::BLOCK_BYTES;
    check_len(expected, x.len())?;
    check_len(expected, y.len())?;

    let mut sumf = 0.0f32;
    for block_idx in 0..nblocks {
        let bx = &x[block_idx * L::BLOCK_BYTES..(block_idx + 1) * L::BLOCK_BYTES];
        let by = &y[block_idx * L::BLOCK_BYTES..(block_idx + 1) * L::BLOCK_BYTES];
        let len = (n - block_idx * QK8).min(QK8);

        let qx = &bx[L::SCALE_BYTES..L::SCALE_BYTES + len];
        let qy = &by[L::SCALE_BYTES..L::SCALE_BYTES + len];
        let sumi: i32 = qx
            .iter()
            .zip(qy)
            .map(|(&a, &b)| (a as i8 as i32) * (b as i8 as i32))
            .sum();

        let dx = L::load_scale(&bx[..L::SCALE_BYTES]);
        let dy = L::load_scale(&by[..L::SCALE_BYTES]);
        sumf += sumi as f32 * dx * dy;
    }
    Ok(sumf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_scale() {
        assert_eq!(block_scale(127.0), 1.0);
        assert_eq!(block_scale(0.0), 0.0);
        assert_eq!(block_scale(f32::NAN), 0.0);
    }

    #[test]
    fn test_block_scale_covers_amax() {
        for amax in [1e-30f32, 3.3e-6, 0.155, 7.0, 1e7, 3e38] {
            let d = block_scale(amax);
            assert!(d > 0.0 && d.is_finite(), "amax {} gave d {}", amax, d);
            assert!(d * 127.0 >= amax, "amax {} gave d {}", amax, d);
        }
    }

    #[test]
    fn test_block_scale_extremes_stay_finite_and_non_zero() {
        // amax / 127 underflows to 0 in f32
        let tiny = f32::from_bits(1);
        assert_eq!(block_scale(tiny), tiny);
        assert_eq!(block_scale(f32::INFINITY), MAX_SCALE);
        assert!((MAX_SCALE * 127.0).is_finite());
    }

    #[test]
    fn test_quantize_code_rounds_and_saturates() {
        assert_eq!(quantize_code(2.6, 1.0), 3);
        assert_eq!(quantize_code(-2.6, 1.0), -3);
        assert_eq!(quantize_code(127.2, 1.0), 127);
        assert_eq!(quantize_code(500.0, 1.0), 127);
        assert_eq!(quantize_code(-500.0, 1.0), -127);
        assert_eq!(quantize_code(f32::NEG_INFINITY, 1.0), -127);
        assert_eq!(quantize_code(f32::NAN, 1.0), 0);
        assert_eq!(quantize_code(3.0, 0.0), 0);
    }

    #[test]
    fn test_dequant_q8_to_f32() {
        assert_eq!(dequant_q8_to_f32(-16, 2.0), -32.0);
        assert_eq!(dequant_q8_to_f32(0, 5.0), 0.0);
    }

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(0), 0);
        assert_eq!(block_count(1), 1);
        assert_eq!(block_count(32), 1);
        assert_eq!(block_count(33), 2);
    }

    #[test]
    fn test_block_byte_sizes() {
        assert_eq!(Q8_0_BLOCK_BYTES, 34);
        assert_eq!(Q8_A8_BLOCK_BYTES, 36);
    }
}
