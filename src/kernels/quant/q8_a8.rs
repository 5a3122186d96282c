//! Q8_A8 quantization kernel (CPU)
//!
//! SmoothQuant W8A8 format: weights and activations are both 8-bit.
//! - Block size: 32 elements
//! - Per block (36 bytes): 4 bytes f32 scale + 32 bytes int8 codes
//!
//! The scale is kept in full precision so smoothed activations, whose
//! outlier channels have been folded into the weights, keep their range.

use super::common::{self, Q8Layout, Q8_A8_BLOCK_BYTES};
use crate::error::ForgeResult;

/// Block layout with a single-precision scale
#[allow(non_camel_case_types)]
pub struct Q8_A8;

impl Q8Layout for Q8_A8 {
    const SCALE_BYTES: usize = 4;
    const BLOCK_BYTES: usize = Q8_A8_BLOCK_BYTES;

    #[inline]
    fn store_scale(d: f32, out: &mut [u8]) {
        out.copy_from_slice(&d.to_le_bytes());
    }

    #[inline]
    fn load_scale(bytes: &[u8]) -> f32 {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

pub fn quantize_row_q8_a8(src: &[f32], dst: &mut [u8]) -> ForgeResult<()> {
    common::quantize_blocks::<Q8_A8>(src, dst)
}

pub fn dequantize_row_q8_a8(src: &[u8], dst: &mut [f32]) -> ForgeResult<()> {
    common::dequantize_blocks::<Q8_A8>(src, dst)
}

pub fn vec_dot_q8_a8_q8_a8(n: usize, x: &[u8], y: &[u8]) -> ForgeResult<f32> {
    common::vec_dot_blocks::<Q8_A8>(n, x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(src: &[f32]) -> (f32, Vec<f32>) {
        let mut block = vec![0u8; Q8_A8_BLOCK_BYTES];
        quantize_row_q8_a8(src, &mut block).unwrap();
        let mut out = vec![0.0f32; src.len()];
        dequantize_row_q8_a8(&block, &mut out).unwrap();
        (Q8_A8::load_scale(&block[..4]), out)
    }

    #[test]
    fn test_q8_a8_scale_is_full_precision() {
        let src: Vec<f32> = (0..32).map(|i| (i as f32 - 15.5) * 0.01).collect();
        let (d, _) = round_trip(&src);
        let amax = 15.5f32 * 0.01;
        // amax / 127, at most one ulp up so that d * 127 covers amax
        let exact = amax / 127.0;
        assert!(d == exact || d == f32::from_bits(exact.to_bits() + 1));
        assert!(d * 127.0 >= amax);
    }

    #[test]
    fn test_q8_a8_large_block_keeps_bound() {
        // far outside the f16 range
        let src: Vec<f32> = (0..32).map(|i| (i as f32 - 16.0) * 1e36).collect();
        let (d, out) = round_trip(&src);
        assert!(d.is_finite() && d > 0.0);
        for (x, y) in src.iter().zip(&out) {
            assert!(y.is_finite());
            assert!((x - y).abs() <= d, "{} vs {} (d = {})", x, y, d);
        }
    }

    #[test]
    fn test_q8_a8_subnormal_block_keeps_bound() {
        let src: Vec<f32> = (0..32).map(|i| i as f32 * 1e-41).collect();
        let (d, out) = round_trip(&src);
        assert!(d > 0.0);
        assert!(out[31] > 0.0);
        for (x, y) in src.iter().zip(&out) {
            assert!((x - y).abs() <= d, "{} vs {} (d = {})", x, y, d);
        }
    }

    #[test]
    fn test_q8_a8_infinite_input_decodes_finite() {
        let mut src = [1.0f32; 32];
        src[0] = f32::INFINITY;
        src[1] = f32::NEG_INFINITY;
        src[2] = f32::NAN;
        let (d, out) = round_trip(&src);
        assert_eq!(d, common::MAX_SCALE);
        assert_eq!(out[0], 127.0 * common::MAX_SCALE);
        assert_eq!(out[1], -127.0 * common::MAX_SCALE);
        assert_eq!(out[2], 0.0);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_q8_a8_dequantize_known_block() {
        let mut block = vec![0u8; Q8_A8_BLOCK_BYTES];
        block[..4].copy_from_slice(&0.5f32.to_le_bytes());
        block[4] = (-4i8) as u8;
        block[5] = 127;
        let mut out = vec![0.0f32; 32];
        dequantize_row_q8_a8(&block, &mut out).unwrap();
        assert_eq!(out[0], -2.0);
        assert_eq!(out[1], 63.5);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn test_q8_a8_dot_matches_integer_sum() {
        // both blocks: d = 1, codes 0..32
        let mut block = vec![0u8; Q8_A8_BLOCK_BYTES];
        block[..4].copy_from_slice(&1.0f32.to_le_bytes());
        for i in 0..32 {
            block[4 + i] = i as u8;
        }
        let expected: i32 = (0..32).map(|i| i * i).sum();
        assert_eq!(vec_dot_q8_a8_q8_a8(32, &block, &block).unwrap(), expected as f32);

        // only the first 10 codes count for n = 10
        let partial: i32 = (0..10).map(|i| i * i).sum();
        assert_eq!(vec_dot_q8_a8_q8_a8(10, &block, &block).unwrap(), partial as f32);
    }

    #[test]
    fn test_q8_a8_multi_block_round_trip() {
        let src: Vec<f32> = (0..96).map(|i| ((i as f32) * 0.7).sin() * 3.0).collect();
        let mut blocks = vec![0u8; 3 * Q8_A8_BLOCK_BYTES];
        quantize_row_q8_a8(&src, &mut blocks).unwrap();
        let mut out = vec![0.0f32; 96];
        dequantize_row_q8_a8(&blocks, &mut out).unwrap();
        for (chunk, decoded) in src.chunks(32).zip(out.chunks(32)) {
            let d = chunk.iter().fold(0.0f32, |m, x| m.max(x.abs())) / 127.0;
            for (x, y) in chunk.iter().zip(decoded) {
                assert!((x - y).abs() <= d);
            }
        }
    }
}
