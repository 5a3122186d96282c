//! Conversions and dot products for the plain float types (F32, F16)
//!
//! Elements are stored little-endian. F16 values are widened with `half`
//! and accumulated in f32.

use half::f16;

use crate::error::{ForgeError, ForgeResult};

fn check_len(expected: usize, actual: usize) -> ForgeResult<()> {
    if actual < expected {
        return Err(ForgeError::BufferTooSmall { expected, actual });
    }
    Ok(())
}

#[inline]
fn f32_at(bytes: &[u8], i: usize) -> f32 {
    let at = i * 4;
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn f16_at(bytes: &[u8], i: usize) -> f32 {
    let at = i * 2;
    f16::from_bits(u16::from_le_bytes([bytes[at], bytes[at + 1]])).to_f32()
}

pub fn f32_to_float(src: &[u8], dst: &mut [f32]) -> ForgeResult<()> {
    check_len(dst.len() * 4, src.len())?;
    for (i, value) in dst.iter_mut().enumerate() {
        *value = f32_at(src, i);
    }
    Ok(())
}

pub fn f32_from_float(src: &[f32], dst: &mut [u8]) -> ForgeResult<()> {
    check_len(src.len() * 4, dst.len())?;
    for (chunk, value) in dst.chunks_exact_mut(4).zip(src) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

pub fn f32_vec_dot(n: usize, x: &[u8], y: &[u8]) -> ForgeResult<f32> {
    check_len(n * 4, x.len())?;
    check_len(n * 4, y.len())?;
    Ok((0..n).map(|i| f32_at(x, i) * f32_at(y, i)).sum())
}

pub fn f16_to_float(src: &[u8], dst: &mut [f32]) -> ForgeResult<()> {
    check_len(dst.len() * 2, src.len())?;
    for (i, value) in dst.iter_mut().enumerate() {
        *value = f16_at(src, i);
    }
    Ok(())
}

pub fn f16_from_float(src: &[f32], dst: &mut [u8]) -> ForgeResult<()> {
    check_len(src.len() * 2, dst.len())?;
    for (chunk, value) in dst.chunks_exact_mut(2).zip(src) {
        chunk.copy_from_slice(&f16::from_f32(*value).to_bits().to_le_bytes());
    }
    Ok(())
}

pub fn f16_vec_dot(n: usize, x: &[u8], y: &[u8]) -> ForgeResult<f32> {
    check_len(n * 2, x.len())?;
    check_len(n * 2, y.len())?;
    Ok((0..n).map(|i| f16_at(x, i) * f16_at(y, i)).sum())
}
