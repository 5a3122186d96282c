//! Quantization error statistics
//!
//! Both statistics encode `data` with the registered `from_float` of a type
//! and decode it again with `to_float`, so they measure exactly what a
//! tensor stored in that type would lose.

use crate::error::ForgeResult;
use crate::ggml::GgmlType;

use super::{dequantize_row, quantize_row};

fn round_trip(dtype: GgmlType, data: &[f32]) -> ForgeResult<Vec<f32>> {
    let encoded = quantize_row(dtype, data)?;
    dequantize_row(dtype, &encoded, data.len())
}

/// Mean squared error of a quantize/dequantize round trip
pub fn quantization_mse(dtype: GgmlType, data: &[f32]) -> ForgeResult<f32> {
    if data.is_empty() {
        return Ok(0.0);
    }
    let decoded = round_trip(dtype, data)?;
    let sum: f32 = data
        .iter()
        .zip(&decoded)
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    Ok(sum / data.len() as f32)
}

/// Largest absolute error of a quantize/dequantize round trip
pub fn max_abs_error(dtype: GgmlType, data: &[f32]) -> ForgeResult<f32> {
    let decoded = round_trip(dtype, data)?;
    Ok(data
        .iter()
        .zip(&decoded)
        .fold(0.0f32, |m, (x, y)| m.max((x - y).abs())))
}
