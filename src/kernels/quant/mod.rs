//! Quantization kernels and the type registry
//!
//! - `common`: shared 8-bit block engine (scale, codes, zero padding)
//! - `q8_0`: 8-bit blocks with an f16 scale
//! - `q8_a8`: SmoothQuant W8A8 blocks with an f32 scale
//! - `float`: F32 / F16 conversions
//! - `registry`: tag -> capability record lookup
//! - `smooth`: SmoothQuant smoothing factors
//! - `error`: round-trip error statistics

pub mod common;
pub mod error;
pub mod float;
pub mod q8_0;
pub mod q8_a8;
pub mod registry;
pub mod smooth;

use rayon::prelude::*;

use crate::error::{ForgeError, ForgeResult};
use crate::ggml::shape::unravel_row;
use crate::ggml::{GgmlType, TensorView, TensorViewMut};
use crate::shape_error;

pub use registry::{registry, type_traits, TypeRegistry, TypeTraits};

/// Encode a float row with the registered `from_float` of `dtype`
pub fn quantize_row(dtype: GgmlType, src: &[f32]) -> ForgeResult<Vec<u8>> {
    let traits = registry().get(dtype)?;
    let from_float = traits.from_float_fn()?;
    let mut encoded = vec![0u8; traits.row_size(src.len())];
    from_float(src, &mut encoded)?;
    Ok(encoded)
}

/// Decode `n` floats with the registered `to_float` of `dtype`
pub fn dequantize_row(dtype: GgmlType, src: &[u8], n: usize) -> ForgeResult<Vec<f32>> {
    let traits = registry().get(dtype)?;
    let to_float = traits.to_float_fn()?;
    let mut decoded = vec![0.0f32; n];
    to_float(src, &mut decoded)?;
    Ok(decoded)
}

/// Dot product of two encoded rows of `n` elements.
///
/// `y` must already be encoded in the `vec_dot_type` of `dtype`.
pub fn vec_dot(dtype: GgmlType, n: usize, x: &[u8], y: &[u8]) -> ForgeResult<f32> {
    let traits = registry().get(dtype)?;
    (traits.vec_dot_fn()?)(n, x, y)
}

/// Dot product of an encoded row with a float row.
///
/// The float operand is first encoded in the `vec_dot_type` of `dtype`.
pub fn vec_dot_f32(dtype: GgmlType, x: &[u8], y: &[f32]) -> ForgeResult<f32> {
    let traits = registry().get(dtype)?;
    let y_encoded = quantize_row(traits.vec_dot_type, y)?;
    (traits.vec_dot_fn()?)(y.len(), x, &y_encoded)
}

fn check_rows_packed(dtype: GgmlType, nb0: usize) -> ForgeResult<()> {
    if nb0 != dtype.type_size() {
        return Err(shape_error!(
            "{} rows must be packed: nb0 {} != type size {}",
            dtype,
            nb0,
            dtype.type_size()
        ));
    }
    Ok(())
}

/// Convert an F32 tensor into the type of `dst`, row by row.
///
/// The source may be arbitrarily strided; destination rows must be packed
/// (`nb0 == type_size`), rows themselves may sit anywhere.
pub fn quantize_tensor(src: &TensorView<'_>, dst: &mut TensorViewMut<'_>) -> ForgeResult<()> {
    if src.dtype() != GgmlType::F32 {
        return Err(ForgeError::UnsupportedType {
            op: "quantize",
            dtype: src.dtype(),
        });
    }
    let ne = src.ne();
    if dst.ne() != ne {
        return Err(shape_error!(
            "quantize shape mismatch: src {:?}, dst {:?}",
            ne,
            dst.ne()
        ));
    }
    let dtype = dst.dtype();
    check_rows_packed(dtype, dst.nb()[0])?;
    let from_float = registry().get(dtype)?.from_float_fn()?;

    tracing::debug!(%dtype, ne00 = ne[0], nrows = src.row_count(), "quantize dispatch");

    let rows: Vec<Vec<u8>> = (0..src.row_count())
        .into_par_iter()
        .map(|row| -> ForgeResult<Vec<u8>> {
            let (i1, i2, i3) = unravel_row(row, &ne);
            let values: Vec<f32> = (0..ne[0]).map(|i0| src.get_f32([i0, i1, i2, i3])).collect();
            let mut encoded = vec![0u8; dtype.row_size(ne[0])];
            from_float(&values, &mut encoded)?;
            Ok(encoded)
        })
        .collect::<ForgeResult<_>>()?;

    for (row, encoded) in rows.into_iter().enumerate() {
        let (i1, i2, i3) = unravel_row(row, &ne);
        dst.row_bytes_mut(i1, i2, i3).copy_from_slice(&encoded);
    }
    Ok(())
}

/// Convert a tensor of any registered type with a `to_float` into F32.
///
/// Source rows must be packed; the destination may be strided.
pub fn dequantize_tensor(src: &TensorView<'_>, dst: &mut TensorViewMut<'_>) -> ForgeResult<()> {
    if dst.dtype() != GgmlType::F32 {
        return Err(ForgeError::UnsupportedType {
            op: "dequantize",
            dtype: dst.dtype(),
        });
    }
    let ne = src.ne();
    if dst.ne() != ne {
        return Err(shape_error!(
            "dequantize shape mismatch: src {:?}, dst {:?}",
            ne,
            dst.ne()
        ));
    }
    let dtype = src.dtype();
    check_rows_packed(dtype, src.nb()[0])?;
    let to_float = registry().get(dtype)?.to_float_fn()?;

    tracing::debug!(%dtype, ne00 = ne[0], nrows = src.row_count(), "dequantize dispatch");

    let rows: Vec<Vec<f32>> = (0..src.row_count())
        .into_par_iter()
        .map(|row| -> ForgeResult<Vec<f32>> {
            let (i1, i2, i3) = unravel_row(row, &ne);
            let mut decoded = vec![0.0f32; ne[0]];
            to_float(src.row_bytes(i1, i2, i3), &mut decoded)?;
            Ok(decoded)
        })
        .collect::<ForgeResult<_>>()?;

    for (row, decoded) in rows.into_iter().enumerate() {
        let (i1, i2, i3) = unravel_row(row, &ne);
        for (i0, value) in decoded.into_iter().enumerate() {
            dst.set_f32([i0, i1, i2, i3], value);
        }
    }
    Ok(())
}
