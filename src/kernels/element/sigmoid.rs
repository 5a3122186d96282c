//! Logistic sigmoid kernel
//!
//! Computes: dst[i] = 1 / (1 + exp(-src[i]))
//!
//! One lane per element, no cross-lane dependency and therefore no barrier.
//! F16 tensors are widened to f32, transformed, and narrowed on store.

use rayon::prelude::*;

use crate::error::{ForgeError, ForgeResult};
use crate::ggml::shape::unravel;
use crate::ggml::{GgmlType, TensorView, TensorViewMut};
use crate::shape_error;

#[inline]
pub fn sigmoid_f32(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Apply sigmoid to every element of `src`, writing `dst`.
///
/// Both views must share type (F32 or F16) and shape; strides are free.
pub fn sigmoid(src: &TensorView<'_>, dst: &mut TensorViewMut<'_>) -> ForgeResult<()> {
    let dtype = src.dtype();
    if !matches!(dtype, GgmlType::F32 | GgmlType::F16) {
        return Err(ForgeError::UnsupportedType {
            op: "sigmoid",
            dtype,
        });
    }
    if dst.dtype() != dtype {
        return Err(ForgeError::UnsupportedType {
            op: "sigmoid",
            dtype: dst.dtype(),
        });
    }
    let ne = src.ne();
    if dst.ne() != ne {
        return Err(shape_error!(
            "sigmoid shape mismatch: src {:?}, dst {:?}",
            ne,
            dst.ne()
        ));
    }

    let n = src.element_count();
    tracing::trace!(n, dtype = %dtype, "sigmoid dispatch");

    let values: Vec<f32> = (0..n)
        .into_par_iter()
        .map(|i| sigmoid_f32(src.get_f32(unravel(i, &ne))))
        .collect();

    for (i, value) in values.into_iter().enumerate() {
        dst.set_f32(unravel(i, &ne), value);
    }
    Ok(())
}
