//! Row-sum kernel
//!
//! Computes: dst[0, i1, i2, i3] = Σ_{i0} src[i0, i1, i2, i3]
//!
//! One lane per row over the three outer axes. Each lane accumulates its row
//! sequentially, so rows need no synchronization with each other.

use rayon::prelude::*;

use crate::error::{ForgeError, ForgeResult};
use crate::ggml::shape::unravel_row;
use crate::ggml::{GgmlType, TensorView, TensorViewMut};
use crate::shape_error;

/// Sum every row of an F32 tensor.
///
/// `dst` must be F32 with shape `[1, ne01, ne02, ne03]`. Source rows are
/// addressed through `nb01..nb03`, destination cells through `nb1..nb3`.
pub fn sum_rows(src: &TensorView<'_>, dst: &mut TensorViewMut<'_>) -> ForgeResult<()> {
    for dtype in [src.dtype(), dst.dtype()] {
        if dtype != GgmlType::F32 {
            return Err(ForgeError::UnsupportedType {
                op: "sum_rows",
                dtype,
            });
        }
    }
    let ne = src.ne();
    let expected = [1, ne[1], ne[2], ne[3]];
    if dst.ne() != expected {
        return Err(shape_error!(
            "sum_rows dst shape {:?}, expected {:?}",
            dst.ne(),
            expected
        ));
    }

    let nrows = src.row_count();
    tracing::trace!(ne00 = ne[0], nrows, "sum_rows dispatch");

    let sums: Vec<f32> = (0..nrows)
        .into_par_iter()
        .map(|row| {
            let (i1, i2, i3) = unravel_row(row, &ne);
            let mut row_sum = 0.0f32;
            for i0 in 0..ne[0] {
                row_sum += src.get_f32([i0, i1, i2, i3]);
            }
            row_sum
        })
        .collect();

    for (row, row_sum) in sums.into_iter().enumerate() {
        let (i1, i2, i3) = unravel_row(row, &ne);
        dst.set_f32([0, i1, i2, i3], row_sum);
    }
    Ok(())
}
