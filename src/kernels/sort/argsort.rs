//! Bitonic argsort kernel
//!
//! One work-group per row with one lane per column of the padded row.
//! Lanes sort indices held in the group's local memory; the values stay in
//! place and are only read. Padding indices (`>= ne00`) always lose a
//! comparison, so they collect at the tail in either order and only the first
//! `ne00` indices are written out.
//!
//! Every compare-exchange stage is followed by a barrier: lanes of stage
//! `(k, j)` must observe the fully committed result of the previous stage.

use rayon::prelude::*;

use crate::error::{ForgeError, ForgeResult};
use crate::ggml::shape::unravel_row;
use crate::ggml::{GgmlType, SortOrder, TensorView, TensorViewMut};
use crate::kernels::launch::{LocalMemory, WorkGroup};
use crate::{launch_error, shape_error};

/// Argsort every row of an F32 tensor into an I32 tensor of the same shape.
///
/// The padded row length is `ne00.next_power_of_two()` and must not exceed
/// `max_local_size`, the number of lanes (and local memory cells) one
/// work-group may use.
pub fn argsort(
    src: &TensorView<'_>,
    dst: &mut TensorViewMut<'_>,
    order: SortOrder,
    max_local_size: usize,
) -> ForgeResult<()> {
    let ne00 = src.ne()[0];
    argsort_padded(src, dst, order, ne00.next_power_of_two(), max_local_size)
}

/// Argsort with an explicit padded row length `ne00_pad`.
pub fn argsort_padded(
    src: &TensorView<'_>,
    dst: &mut TensorViewMut<'_>,
    order: SortOrder,
    ne00_pad: usize,
    max_local_size: usize,
) -> ForgeResult<()> {
    if src.dtype() != GgmlType::F32 {
        return Err(ForgeError::UnsupportedType {
            op: "argsort",
            dtype: src.dtype(),
        });
    }
    if dst.dtype() != GgmlType::I32 {
        return Err(ForgeError::UnsupportedType {
            op: "argsort",
            dtype: dst.dtype(),
        });
    }
    let ne = src.ne();
    if dst.ne() != ne {
        return Err(shape_error!(
            "argsort shape mismatch: src {:?}, dst {:?}",
            ne,
            dst.ne()
        ));
    }
    let ne00 = ne[0];
    if ne00 == 0 {
        return Ok(());
    }
    if !ne00_pad.is_power_of_two() || ne00_pad < ne00 {
        return Err(launch_error!(
            "ne00_pad {} must be a power of two >= ne00 {}",
            ne00_pad,
            ne00
        ));
    }
    if ne00_pad > max_local_size {
        tracing::warn!(ne00, ne00_pad, max_local_size, "argsort row exceeds local memory");
        return Err(launch_error!(
            "padded row length {} exceeds max local size {}",
            ne00_pad,
            max_local_size
        ));
    }
    if ne00_pad > i32::MAX as usize {
        return Err(launch_error!("padded row length {} overflows i32 indices", ne00_pad));
    }

    let nrows = src.row_count();
    tracing::debug!(ne00, ne00_pad, nrows, ?order, "argsort dispatch");

    let permutations: Vec<Vec<i32>> = (0..nrows)
        .into_par_iter()
        .map(|row| {
            let (i1, i2, i3) = unravel_row(row, &ne);
            let x_row: Vec<f32> = (0..ne00).map(|i0| src.get_f32([i0, i1, i2, i3])).collect();
            bitonic_argsort(&WorkGroup::new(row, ne00_pad), &x_row, ne00_pad, order)
        })
        .collect();

    for (row, perm) in permutations.into_iter().enumerate() {
        let (i1, i2, i3) = unravel_row(row, &ne);
        for (col, index) in perm.into_iter().enumerate() {
            dst.set_i32([col, i1, i2, i3], index);
        }
    }
    Ok(())
}

/// Argsort a single row, padding to the next power of two.
pub fn argsort_row(values: &[f32], order: SortOrder) -> Vec<i32> {
    if values.is_empty() {
        return Vec::new();
    }
    let ne00_pad = values.len().next_power_of_two();
    bitonic_argsort(&WorkGroup::new(0, ne00_pad), values, ne00_pad, order)
}

/// Sort the indices of `x_row` with a bitonic network of `ne00_pad` lanes.
fn bitonic_argsort(group: &WorkGroup, x_row: &[f32], ne00_pad: usize, order: SortOrder) -> Vec<i32> {
    let ne00 = x_row.len();
    let dst_row = LocalMemory::new(ne00_pad);

    group.run_stage(|col| {
        if col < ne00_pad {
            dst_row.store_i32(col, col as i32);
        }
    });

    let mut k = 2;
    while k <= ne00_pad {
        let mut j = k / 2;
        while j > 0 {
            group.run_stage(|col| {
                if col < ne00_pad {
                    compare_exchange(&dst_row, x_row, col, j, k, order);
                }
            });
            j /= 2;
        }
        k *= 2;
    }

    dst_row.to_i32_vec(ne00)
}

/// One lane of one bitonic stage.
///
/// The lane owning the lower index of a pair decides. In the ascending half
/// of a bitonic block (`col & k == 0`) the smaller value belongs at `col`;
/// in the descending half it belongs at `ixj`. An out-of-range index at the
/// position that should hold the "first" element always loses.
#[inline]
fn compare_exchange(dst_row: &LocalMemory, x_row: &[f32], col: usize, j: usize, k: usize, order: SortOrder) {
    let ixj = col ^ j;
    if ixj <= col {
        return;
    }
    let ne00 = x_row.len();
    let a = dst_row.load_i32(col) as usize;
    let b = dst_row.load_i32(ixj) as usize;

    let swap = if col & k == 0 {
        a >= ne00 || (b < ne00 && out_of_order(x_row[a], x_row[b], order))
    } else {
        b >= ne00 || (a < ne00 && out_of_order(x_row[b], x_row[a], order))
    };
    if swap {
        dst_row.swap(col, ixj);
    }
}

/// Whether `first` must not precede `second` in the requested order.
/// Comparisons with NaN are false, so NaN never triggers a swap.
#[inline]
fn out_of_order(first: f32, second: f32, order: SortOrder) -> bool {
    match order {
        SortOrder::Asc => first > second,
        SortOrder::Desc => first < second,
    }
}
