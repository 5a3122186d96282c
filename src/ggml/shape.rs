//! Shape and stride helpers for 4-D ggml tensors.

use crate::ggml::GgmlType;

/// Maximum number of axes addressed by a tensor view
pub const MAX_DIMS: usize = 4;

pub fn element_count(ne: &[usize; MAX_DIMS]) -> usize {
    ne.iter().copied().product()
}

/// Number of rows, i.e. the product of the three outer axes
pub fn row_count(ne: &[usize; MAX_DIMS]) -> usize {
    ne[1] * ne[2] * ne[3]
}

/// Byte strides of a densely packed tensor.
///
/// `nb[0]` is the type size and `nb[1]` covers one row of blocks, so for
/// quantized types axis 0 steps a whole block rather than one element.
pub fn contiguous_strides(dtype: GgmlType, ne: &[usize; MAX_DIMS]) -> [usize; MAX_DIMS] {
    let mut nb = [0usize; MAX_DIMS];
    nb[0] = dtype.type_size();
    nb[1] = dtype.row_size(ne[0]);
    for i in 2..MAX_DIMS {
        nb[i] = nb[i - 1] * ne[i - 1];
    }
    nb
}

/// Split a row index into its (i1, i2, i3) coordinates
#[inline]
pub fn unravel_row(row: usize, ne: &[usize; MAX_DIMS]) -> (usize, usize, usize) {
    let i1 = row % ne[1];
    let i2 = (row / ne[1]) % ne[2];
    let i3 = row / (ne[1] * ne[2]);
    (i1, i2, i3)
}

/// Split a flat element index into all four coordinates
#[inline]
pub fn unravel(index: usize, ne: &[usize; MAX_DIMS]) -> [usize; MAX_DIMS] {
    let i0 = index % ne[0];
    let (i1, i2, i3) = unravel_row(index / ne[0], ne);
    [i0, i1, i2, i3]
}

/// Number of bytes past the start of the buffer a view touches.
///
/// Empty tensors touch nothing beyond the offset.
pub fn required_bytes(
    dtype: GgmlType,
    offset: usize,
    ne: &[usize; MAX_DIMS],
    nb: &[usize; MAX_DIMS],
) -> usize {
    if ne.iter().any(|&n| n == 0) {
        return offset;
    }
    let blocks0 = ne[0].div_ceil(dtype.block_size());
    let mut last = offset + (blocks0 - 1) * nb[0];
    for k in 1..MAX_DIMS {
        last += (ne[k] - 1) * nb[k];
    }
    last + dtype.type_size()
}
