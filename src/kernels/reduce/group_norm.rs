//! Group normalization kernel
//!
//! The flat element space is split into contiguous groups of `group_size`
//! elements; one work-group normalizes one group. Lane `l` of a work-group
//! owns elements `start + l`, `start + l + local_size`, ...
//!
//! Per group:
//! 1. lanes sum their elements, a subgroup reduction gives `mean`
//! 2. lanes write `x - mean` into `dst` and sum the squares, a second
//!    reduction gives `variance`
//! 3. lanes read their centered values back from `dst` and scale them by
//!    `1 / sqrt(variance + eps)`
//!
//! `dst` is the only scratch between passes 2 and 3. Lanes compute in
//! parallel and their results are committed to `dst` once the stage joins.
//! Both divisors are `group_size` even when the last group is clamped to
//! the end of the tensor.

use std::ops::Range;

use crate::error::{ForgeError, ForgeResult};
use crate::ggml::shape::{unravel, MAX_DIMS};
use crate::ggml::{GgmlType, TensorView, TensorViewMut};
use crate::kernels::launch::{subgroup_reduce_add, WorkGroup};
use crate::{launch_error, shape_error};

/// Normalize contiguous groups of `group_size` elements.
///
/// `src` and `dst` must be F32 with the same shape. Elements are visited in
/// logical (row-major over `ne`) order, so strided views are accepted.
/// `local_size` is the number of lanes cooperating on one group.
pub fn group_norm(
    src: &TensorView<'_>,
    dst: &mut TensorViewMut<'_>,
    group_size: usize,
    eps: f32,
    local_size: usize,
) -> ForgeResult<()> {
    for dtype in [src.dtype(), dst.dtype()] {
        if dtype != GgmlType::F32 {
            return Err(ForgeError::UnsupportedType {
                op: "group_norm",
                dtype,
            });
        }
    }
    let shape = src.ne();
    if dst.ne() != shape {
        return Err(shape_error!(
            "group_norm shape mismatch: src {:?}, dst {:?}",
            shape,
            dst.ne()
        ));
    }
    if group_size == 0 {
        return Err(launch_error!("group_norm group_size must be non-zero"));
    }
    if local_size == 0 {
        return Err(launch_error!("group_norm local_size must be non-zero"));
    }

    let ne = src.element_count();
    let n_groups = ne.div_ceil(group_size);
    tracing::debug!(ne, group_size, n_groups, local_size, eps, "group_norm dispatch");

    for group_id in 0..n_groups {
        let start = group_id * group_size;
        let elements = start..(start + group_size).min(ne);
        normalize_group(
            &WorkGroup::new(group_id, local_size),
            src,
            dst,
            elements,
            group_size,
            eps,
        );
    }
    Ok(())
}

/// Flat indices owned by `lane`
fn lane_elements(elements: &Range<usize>, lane: usize, stride: usize) -> impl Iterator<Item = usize> {
    (elements.start + lane..elements.end).step_by(stride)
}

fn commit(dst: &mut TensorViewMut<'_>, shape: &[usize; MAX_DIMS], lanes: Vec<Vec<(usize, f32)>>) {
    for (j, value) in lanes.into_iter().flatten() {
        dst.set_f32(unravel(j, shape), value);
    }
}

/// Run the three passes for the elements of one group
fn normalize_group(
    group: &WorkGroup,
    src: &TensorView<'_>,
    dst: &mut TensorViewMut<'_>,
    elements: Range<usize>,
    group_size: usize,
    eps: f32,
) {
    let shape = src.ne();
    let stride = group.local_size();

    let partials = group.map_lanes(|lane| {
        lane_elements(&elements, lane, stride)
            .map(|j| src.get_f32(unravel(j, &shape)))
            .sum::<f32>()
    });
    let mean = subgroup_reduce_add(&partials) / group_size as f32;

    let (centered, partials): (Vec<_>, Vec<_>) = group
        .map_lanes(|lane| {
            let mut tmp = 0.0f32;
            let values: Vec<(usize, f32)> = lane_elements(&elements, lane, stride)
                .map(|j| {
                    let xi = src.get_f32(unravel(j, &shape)) - mean;
                    tmp += xi * xi;
                    (j, xi)
                })
                .collect();
            (values, tmp)
        })
        .into_iter()
        .unzip();
    commit(dst, &shape, centered);
    let variance = subgroup_reduce_add(&partials) / group_size as f32;
    let scale = 1.0 / (variance + eps).sqrt();

    let scratch = dst.as_view();
    let scaled = group.map_lanes(|lane| {
        lane_elements(&elements, lane, stride)
            .map(|j| (j, scratch.get_f32(unravel(j, &shape)) * scale))
            .collect::<Vec<_>>()
    });
    commit(dst, &shape, scaled);
}
