//! SmoothQuant smoothing factors
//!
//! Activation outliers are migrated into the weights with a per input
//! channel factor `s_j = max(a_j)^alpha / max(|w_j|)^(1 - alpha)`.
//! Activations are divided by `s_j` and weights multiplied by it, so every product
//! `x_j * w_j` and hence `x · w` is unchanged while both operands become
//! easier to quantize to 8 bits.
//!
//! Matrices are row-major with one input channel per column.

use rayon::prelude::*;

use crate::error::{ForgeError, ForgeResult};
use crate::shape_error;

/// Floor applied to both statistics before the power law
pub const SMOOTH_MIN: f32 = 1e-5;

/// Smoothing factor commonly used for LLaMA-style models
pub const DEFAULT_ALPHA: f32 = 0.5;

fn check_matrix(len: usize, rows: usize, cols: usize) -> ForgeResult<()> {
    if rows.checked_mul(cols) != Some(len) {
        return Err(shape_error!(
            "matrix of {} values is not {} x {}",
            len,
            rows,
            cols
        ));
    }
    Ok(())
}

/// Per-column absolute maximum of a `rows x cols` matrix
pub fn channel_abs_max(rows: usize, cols: usize, data: &[f32]) -> ForgeResult<Vec<f32>> {
    check_matrix(data.len(), rows, cols)?;
    let mut max = vec![0.0f32; cols];
    for row in data.chunks_exact(cols.max(1)) {
        for (m, &v) in max.iter_mut().zip(row) {
            *m = m.max(v.abs());
        }
    }
    Ok(max)
}

/// Smoothing factors from activation and weight channel maxima
pub fn smoothing_scales(act_max: &[f32], weight_max: &[f32], alpha: f32) -> ForgeResult<Vec<f32>> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ForgeError::InvalidConfiguration(format!(
            "smoothing alpha {} outside [0, 1]",
            alpha
        )));
    }
    if act_max.len() != weight_max.len() {
        return Err(shape_error!(
            "{} activation channels vs {} weight channels",
            act_max.len(),
            weight_max.len()
        ));
    }

    let scales: Vec<f32> = act_max
        .iter()
        .zip(weight_max)
        .map(|(&a, &w)| a.max(SMOOTH_MIN).powf(alpha) / w.max(SMOOTH_MIN).powf(1.0 - alpha))
        .collect();

    if tracing::enabled!(tracing::Level::DEBUG) && !scales.is_empty() {
        let (lo, hi) = scales
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        tracing::debug!(channels = scales.len(), alpha, min = lo, max = hi, "smoothing scales");
    }
    Ok(scales)
}

/// Multiply column `j` of a row-major weight matrix by `scales[j]`
pub fn smooth_weights(weights: &mut [f32], rows: usize, cols: usize, scales: &[f32]) -> ForgeResult<()> {
    check_matrix(weights.len(), rows, cols)?;
    if scales.len() != cols {
        return Err(shape_error!("{} scales for {} columns", scales.len(), cols));
    }
    if cols == 0 {
        return Ok(());
    }
    weights.par_chunks_mut(cols).for_each(|row| {
        for (w, s) in row.iter_mut().zip(scales) {
            *w *= s;
        }
    });
    Ok(())
}

/// Divide channel `j` of every activation row by `scales[j]`
pub fn smooth_activations(x: &mut [f32], scales: &[f32]) -> ForgeResult<()> {
    let cols = scales.len();
    if cols == 0 || x.len() % cols != 0 {
        return Err(shape_error!(
            "{} activations are not whole rows of {} channels",
            x.len(),
            cols
        ));
    }
    x.par_chunks_mut(cols).for_each(|row| {
        for (v, s) in row.iter_mut().zip(scales) {
            *v /= s;
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_abs_max() {
        let data = [1.0, -5.0, 2.0, -3.0, 4.0, 0.5];
        assert_eq!(channel_abs_max(2, 3, &data).unwrap(), vec![3.0, 5.0, 2.0]);
        assert!(channel_abs_max(4, 2, &data).is_err());
    }

    #[test]
    fn test_smoothing_scales_formula() {
        let s = smoothing_scales(&[16.0], &[4.0], 0.5).unwrap();
        assert!((s[0] - 2.0).abs() < 1e-6);

        // alpha = 1 moves everything into the weights
        let s = smoothing_scales(&[8.0], &[3.0], 1.0).unwrap();
        assert!((s[0] - 8.0).abs() < 1e-6);

        // zero statistics are floored, never divide by zero
        let s = smoothing_scales(&[0.0], &[0.0], 0.5).unwrap();
        assert!(s[0].is_finite());
        assert!((s[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_scales_validation() {
        assert!(matches!(
            smoothing_scales(&[1.0], &[1.0], 1.5),
            Err(ForgeError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            smoothing_scales(&[1.0, 2.0], &[1.0], 0.5),
            Err(ForgeError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_smoothing_preserves_products() {
        // 2 tokens x 3 channels, weight 2 outputs x 3 inputs
        let x = vec![10.0f32, 0.1, -0.5, 8.0, 0.2, 0.3];
        let w = vec![0.2f32, 1.5, -0.7, -0.1, 0.9, 1.1];
        let reference: Vec<f32> = x
            .chunks(3)
            .flat_map(|xr| w.chunks(3).map(move |wr| xr.iter().zip(wr).map(|(a, b)| a * b).sum::<f32>()))
            .collect();

        let act_max = channel_abs_max(2, 3, &x).unwrap();
        let weight_max = channel_abs_max(2, 3, &w).unwrap();
        let scales = smoothing_scales(&act_max, &weight_max, DEFAULT_ALPHA).unwrap();

        let mut xs = x.clone();
        let mut ws = w.clone();
        smooth_activations(&mut xs, &scales).unwrap();
        smooth_weights(&mut ws, 2, 3, &scales).unwrap();

        let smoothed: Vec<f32> = xs
            .chunks(3)
            .flat_map(|xr| ws.chunks(3).map(move |wr| xr.iter().zip(wr).map(|(a, b)| a * b).sum::<f32>()))
            .collect();
        for (a, b) in reference.iter().zip(&smoothed) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }

        // the outlier channel shrinks
        let new_max = channel_abs_max(2, 3, &xs).unwrap();
        assert!(new_max[0] < act_max[0]);
    }

    #[test]
    fn test_smooth_activations_rejects_ragged_rows() {
        let mut x = vec![1.0f32; 5];
        assert!(smooth_activations(&mut x, &[1.0, 2.0]).is_err());
        assert!(smooth_activations(&mut x, &[]).is_err());
    }
}
