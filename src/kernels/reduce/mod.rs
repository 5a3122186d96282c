//! Row reduction kernels
//!
//! - `sum_rows`: per-row sum over the innermost axis
//! - `group_norm`: mean/variance normalization of contiguous element groups

pub mod group_norm;
pub mod sum_rows;

pub use group_norm::group_norm;
pub use sum_rows::sum_rows;
