//! CPU kernel implementations
//!
//! Kernels are organized by operation type:
//! - `element`: element-wise operations (sigmoid)
//! - `reduce`: row and group reductions (sum_rows, group_norm)
//! - `sort`: per-row bitonic argsort
//! - `quant`: block quantization, float conversions and the type registry
//! - `launch`: work-group execution model shared by the kernels above

pub mod element;
pub mod launch;
pub mod quant;
pub mod reduce;
pub mod sort;
