//! Sorting kernels
//!
//! - `argsort`: per-row bitonic index sort producing a permutation

pub mod argsort;

pub use argsort::{argsort, argsort_padded, argsort_row};
