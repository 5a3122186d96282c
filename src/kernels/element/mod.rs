//! Element-wise kernel implementations
//!
//! One independent lane per element:
//! - Sigmoid: logistic function over F32 and F16 tensors

pub mod sigmoid;

pub use sigmoid::{sigmoid, sigmoid_f32};
