//! tensorforge - tensor compute kernels for ggml-style tensors
//!
//! CPU implementations of a small set of primitive kernels over strided
//! 4-D tensor views (sigmoid, row sums, group normalization, bitonic
//! argsort) plus block quantization behind a type registry.

#![allow(clippy::too_many_arguments)] // Kernel launches need many args
#![allow(clippy::needless_range_loop)] // Clearer for lane/row indexing

pub mod config;
pub mod error;
pub mod ggml;
pub mod kernels;
pub mod logging;

pub use config::BackendConfig;
pub use error::{ErrorCategory, ForgeError, ForgeResult};
pub use ggml::{
    CpuBackend, GgmlBackend, GgmlType, Op, SortOrder, TensorDesc, TensorId, TensorView,
    TensorViewMut,
};
pub use kernels::quant::{registry, type_traits, TypeRegistry, TypeTraits};
pub use logging::{init_logging_default, init_logging_from_env, init_with_config, LoggingConfig};
