//! ggml-style tensors, views, ops and the backend contract.

pub mod backend;
pub mod cpu_backend;
pub mod dtype;
pub mod op;
pub mod shape;
pub mod tensor;
pub mod view;

pub use backend::GgmlBackend;
pub use cpu_backend::CpuBackend;
pub use dtype::GgmlType;
pub use op::{Op, SortOrder};
pub use shape::MAX_DIMS;
pub use tensor::{TensorDesc, TensorId};
pub use view::{TensorView, TensorViewMut};
