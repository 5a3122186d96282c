//! Backend interface for ggml op execution.

use crate::error::ForgeResult;
use crate::ggml::{Op, TensorDesc, TensorId};

/// Owns tensor storage and runs ops over it.
///
/// Tensors are registered under the id in their descriptor. Every op reads
/// its inputs and writes its outputs by id; the descriptor decides how the
/// bytes of the bound buffer are interpreted.
pub trait GgmlBackend {
    type Buffer;

    /// Register `desc` with a zero-filled buffer
    fn alloc(&mut self, desc: &TensorDesc) -> ForgeResult<()>;
    /// Register `desc` with a caller-provided buffer
    fn bind(&mut self, desc: &TensorDesc, buffer: Self::Buffer) -> ForgeResult<()>;
    fn free(&mut self, id: TensorId) -> ForgeResult<()>;
    fn tensor_desc(&self, id: TensorId) -> Option<&TensorDesc>;
    fn buffer(&self, id: TensorId) -> Option<&Self::Buffer>;
    fn buffer_mut(&mut self, id: TensorId) -> Option<&mut Self::Buffer>;

    fn execute_op(
        &mut self,
        op: &Op,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> ForgeResult<()>;

    fn synchronize(&mut self) -> ForgeResult<()>;
}
