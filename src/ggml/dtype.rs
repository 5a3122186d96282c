//! Tensor type tags (ggml_type numbering)

use std::fmt;

use crate::error::{ForgeError, ForgeResult};
use crate::kernels::quant::common::{Q8_0_BLOCK_BYTES, Q8_A8_BLOCK_BYTES, QK8_0, QK8_A8};

/// Element type tag of a tensor.
///
/// Discriminants follow the ggml_type enum so tags read from foreign
/// metadata map one-to-one. `Q8_A8` is the SmoothQuant W8A8 block format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum GgmlType {
    F32 = 0,
    F16 = 1,
    Q8_0 = 8,
    I32 = 26,
    Q8_A8 = 39,
}

impl GgmlType {
    /// Every tag known to this build, in tag order
    pub const ALL: [GgmlType; 5] = [
        GgmlType::F32,
        GgmlType::F16,
        GgmlType::Q8_0,
        GgmlType::I32,
        GgmlType::Q8_A8,
    ];

    /// Parse a type tag. Unknown tags are an error, never a default.
    pub fn from_u32(value: u32) -> ForgeResult<Self> {
        match value {
            0 => Ok(GgmlType::F32),
            1 => Ok(GgmlType::F16),
            8 => Ok(GgmlType::Q8_0),
            26 => Ok(GgmlType::I32),
            39 => Ok(GgmlType::Q8_A8),
            _ => Err(ForgeError::UnknownType(value)),
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            GgmlType::F32 => "F32",
            GgmlType::F16 => "F16",
            GgmlType::Q8_0 => "Q8_0",
            GgmlType::I32 => "I32",
            GgmlType::Q8_A8 => "Q8_A8",
        }
    }

    /// Number of logical elements encoded by one block (1 for scalar types)
    pub fn block_size(&self) -> usize {
        match self {
            GgmlType::Q8_0 => QK8_0,
            GgmlType::Q8_A8 => QK8_A8,
            GgmlType::F32 | GgmlType::F16 | GgmlType::I32 => 1,
        }
    }

    /// Size in bytes of one block (of one element for scalar types)
    pub fn type_size(&self) -> usize {
        match self {
            GgmlType::F32 | GgmlType::I32 => 4,
            GgmlType::F16 => 2,
            GgmlType::Q8_0 => Q8_0_BLOCK_BYTES,
            GgmlType::Q8_A8 => Q8_A8_BLOCK_BYTES,
        }
    }

    pub fn is_quantized(&self) -> bool {
        self.block_size() > 1
    }

    /// Bytes needed to store `n` elements; a partial final block occupies a whole block
    pub fn row_size(&self, n: usize) -> usize {
        self.type_size() * n.div_ceil(self.block_size())
    }
}

impl fmt::Display for GgmlType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
