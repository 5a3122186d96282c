//! Supported ggml operations.

use crate::error::{ForgeError, ForgeResult};

/// Direction of an argsort, matching the kernel's integer `order` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum SortOrder {
    #[default]
    Asc = 0,
    Desc = 1,
}

impl SortOrder {
    pub fn from_i32(value: i32) -> ForgeResult<Self> {
        match value {
            0 => Ok(SortOrder::Asc),
            1 => Ok(SortOrder::Desc),
            _ => Err(ForgeError::InvalidSortOrder(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Sigmoid,
    SumRows,
    GroupNorm { group_size: usize, eps: f32 },
    ArgSort { order: SortOrder },
    /// Convert an F32 tensor into the output tensor's type
    Quantize,
    /// Convert any registered type into an F32 output tensor
    Dequantize,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Sigmoid => "sigmoid",
            Op::SumRows => "sum_rows",
            Op::GroupNorm { .. } => "group_norm",
            Op::ArgSort { .. } => "argsort",
            Op::Quantize => "quantize",
            Op::Dequantize => "dequantize",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_from_i32() {
        assert_eq!(SortOrder::from_i32(0).unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::from_i32(1).unwrap(), SortOrder::Desc);
        assert!(matches!(
            SortOrder::from_i32(2),
            Err(ForgeError::InvalidSortOrder(2))
        ));
    }

    #[test]
    fn test_op_names() {
        assert_eq!(Op::Sigmoid.name(), "sigmoid");
        assert_eq!(
            Op::GroupNorm {
                group_size: 4,
                eps: 1e-5
            }
            .name(),
            "group_norm"
        );
        assert_eq!(
            Op::ArgSort {
                order: SortOrder::Desc
            }
            .name(),
            "argsort"
        );
    }
}
