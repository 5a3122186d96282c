//! Tensor descriptors for ggml IR.

use crate::error::ForgeResult;
use crate::ggml::shape::{self, MAX_DIMS};
use crate::ggml::GgmlType;
use crate::shape_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(pub usize);

/// Shape, strides and placement of a tensor inside a buffer.
///
/// `ne` counts elements per axis (innermost first), `nb` holds byte strides.
/// A descriptor never owns memory; `byte_offset` locates the tensor within
/// whatever buffer it is bound to, so several descriptors can sub-allocate
/// one arena.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDesc {
    pub id: TensorId,
    pub dtype: GgmlType,
    pub ne: [usize; MAX_DIMS],
    pub nb: [usize; MAX_DIMS],
    pub byte_offset: usize,
    pub view_of: Option<TensorId>,
}

impl TensorDesc {
    /// Densely packed tensor. Missing trailing axes are 1.
    pub fn new(dtype: GgmlType, shape: &[usize]) -> ForgeResult<Self> {
        if shape.is_empty() || shape.len() > MAX_DIMS {
            return Err(shape_error!(
                "expected 1 to {} axes, got {}",
                MAX_DIMS,
                shape.len()
            ));
        }
        let mut ne = [1usize; MAX_DIMS];
        ne[..shape.len()].copy_from_slice(shape);
        if dtype.is_quantized() && ne[0] % dtype.block_size() != 0 {
            return Err(shape_error!(
                "ne0 {} of {} tensor is not a multiple of block size {}",
                ne[0],
                dtype,
                dtype.block_size()
            ));
        }
        Ok(Self {
            id: TensorId(0),
            dtype,
            ne,
            nb: shape::contiguous_strides(dtype, &ne),
            byte_offset: 0,
            view_of: None,
        })
    }

    pub fn with_id(mut self, id: TensorId) -> Self {
        self.id = id;
        self
    }

    pub fn with_strides(mut self, nb: [usize; MAX_DIMS]) -> Self {
        self.nb = nb;
        self
    }

    pub fn view_of(mut self, source: TensorId, byte_offset: usize) -> Self {
        self.view_of = Some(source);
        self.byte_offset = byte_offset;
        self
    }

    pub fn is_view(&self) -> bool {
        self.view_of.is_some()
    }

    pub fn element_count(&self) -> usize {
        shape::element_count(&self.ne)
    }

    pub fn row_count(&self) -> usize {
        shape::row_count(&self.ne)
    }

    /// Whether the strides equal those of a densely packed tensor
    pub fn is_contiguous(&self) -> bool {
        self.nb == shape::contiguous_strides(self.dtype, &self.ne)
    }

    /// Bytes a buffer must hold for this descriptor, offset included
    pub fn required_bytes(&self) -> usize {
        shape::required_bytes(self.dtype, self.byte_offset, &self.ne, &self.nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;

    #[test]
    fn test_new_pads_trailing_axes() {
        let desc = TensorDesc::new(GgmlType::F32, &[8, 2]).unwrap();
        assert_eq!(desc.ne, [8, 2, 1, 1]);
        assert_eq!(desc.nb, [4, 32, 64, 64]);
        assert_eq!(desc.element_count(), 16);
        assert_eq!(desc.row_count(), 2);
        assert!(desc.is_contiguous());
        assert_eq!(desc.required_bytes(), 64);
    }

    #[test]
    fn test_new_rejects_bad_rank() {
        assert!(TensorDesc::new(GgmlType::F32, &[]).is_err());
        assert!(TensorDesc::new(GgmlType::F32, &[1, 1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_new_rejects_partial_block_axis() {
        let err = TensorDesc::new(GgmlType::Q8_0, &[33]).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidShape(_)));
        assert!(TensorDesc::new(GgmlType::Q8_0, &[64, 4]).is_ok());
    }

    #[test]
    fn test_view_of_sets_offset() {
        let desc = TensorDesc::new(GgmlType::F16, &[4])
            .unwrap()
            .with_id(TensorId(3))
            .view_of(TensorId(1), 128);
        assert!(desc.is_view());
        assert_eq!(desc.byte_offset, 128);
        assert_eq!(desc.required_bytes(), 136);
    }

    #[test]
    fn test_custom_strides_not_contiguous() {
        let desc = TensorDesc::new(GgmlType::F32, &[4, 2])
            .unwrap()
            .with_strides([4, 64, 128, 128]);
        assert!(!desc.is_contiguous());
    }
}
