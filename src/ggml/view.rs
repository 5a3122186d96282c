//! Strided views over caller-owned byte buffers.
//!
//! A view pairs a borrowed buffer with a byte offset, per-axis element counts
//! `ne` and per-axis byte strides `nb`. Element `(i0, i1, i2, i3)` lives at
//! `offset + i0*nb[0] + i1*nb[1] + i2*nb[2] + i3*nb[3]`. Bounds are checked
//! once at construction so addressing itself is O(1) and panic-free for any
//! in-range coordinate.

use half::f16;

use crate::error::{ForgeError, ForgeResult};
use crate::ggml::shape::{self, MAX_DIMS};
use crate::ggml::{GgmlType, TensorDesc};
use crate::shape_error;

fn check_layout(
    len: usize,
    dtype: GgmlType,
    offset: usize,
    ne: &[usize; MAX_DIMS],
    nb: &[usize; MAX_DIMS],
) -> ForgeResult<()> {
    if dtype.is_quantized() && ne[0] % dtype.block_size() != 0 {
        return Err(shape_error!(
            "ne0 {} of {} view is not a multiple of block size {}",
            ne[0],
            dtype,
            dtype.block_size()
        ));
    }
    let required = shape::required_bytes(dtype, offset, ne, nb);
    if required > len {
        return Err(ForgeError::ViewOutOfBounds {
            required,
            available: len,
        });
    }
    Ok(())
}

#[inline]
fn byte_index(offset: usize, nb: &[usize; MAX_DIMS], idx: [usize; MAX_DIMS]) -> usize {
    offset + idx[0] * nb[0] + idx[1] * nb[1] + idx[2] * nb[2] + idx[3] * nb[3]
}

#[inline]
fn read_f32(data: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn read_f16(data: &[u8], at: usize) -> f32 {
    f16::from_bits(u16::from_le_bytes([data[at], data[at + 1]])).to_f32()
}

#[inline]
fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Read-only strided view
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    data: &'a [u8],
    dtype: GgmlType,
    offset: usize,
    ne: [usize; MAX_DIMS],
    nb: [usize; MAX_DIMS],
}

impl<'a> TensorView<'a> {
    pub fn new(
        data: &'a [u8],
        dtype: GgmlType,
        offset: usize,
        ne: [usize; MAX_DIMS],
        nb: [usize; MAX_DIMS],
    ) -> ForgeResult<Self> {
        check_layout(data.len(), dtype, offset, &ne, &nb)?;
        Ok(Self {
            data,
            dtype,
            offset,
            ne,
            nb,
        })
    }

    /// Densely packed view starting at byte 0
    pub fn contiguous(data: &'a [u8], dtype: GgmlType, ne: [usize; MAX_DIMS]) -> ForgeResult<Self> {
        Self::new(data, dtype, 0, ne, shape::contiguous_strides(dtype, &ne))
    }

    pub fn from_desc(data: &'a [u8], desc: &TensorDesc) -> ForgeResult<Self> {
        Self::new(data, desc.dtype, desc.byte_offset, desc.ne, desc.nb)
    }

    pub fn dtype(&self) -> GgmlType {
        self.dtype
    }

    pub fn ne(&self) -> [usize; MAX_DIMS] {
        self.ne
    }

    pub fn nb(&self) -> [usize; MAX_DIMS] {
        self.nb
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn element_count(&self) -> usize {
        shape::element_count(&self.ne)
    }

    pub fn row_count(&self) -> usize {
        shape::row_count(&self.ne)
    }

    pub fn is_contiguous(&self) -> bool {
        self.nb == shape::contiguous_strides(self.dtype, &self.ne)
    }

    /// Byte address of an element (of a block, for quantized axis 0)
    #[inline]
    pub fn byte_index(&self, idx: [usize; MAX_DIMS]) -> usize {
        byte_index(self.offset, &self.nb, idx)
    }

    /// Element widened to f32. Only meaningful for F32 and F16 views;
    /// kernels check the type before launching lanes.
    #[inline]
    pub fn get_f32(&self, idx: [usize; MAX_DIMS]) -> f32 {
        let at = self.byte_index(idx);
        match self.dtype {
            GgmlType::F16 => read_f16(self.data, at),
            _ => read_f32(self.data, at),
        }
    }

    #[inline]
    pub fn get_i32(&self, idx: [usize; MAX_DIMS]) -> i32 {
        read_i32(self.data, self.byte_index(idx))
    }

    /// Packed bytes of row `(i1, i2, i3)`. Requires `nb[0] == type_size`.
    pub fn row_bytes(&self, i1: usize, i2: usize, i3: usize) -> &'a [u8] {
        let start = self.byte_index([0, i1, i2, i3]);
        &self.data[start..start + self.dtype.row_size(self.ne[0])]
    }
}

/// Writable strided view
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    data: &'a mut [u8],
    dtype: GgmlType,
    offset: usize,
    ne: [usize; MAX_DIMS],
    nb: [usize; MAX_DIMS],
}

impl<'a> TensorViewMut<'a> {
    pub fn new(
        data: &'a mut [u8],
        dtype: GgmlType,
        offset: usize,
        ne: [usize; MAX_DIMS],
        nb: [usize; MAX_DIMS],
    ) -> ForgeResult<Self> {
        check_layout(data.len(), dtype, offset, &ne, &nb)?;
        Ok(Self {
            data,
            dtype,
            offset,
            ne,
            nb,
        })
    }

    pub fn contiguous(
        data: &'a mut [u8],
        dtype: GgmlType,
        ne: [usize; MAX_DIMS],
    ) -> ForgeResult<Self> {
        let nb = shape::contiguous_strides(dtype, &ne);
        Self::new(data, dtype, 0, ne, nb)
    }

    pub fn from_desc(data: &'a mut [u8], desc: &TensorDesc) -> ForgeResult<Self> {
        Self::new(data, desc.dtype, desc.byte_offset, desc.ne, desc.nb)
    }

    /// Reborrow as a read-only view
    pub fn as_view(&self) -> TensorView<'_> {
        TensorView {
            data: &*self.data,
            dtype: self.dtype,
            offset: self.offset,
            ne: self.ne,
            nb: self.nb,
        }
    }

    pub fn dtype(&self) -> GgmlType {
        self.dtype
    }

    pub fn ne(&self) -> [usize; MAX_DIMS] {
        self.ne
    }

    pub fn nb(&self) -> [usize; MAX_DIMS] {
        self.nb
    }

    pub fn element_count(&self) -> usize {
        shape::element_count(&self.ne)
    }

    pub fn row_count(&self) -> usize {
        shape::row_count(&self.ne)
    }

    pub fn is_contiguous(&self) -> bool {
        self.nb == shape::contiguous_strides(self.dtype, &self.ne)
    }

    #[inline]
    pub fn byte_index(&self, idx: [usize; MAX_DIMS]) -> usize {
        byte_index(self.offset, &self.nb, idx)
    }

    /// Store an f32, narrowing to half precision for F16 views
    #[inline]
    pub fn set_f32(&mut self, idx: [usize; MAX_DIMS], value: f32) {
        let at = self.byte_index(idx);
        match self.dtype {
            GgmlType::F16 => {
                let bytes = f16::from_f32(value).to_bits().to_le_bytes();
                self.data[at..at + 2].copy_from_slice(&bytes);
            }
            _ => self.data[at..at + 4].copy_from_slice(&value.to_le_bytes()),
        }
    }

    #[inline]
    pub fn set_i32(&mut self, idx: [usize; MAX_DIMS], value: i32) {
        let at = self.byte_index(idx);
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Packed bytes of row `(i1, i2, i3)`. Requires `nb[0] == type_size`.
    pub fn row_bytes_mut(&mut self, i1: usize, i2: usize, i3: usize) -> &mut [u8] {
        let start = self.byte_index([0, i1, i2, i3]);
        let len = self.dtype.row_size(self.ne[0]);
        &mut self.data[start..start + len]
    }
}
