//! Type registry: tag -> capability record
//!
//! Every tensor type the compute layer understands is described by one
//! [`TypeTraits`] record. Callers look the record up by tag and use its
//! function pointers instead of matching on the type themselves. The global
//! registry is built once on first use and is read-only afterwards, so
//! lookups from any thread need no locking.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use super::{float, q8_0, q8_a8};
use crate::error::{ForgeError, ForgeResult};
use crate::ggml::GgmlType;

/// Decode `dst.len()` elements from encoded bytes
pub type ToFloatFn = fn(&[u8], &mut [f32]) -> ForgeResult<()>;

/// Encode floats into whole blocks
pub type FromFloatFn = fn(&[f32], &mut [u8]) -> ForgeResult<()>;

/// Dot product over `n` logical elements of two encoded rows
pub type VecDotFn = fn(usize, &[u8], &[u8]) -> ForgeResult<f32>;

/// Capability record of one type tag
#[derive(Clone, Copy)]
pub struct TypeTraits {
    pub dtype: GgmlType,
    pub type_name: &'static str,
    pub blck_size: usize,
    pub type_size: usize,
    pub is_quantized: bool,
    pub to_float: Option<ToFloatFn>,
    pub from_float: Option<FromFloatFn>,
    pub vec_dot: Option<VecDotFn>,
    /// Type the second dot operand must be encoded in
    pub vec_dot_type: GgmlType,
}

impl TypeTraits {
    /// Record with sizes taken from the tag and no functions
    pub fn bare(dtype: GgmlType) -> Self {
        Self {
            dtype,
            type_name: dtype.name(),
            blck_size: dtype.block_size(),
            type_size: dtype.type_size(),
            is_quantized: dtype.is_quantized(),
            to_float: None,
            from_float: None,
            vec_dot: None,
            vec_dot_type: dtype,
        }
    }

    fn with_functions(mut self, to_float: ToFloatFn, from_float: FromFloatFn, vec_dot: VecDotFn) -> Self {
        self.to_float = Some(to_float);
        self.from_float = Some(from_float);
        self.vec_dot = Some(vec_dot);
        self
    }

    pub fn row_size(&self, n: usize) -> usize {
        self.type_size * n.div_ceil(self.blck_size)
    }

    pub fn to_float_fn(&self) -> ForgeResult<ToFloatFn> {
        self.to_float.ok_or(ForgeError::MissingTypeFunction {
            dtype: self.dtype,
            function: "to_float",
        })
    }

    pub fn from_float_fn(&self) -> ForgeResult<FromFloatFn> {
        self.from_float.ok_or(ForgeError::MissingTypeFunction {
            dtype: self.dtype,
            function: "from_float",
        })
    }

    pub fn vec_dot_fn(&self) -> ForgeResult<VecDotFn> {
        self.vec_dot.ok_or(ForgeError::MissingTypeFunction {
            dtype: self.dtype,
            function: "vec_dot",
        })
    }
}

impl fmt::Debug for TypeTraits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeTraits")
            .field("dtype", &self.dtype)
            .field("blck_size", &self.blck_size)
            .field("type_size", &self.type_size)
            .field("is_quantized", &self.is_quantized)
            .field("to_float", &self.to_float.is_some())
            .field("from_float", &self.from_float.is_some())
            .field("vec_dot", &self.vec_dot.is_some())
            .field("vec_dot_type", &self.vec_dot_type)
            .finish()
    }
}

/// Map from type tag to capability record
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    records: HashMap<GgmlType, TypeTraits>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in type
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TypeTraits::bare(GgmlType::F32).with_functions(
            float::f32_to_float,
            float::f32_from_float,
            float::f32_vec_dot,
        ));
        registry.register(TypeTraits::bare(GgmlType::F16).with_functions(
            float::f16_to_float,
            float::f16_from_float,
            float::f16_vec_dot,
        ));
        registry.register(TypeTraits::bare(GgmlType::Q8_0).with_functions(
            q8_0::dequantize_row_q8_0,
            q8_0::quantize_row_q8_0,
            q8_0::vec_dot_q8_0_q8_0,
        ));
        // argsort output only
        registry.register(TypeTraits::bare(GgmlType::I32));
        registry.register(TypeTraits::bare(GgmlType::Q8_A8).with_functions(
            q8_a8::dequantize_row_q8_a8,
            q8_a8::quantize_row_q8_a8,
            q8_a8::vec_dot_q8_a8_q8_a8,
        ));
        registry
    }

    /// Add or replace the record for `traits.dtype`
    pub fn register(&mut self, traits: TypeTraits) {
        self.records.insert(traits.dtype, traits);
    }

    pub fn get(&self, dtype: GgmlType) -> ForgeResult<&TypeTraits> {
        self.records
            .get(&dtype)
            .ok_or(ForgeError::UnknownType(dtype.as_u32()))
    }

    /// Look up a raw tag. Unknown tags are an error, never a default record.
    pub fn lookup(&self, tag: u32) -> ForgeResult<&TypeTraits> {
        let dtype = GgmlType::from_u32(tag)?;
        self.get(dtype)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registered tags in ascending order
    pub fn tags(&self) -> Vec<u32> {
        let mut tags: Vec<u32> = self.records.keys().map(|t| t.as_u32()).collect();
        tags.sort_unstable();
        tags
    }
}

static REGISTRY: Lazy<TypeRegistry> = Lazy::new(|| {
    let registry = TypeRegistry::with_builtin();
    tracing::debug!(tags = ?registry.tags(), "type registry initialized");
    registry
});

/// The process-wide registry of built-in types
pub fn registry() -> &'static TypeRegistry {
    &REGISTRY
}

/// Look up a raw tag in the global registry
pub fn type_traits(tag: u32) -> ForgeResult<&'static TypeTraits> {
    registry().lookup(tag)
}
