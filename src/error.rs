//! Unified error handling for tensorforge
//!
//! A single error type covers every failure the compute layer can report:
//! - User errors (malformed shapes, views that do not fit their buffer, bad launch parameters)
//! - Type registry errors (unknown or unsupported type tags)
//! - Internal errors (a registry record missing a conversion function)
//!
//! Kernels never retry. Every operation either completes for all lanes or
//! returns one of these errors before any lane has written to the destination.

use std::fmt;

use crate::ggml::GgmlType;

/// Unified error type for tensorforge
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    // ========== Type Registry Errors ==========
    /// Type tag is not present in the registry
    #[error("Unknown type tag: {0}")]
    UnknownType(u32),

    /// Operation does not accept tensors of this type
    #[error("Operation {op} does not support type {dtype}")]
    UnsupportedType { op: &'static str, dtype: GgmlType },

    /// Registered type lacks the requested conversion or dot product
    #[error("Type {dtype} has no {function} function")]
    MissingTypeFunction {
        dtype: GgmlType,
        function: &'static str,
    },

    // ========== Tensor View Errors ==========
    /// Invalid tensor shape or stride combination
    #[error("Invalid tensor shape: {0}")]
    InvalidShape(String),

    /// View addresses bytes past the end of its buffer
    #[error("Tensor view out of bounds: needs {required} bytes, buffer has {available}")]
    ViewOutOfBounds { required: usize, available: usize },

    /// Flat buffer handed to a conversion is too small
    #[error("Buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    /// Tensor id not registered with the backend
    #[error("Tensor not found: {0}")]
    TensorNotFound(usize),

    // ========== Launch Errors ==========
    /// Kernel launch parameters are inconsistent
    #[error("Invalid launch configuration: {0}")]
    InvalidLaunch(String),

    /// Sort order flag outside {0, 1}
    #[error("Invalid sort order: {0}")]
    InvalidSortOrder(i32),

    // ========== Configuration Errors ==========
    /// Invalid backend configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Dedicated worker pool could not be created
    #[error("Thread pool creation failed: {0}")]
    ThreadPool(String),

    /// Tracing subscriber could not be installed
    #[error("Logging initialization failed: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

impl ForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            ForgeError::UnknownType(_)
            | ForgeError::UnsupportedType { .. }
            | ForgeError::InvalidShape(_)
            | ForgeError::ViewOutOfBounds { .. }
            | ForgeError::BufferTooSmall { .. }
            | ForgeError::TensorNotFound(_)
            | ForgeError::InvalidLaunch(_)
            | ForgeError::InvalidSortOrder(_)
            | ForgeError::InvalidConfiguration(_) => ErrorCategory::User,

            ForgeError::ThreadPool(_) | ForgeError::Logging(_) => ErrorCategory::Recoverable,

            ForgeError::MissingTypeFunction { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if this error is recoverable (temporary condition)
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Recoverable)
    }

    /// Check if this is a user-facing error (actionable by the caller)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
///
/// - User: caller passed a malformed tensor, tag or configuration
/// - Recoverable: resource acquisition failed, may succeed later
/// - Internal: log and report as bug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User error - invalid input or configuration
    User,
    /// Recoverable error - temporary condition
    Recoverable,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Recoverable => write!(f, "Recoverable"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for ForgeError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ForgeError::ThreadPool(err.to_string())
    }
}

/// Result type alias for tensorforge operations
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

/// Create a shape error with context
///
/// # Examples
/// ```ignore
/// return Err(shape_error!("ne00 {} exceeds local size {}", ne00, max));
/// ```
#[macro_export]
macro_rules! shape_error {
    ($msg:expr) => {
        $crate::error::ForgeError::InvalidShape($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ForgeError::InvalidShape(format!($fmt, $($arg)*))
    };
}

/// Create a launch error with context
#[macro_export]
macro_rules! launch_error {
    ($msg:expr) => {
        $crate::error::ForgeError::InvalidLaunch($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ForgeError::InvalidLaunch(format!($fmt, $($arg)*))
    };
}
