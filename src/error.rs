// In: src/error.rs

//! This module defines the single, unified error type for the batchmsg library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every failure here is local and recoverable by the caller. Operations validate
//! their preconditions and return one of these variants before mutating anything.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessageError {
    // =========================================================================
    // === Window & Argument Errors
    // =========================================================================
    /// Negative or inverted indices, or a window that does not fit its batch.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested row range lies outside the rows it addresses.
    #[error("Row range out of bounds: {0}")]
    OutOfRange(String),

    /// A declared row count disagrees with the rows actually supplied.
    #[error("Size mismatch for {what}: expected {expected} rows, got {actual}")]
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    // =========================================================================
    // === Lookup Errors
    // =========================================================================
    #[error("Column not found in message metadata: {0}")]
    ColumnNotFound(String),

    #[error("Tensor not found in tensor memory: {0}")]
    TensorNotFound(String),

    #[error("Type mismatch writing column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// A writer panicked while holding the lock on shared storage.
    #[error("Shared storage lock poisoned: {0}")]
    LockPoisoned(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A tensor could not be reshaped or concatenated.
    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// An error from the Serde JSON library, typically while loading a `MessageConfig`.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error for Python FFI operations.
    #[error("FFI operation failed: {0}")]
    FfiError(String), // PyErr doesn't impl Error, so we can't use #[from] here.
}

impl MessageError {
    pub(crate) fn size_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        MessageError::SizeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MessageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        MessageError::LockPoisoned(err.to_string())
    }
}

// =============================================================================
// === Python Conversions ===
// =============================================================================

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for MessageError {
    fn from(err: pyo3::PyErr) -> Self {
        MessageError::FfiError(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<MessageError> for pyo3::PyErr {
    fn from(err: MessageError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIndexError, PyKeyError, PyRuntimeError, PyValueError};

        let msg = err.to_string();
        match err {
            MessageError::InvalidArgument(_)
            | MessageError::SizeMismatch { .. }
            | MessageError::TypeMismatch { .. } => PyValueError::new_err(msg),
            MessageError::ColumnNotFound(_) | MessageError::TensorNotFound(_) => {
                PyKeyError::new_err(msg)
            }
            MessageError::OutOfRange(_) => PyIndexError::new_err(msg),
            _ => PyRuntimeError::new_err(msg),
        }
    }
}
