//! Error types for tensor construction and access.

use thiserror::Error;

/// Errors raised by [`Shape`](crate::Shape) and [`Tensor`](crate::Tensor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    /// Rank 0 or a zero-length dimension.
    #[error("Invalid shape {dims:?}: need at least one dimension, all lengths positive")]
    InvalidShape { dims: Vec<usize> },

    /// Flat data length doesn't match the element count of the shape.
    #[error("Size mismatch: expected {expected} elements, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    /// Multi-index has the wrong rank or lies outside the shape.
    #[error("Index {index:?} out of range for shape {dims:?}")]
    IndexOutOfRange { index: Vec<usize>, dims: Vec<usize> },

    /// Flat index past the end of the backing store.
    #[error("Linear index {index} out of range for {len} elements")]
    LinearIndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, TensorError>;
