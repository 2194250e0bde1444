//! Error types for units, persistence and training.

use fwd_tensor::TensorError;
use thiserror::Error;

/// Errors raised by units, losses, persistence and the trainer.
#[derive(Debug, Error)]
pub enum NnError {
    /// A unit cannot be built from inconsistent dimensions.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A call received a tensor or slice of the wrong length.
    #[error("Size mismatch: expected {expected} elements, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    /// Single-parameter access beyond `variable_count`.
    #[error("Parameter index {index} out of range ({count} parameters)")]
    ParameterOutOfRange { index: usize, count: usize },

    /// The loss needs a label and the dataset has none.
    #[error("Loss requires a label for sample")]
    MissingLabel,

    /// Persisted data uses an unknown tag or an impossible length.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NnError>;

/// Fail with [`NnError::SizeMismatch`] unless `got == expected`.
pub(crate) fn check_size(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(NnError::SizeMismatch { expected, got });
    }
    Ok(())
}
