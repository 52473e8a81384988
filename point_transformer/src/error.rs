//! Error types for point_transformer.

use pt_core::CoreError;
use thiserror::Error;

/// Errors that can occur while building or running the network.
#[derive(Error, Debug)]
pub enum PointTransformerError {
    /// Invalid configuration, detected when a module is built.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Batch-layout, shape or degenerate-input error from the point primitives.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Tensor data could not be read back to host memory.
    #[error("tensor data error: {0}")]
    TensorData(String),

    /// Invalid or inconsistent input data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl PointTransformerError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for point_transformer operations.
pub type Result<T> = std::result::Result<T, PointTransformerError>;
