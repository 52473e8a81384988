//! Error types for pt_core operations.

use thiserror::Error;

/// Errors raised by batched point-cloud primitives.
///
/// None of these are recoverable inside a forward pass; they propagate to the
/// caller unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Two row-split sequences that must describe the same batch disagree on
    /// the number of clouds.
    #[error("batch mismatch: {left} clouds in source splits but {right} in query splits")]
    BatchMismatch {
        /// Cloud count of the first sequence.
        left: usize,
        /// Cloud count of the second sequence.
        right: usize,
    },

    /// An array length does not match what its row splits describe.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which buffer was checked.
        what: &'static str,
        /// Length implied by the row splits.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// A row-split sequence is malformed (empty, not starting at zero, or
    /// decreasing).
    #[error("invalid row splits: {reason}")]
    InvalidRowSplits {
        /// Description of the violation.
        reason: String,
    },

    /// Input too small to process under the configured parameters.
    #[error("degenerate input: {reason}")]
    DegenerateInput {
        /// Description of the degenerate case.
        reason: String,
    },
}

/// Result type for pt_core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
