//! Loss functions for semantic segmentation.
//!
//! - Label filtering: drops ignored labels and remaps the rest into `[0, num_classes)`
//! - Weighted cross-entropy over the surviving rows
//! - Class weights derived from label frequencies

mod semseg;

pub use semseg::{class_weights_from_counts, filter_valid_labels, LossOutput, SemSegLoss};
