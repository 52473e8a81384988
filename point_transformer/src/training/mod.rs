//! Training infrastructure for segmentation.
//!
//! - [`ConcatBatcher`]: collates variable-size clouds into one batch with row splits
//! - [`MultiStepSchedule`]: step-decayed learning rate for SGD
//! - [`SegmentationMetrics`]: accuracy and IoU from a confusion matrix
//! - [`SegmentationTrainer`]: forward, loss, backward and optimizer step

mod batch;
mod metrics;
mod optimizer;
mod trainer;

pub use batch::{ConcatBatcher, SegmentationBatch};
pub use metrics::{accuracy, predictions, SegmentationMetrics, StepMetrics};
pub use optimizer::MultiStepSchedule;
pub use trainer::{SegmentationTrainer, SgdOptimizer};
