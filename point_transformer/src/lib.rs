//! # point_transformer
//!
//! Point Transformer semantic segmentation with Burn.
//!
//! The network consumes a batch of point clouds of varying sizes, concatenated along
//! the point axis and delimited by [`RowSplits`], and predicts one class per point.
//! Neighborhoods never cross cloud boundaries.
//!
//! ## Features
//!
//! - **Vector attention**: per-channel-group attention over k-nearest neighborhoods
//! - **U-shaped network**: furthest-point downsampling, interpolating upsampling
//! - **Pluggable neighbor search**: any [`NeighborSearch`], kd-tree by default
//! - **Training**: weighted cross-entropy, SGD with multi-step decay, IoU metrics
//! - **Data pipeline**: cropping, recentering, feature scaling, batch collation
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use burn::backend::{Autodiff, NdArray};
//! use point_transformer::prelude::*;
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let config = TrainingConfig::default();
//! let mut trainer =
//!     SegmentationTrainer::<MyBackend>::new(&config, Arc::new(KdTreeSearch::new()), &device)?;
//!
//! let clouds = load_clouds("area_1");
//! let refs: Vec<_> = clouds.iter().collect();
//! let batch = ConcatBatcher::new().collate::<MyBackend>(&refs, &device)?;
//! let metrics = trainer.train_step(&batch, 0)?;
//! metrics.log("train");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! pt_core (neighbor search, sampling, row splits)
//!     │
//!     ▼
//! point_transformer
//!     nn:       Pxo → TransitionDown → Bottleneck … → TransitionUp → head
//!     loss:     label filtering, weighted cross-entropy
//!     training: batching, SGD, metrics, trainer
//!     data:     clouds, preprocessing
//! ```
//!
//! ## Feature Flags
//!
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod nn;
pub mod training;

// Re-export key types for convenience
pub use config::{OptimizerConfig, PointTransformerConfig, SemSegLossConfig, TrainingConfig};
pub use error::{PointTransformerError, Result};
pub use loss::SemSegLoss;
pub use nn::{PointTransformer, Pxo};
pub use training::{ConcatBatcher, SegmentationBatch, SegmentationTrainer, StepMetrics};

pub use pt_core::{KdTreeSearch, NeighborSearch, Point3, RowSplits};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        BottleneckConfig, OptimizerConfig, PointTransformerConfig, PreprocessConfig,
        SemSegLossConfig, TrainingConfig, TransitionDownConfig, TransitionUpConfig,
        VectorAttentionConfig,
    };
    pub use crate::data::{
        crop_to_ceiling, projection_indices, recenter, Preprocessor, ProcessedCloud,
        SegmentationCloud, Split,
    };
    pub use crate::error::{PointTransformerError, Result};
    pub use crate::loss::{class_weights_from_counts, filter_valid_labels, LossOutput, SemSegLoss};
    pub use crate::nn::{
        interpolate, query_and_group, Bottleneck, LinearBlock, LinearBlockConfig,
        PointTransformer, Pxo, TransitionDown, TransitionUp, VectorAttention,
        INTERPOLATION_NEIGHBORS,
    };
    pub use crate::training::{
        accuracy, predictions, ConcatBatcher, MultiStepSchedule, SegmentationBatch,
        SegmentationMetrics, SegmentationTrainer, SgdOptimizer, StepMetrics,
    };

    pub use pt_core::{
        furthest_point_sample, BruteForceSearch, KdTreeSearch, NeighborIndex, NeighborSearch,
        Point3, RowSplits,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api() {
        let _config = TrainingConfig::default();
        let _network = PointTransformerConfig::new();
        let _loss = SemSegLossConfig::new(13);
        let _search = KdTreeSearch::new();
    }
}
