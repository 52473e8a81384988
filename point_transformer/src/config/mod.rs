//! Configuration types for point_transformer.
//!
//! Burn-style configuration structs for the network blocks, the loss, the optimizer and
//! the data pipeline. Every struct derives [`burn::config::Config`], so it can be saved
//! to and loaded from JSON alongside a trained model.

mod data;
mod network;
mod training;

pub use data::PreprocessConfig;
pub use network::{
    BottleneckConfig, PointTransformerConfig, TransitionDownConfig, TransitionUpConfig,
    VectorAttentionConfig,
};
pub use training::{OptimizerConfig, SemSegLossConfig, TrainingConfig};
