//! Training configuration types.

use burn::config::Config;

use super::{PointTransformerConfig, PreprocessConfig};
use crate::error::PointTransformerError;

/// Configuration for the segmentation loss.
#[derive(Config, Debug)]
pub struct SemSegLossConfig {
    /// Number of classes the network predicts.
    pub num_classes: usize,

    /// Raw label values that are excluded from the loss and from metrics.
    #[config(default = "Vec::new()")]
    pub ignored_labels: Vec<i64>,

    /// Per-class weights. `None` weights every class equally.
    #[config(default = "None")]
    pub class_weights: Option<Vec<f32>>,
}

impl SemSegLossConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.num_classes == 0 {
            return Err(PointTransformerError::config("num_classes must be positive"));
        }
        if let Some(weights) = &self.class_weights {
            if weights.len() != self.num_classes {
                return Err(PointTransformerError::config(format!(
                    "{} class weights given for {} classes",
                    weights.len(),
                    self.num_classes
                )));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(PointTransformerError::config(
                    "class weights must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for the SGD optimizer and its multi-step learning-rate schedule.
#[derive(Config, Debug)]
pub struct OptimizerConfig {
    /// Base learning rate.
    #[config(default = 0.02)]
    pub learning_rate: f64,

    /// SGD momentum.
    #[config(default = 0.9)]
    pub momentum: f64,

    /// Weight decay (L2 penalty).
    #[config(default = 1e-4)]
    pub weight_decay: f64,

    /// Number of epochs the schedule is laid out over.
    #[config(default = 512)]
    pub max_epoch: usize,

    /// Fractions of `max_epoch` at which the learning rate decays.
    #[config(default = "vec![0.6, 0.8]")]
    pub milestones: Vec<f64>,

    /// Multiplicative decay applied at each milestone.
    #[config(default = 0.1)]
    pub gamma: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PointTransformerError::config("learning_rate must be positive"));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(PointTransformerError::config("momentum must lie in [0, 1)"));
        }
        if self.weight_decay < 0.0 {
            return Err(PointTransformerError::config("weight_decay must be non-negative"));
        }
        if self.milestones.iter().any(|m| !(0.0..=1.0).contains(m)) {
            return Err(PointTransformerError::config(
                "milestones are fractions of max_epoch in [0, 1]",
            ));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(PointTransformerError::config("gamma must be positive"));
        }
        Ok(())
    }
}

/// Everything needed to train a segmentation model.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Network configuration.
    pub model: PointTransformerConfig,

    /// Optimizer configuration.
    pub optimizer: OptimizerConfig,

    /// Loss configuration.
    pub loss: SemSegLossConfig,

    /// Data preprocessing configuration.
    pub preprocess: PreprocessConfig,

    /// Number of clouds per batch.
    #[config(default = 2)]
    pub batch_size: usize,

    /// Seed for cropping and batch shuffling.
    #[config(default = 42)]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let model = PointTransformerConfig::new();
        let loss = SemSegLossConfig::new(model.num_classes);
        Self::new(model, OptimizerConfig::new(), loss, PreprocessConfig::new())
    }
}

impl TrainingConfig {
    /// Validate every nested configuration and their agreement.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.model.validate()?;
        self.optimizer.validate()?;
        self.loss.validate()?;
        self.preprocess.validate()?;
        if self.loss.num_classes != self.model.num_classes {
            return Err(PointTransformerError::config(format!(
                "loss expects {} classes but the model predicts {}",
                self.loss.num_classes, self.model.num_classes
            )));
        }
        if self.batch_size == 0 {
            return Err(PointTransformerError::config("batch_size must be positive"));
        }
        Ok(())
    }
}
