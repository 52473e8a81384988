//! Segmentation trainer.

use std::sync::Arc;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{GradientsParams, Optimizer, Sgd};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use pt_core::NeighborSearch;

use crate::config::TrainingConfig;
use crate::error::{PointTransformerError, Result};
use crate::loss::SemSegLoss;
use crate::nn::{host_values, PointTransformer};

use super::batch::SegmentationBatch;
use super::metrics::{accuracy, SegmentationMetrics, StepMetrics};
use super::optimizer::MultiStepSchedule;

/// Default optimizer of a [`SegmentationTrainer`].
pub type SgdOptimizer<B> =
    OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, PointTransformer<B>, B>;

/// Trains a [`PointTransformer`] with a weighted cross-entropy loss.
///
/// The neighbor search is shared with every forward pass; the optimizer defaults to
/// SGD with momentum and a multi-step learning-rate schedule.
pub struct SegmentationTrainer<B: AutodiffBackend, O = SgdOptimizer<B>> {
    model: PointTransformer<B>,
    optimizer: O,
    loss: SemSegLoss,
    schedule: MultiStepSchedule,
    search: Arc<dyn NeighborSearch>,
    step: usize,
}

impl<B: AutodiffBackend> SegmentationTrainer<B> {
    /// Build the model, loss and optimizer from a training configuration.
    pub fn new(config: &TrainingConfig, search: Arc<dyn NeighborSearch>, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let model = config.model.init(device)?;
        let optimizer = config.optimizer.init::<B, PointTransformer<B>>();
        let loss = SemSegLoss::new(config.loss.clone())?;

        Ok(Self::with_optimizer(
            model,
            optimizer,
            loss,
            config.optimizer.schedule(),
            search,
        ))
    }
}

impl<B: AutodiffBackend, O: Optimizer<PointTransformer<B>, B>> SegmentationTrainer<B, O> {
    /// Assemble a trainer from parts.
    pub fn with_optimizer(
        model: PointTransformer<B>,
        optimizer: O,
        loss: SemSegLoss,
        schedule: MultiStepSchedule,
        search: Arc<dyn NeighborSearch>,
    ) -> Self {
        Self {
            model,
            optimizer,
            loss,
            schedule,
            search,
            step: 0,
        }
    }

    /// The model being trained.
    pub fn model(&self) -> &PointTransformer<B> {
        &self.model
    }

    /// Take the trained model.
    pub fn into_model(self) -> PointTransformer<B> {
        self.model
    }

    /// Number of optimizer steps taken.
    pub fn step(&self) -> usize {
        self.step
    }

    /// One optimization step on a labeled batch.
    pub fn train_step(&mut self, batch: &SegmentationBatch<B>, epoch: usize) -> Result<StepMetrics> {
        if !batch.is_labeled() {
            return Err(PointTransformerError::InvalidData("training batch has no labels".to_string()));
        }

        let logits = self.model.forward(
            batch.points.clone(),
            batch.features.clone(),
            batch.row_splits.clone(),
            self.search.as_ref(),
        )?;
        let output = self.loss.compute(logits, &batch.labels)?;
        let accuracy = accuracy(&output.scores, &output.labels)?;
        let loss = scalar(&output.loss)?;

        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        let learning_rate = self.schedule.lr_at(epoch);
        self.model = self.optimizer.step(learning_rate, self.model.clone(), grads);
        self.step += 1;

        let metrics = StepMetrics {
            loss,
            accuracy,
            learning_rate,
            step: self.step,
        };
        if !loss.is_finite() {
            log::warn!("non-finite loss at step {}", self.step);
        }
        Ok(metrics)
    }

    /// Evaluate a labeled batch without gradients, accumulating into `metrics`.
    pub fn valid_step(&self, batch: &SegmentationBatch<B>, metrics: &mut SegmentationMetrics) -> Result<StepMetrics> {
        let model = self.model.valid();
        let logits = model.forward(
            batch.points.clone().inner(),
            batch.features.clone().map(|f| f.inner()),
            batch.row_splits.clone(),
            self.search.as_ref(),
        )?;
        let output = self.loss.compute(logits, &batch.labels)?;
        metrics.update_from_logits(&output.scores, &output.labels)?;

        Ok(StepMetrics {
            loss: scalar(&output.loss)?,
            accuracy: accuracy(&output.scores, &output.labels)?,
            learning_rate: 0.0,
            step: self.step,
        })
    }

    /// Predicted class per point for an unlabeled batch.
    pub fn predict(&self, batch: &SegmentationBatch<B>) -> Result<Vec<usize>> {
        let model = self.model.valid();
        let logits = model.forward(
            batch.points.clone().inner(),
            batch.features.clone().map(|f| f.inner()),
            batch.row_splits.clone(),
            self.search.as_ref(),
        )?;
        super::metrics::predictions(&logits)
    }
}

fn scalar<B: Backend>(tensor: &Tensor<B, 1>) -> Result<f32> {
    host_values(tensor)?
        .first()
        .copied()
        .ok_or_else(|| PointTransformerError::TensorData("empty scalar tensor".to_string()))
}
