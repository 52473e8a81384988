//! Segmentation metrics and per-step training output.

use burn::prelude::*;

use crate::error::{PointTransformerError, Result};
use crate::nn::host_values;

/// Row-wise argmax of `[n, classes]` logits.
pub fn predictions<B: Backend>(logits: &Tensor<B, 2>) -> Result<Vec<usize>> {
    let [_, classes] = logits.dims();
    if classes == 0 {
        return Err(PointTransformerError::InvalidData("logits have no classes".to_string()));
    }
    let values = host_values(logits)?;
    Ok(values
        .chunks(classes)
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (class, &v)| if v > best.1 { (class, v) } else { best })
                .0
        })
        .collect())
}

/// Fraction of rows whose argmax equals the label.
///
/// An empty batch scores 0.
pub fn accuracy<B: Backend>(logits: &Tensor<B, 2>, labels: &[i64]) -> Result<f32> {
    let predicted = predictions(logits)?;
    if predicted.len() != labels.len() {
        return Err(PointTransformerError::ShapeMismatch {
            expected: vec![predicted.len()],
            got: vec![labels.len()],
        });
    }
    if labels.is_empty() {
        return Ok(0.0);
    }
    let correct = predicted
        .iter()
        .zip(labels)
        .filter(|&(&p, &l)| p as i64 == l)
        .count();
    Ok(correct as f32 / labels.len() as f32)
}

/// Confusion-matrix accumulator over many batches.
#[derive(Debug, Clone)]
pub struct SegmentationMetrics {
    num_classes: usize,
    /// `confusion[label * num_classes + predicted]`.
    confusion: Vec<u64>,
}

impl SegmentationMetrics {
    /// Create an empty accumulator.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            confusion: vec![0; num_classes * num_classes],
        }
    }

    /// Add a batch of predictions. Labels outside the class range are skipped.
    pub fn update(&mut self, predicted: &[usize], labels: &[i64]) -> Result<()> {
        if predicted.len() != labels.len() {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![labels.len()],
                got: vec![predicted.len()],
            });
        }
        for (&p, &l) in predicted.iter().zip(labels) {
            let Ok(l) = usize::try_from(l) else { continue };
            if l < self.num_classes && p < self.num_classes {
                self.confusion[l * self.num_classes + p] += 1;
            }
        }
        Ok(())
    }

    /// Add a batch of logits.
    pub fn update_from_logits<B: Backend>(&mut self, logits: &Tensor<B, 2>, labels: &[i64]) -> Result<()> {
        let predicted = predictions(logits)?;
        self.update(&predicted, labels)
    }

    /// Overall accuracy, 0 before any update.
    pub fn accuracy(&self) -> f32 {
        let total: u64 = self.confusion.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.num_classes)
            .map(|c| self.confusion[c * self.num_classes + c])
            .sum();
        correct as f32 / total as f32
    }

    /// Per-class intersection over union; `None` for classes never labeled or predicted.
    pub fn iou(&self) -> Vec<Option<f32>> {
        let n = self.num_classes;
        (0..n)
            .map(|c| {
                let tp = self.confusion[c * n + c];
                let labeled: u64 = self.confusion[c * n..(c + 1) * n].iter().sum();
                let predicted: u64 = (0..n).map(|l| self.confusion[l * n + c]).sum();
                let union = labeled + predicted - tp;
                (union > 0).then(|| tp as f32 / union as f32)
            })
            .collect()
    }

    /// Mean IoU over the classes that appear.
    pub fn mean_iou(&self) -> f32 {
        let present: Vec<f32> = self.iou().into_iter().flatten().collect();
        if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f32>() / present.len() as f32
        }
    }

    /// Clear all counts.
    pub fn reset(&mut self) {
        self.confusion.iter_mut().for_each(|c| *c = 0);
    }

    /// Log accuracy and mIoU.
    pub fn log(&self, prefix: &str) {
        log::info!(
            "{} acc={:.4} miou={:.4}",
            prefix,
            self.accuracy(),
            self.mean_iou()
        );
    }
}

/// Scalars reported by a training or validation step.
#[derive(Debug, Clone, Default)]
pub struct StepMetrics {
    /// Loss value.
    pub loss: f32,
    /// Accuracy over the valid rows of the batch.
    pub accuracy: f32,
    /// Learning rate used for the update (0 for validation).
    pub learning_rate: f64,
    /// Number of training steps taken so far.
    pub step: usize,
}

impl StepMetrics {
    /// Log metrics.
    pub fn log(&self, prefix: &str) {
        log::info!(
            "{} step={} loss={:.6} acc={:.4} lr={:.2e}",
            prefix,
            self.step,
            self.loss,
            self.accuracy,
            self.learning_rate,
        );
    }
}
