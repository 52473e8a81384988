//! Semantic segmentation loss.

use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::TensorData;

use crate::config::SemSegLossConfig;
use crate::error::{PointTransformerError, Result};

/// Offset added to class frequencies before inverting them into weights.
const FREQUENCY_OFFSET: f32 = 0.02;

/// Drop rows whose label is ignored and remap the remaining labels.
///
/// Ignored ids are removed from the label space: every kept label is shifted down by
/// the number of non-negative ignored ids below it, so that a dataset whose raw labels
/// include an "unlabeled" id maps onto `num_classes` contiguous classes. Returns the
/// kept rows of `logits` and their remapped labels, in input order.
pub fn filter_valid_labels<B: Backend>(
    logits: Tensor<B, 2>,
    labels: &[i64],
    ignored: &[i64],
) -> Result<(Tensor<B, 2>, Vec<i64>)> {
    let [rows, num_classes] = logits.dims();
    if labels.len() != rows {
        return Err(PointTransformerError::ShapeMismatch {
            expected: vec![rows],
            got: vec![labels.len()],
        });
    }

    let mut keep = Vec::with_capacity(rows);
    let mut remapped = Vec::with_capacity(rows);
    for (row, &label) in labels.iter().enumerate() {
        if ignored.contains(&label) {
            continue;
        }
        let shift = ignored.iter().filter(|&&id| id >= 0 && id < label).count() as i64;
        let class = label - shift;
        if class < 0 || class as usize >= num_classes {
            return Err(PointTransformerError::InvalidData(format!(
                "label {label} at row {row} is outside the {num_classes} predicted classes"
            )));
        }
        keep.push(row as i64);
        remapped.push(class);
    }

    if keep.len() == rows {
        return Ok((logits, remapped));
    }
    let device = logits.device();
    let kept = keep.len();
    let index = Tensor::<B, 1, Int>::from_data(TensorData::new(keep, [kept]), &device);
    Ok((logits.select(0, index), remapped))
}

/// Class weights `1 / (frequency + 0.02)` from per-class point counts.
///
/// Rare classes get large weights; an absent class gets `1 / 0.02 = 50`.
pub fn class_weights_from_counts(counts: &[usize]) -> Vec<f32> {
    let total: usize = counts.iter().sum();
    counts
        .iter()
        .map(|&count| {
            let frequency = if total == 0 {
                0.0
            } else {
                count as f32 / total as f32
            };
            1.0 / (frequency + FREQUENCY_OFFSET)
        })
        .collect()
}

/// Output of [`SemSegLoss::compute`].
#[derive(Debug, Clone)]
pub struct LossOutput<B: Backend> {
    /// Scalar loss.
    pub loss: Tensor<B, 1>,
    /// Remapped labels of the rows that entered the loss.
    pub labels: Vec<i64>,
    /// Logits of the rows that entered the loss, `[kept, num_classes]`.
    pub scores: Tensor<B, 2>,
}

/// Weighted cross-entropy over valid labels.
#[derive(Debug, Clone)]
pub struct SemSegLoss {
    config: SemSegLossConfig,
}

impl SemSegLoss {
    /// Create the loss, validating the configuration.
    pub fn new(config: SemSegLossConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SemSegLossConfig {
        &self.config
    }

    /// Filter ignored rows, then compute the weighted cross-entropy.
    pub fn compute<B: Backend>(&self, logits: Tensor<B, 2>, labels: &[i64]) -> Result<LossOutput<B>> {
        let [_, classes] = logits.dims();
        if classes != self.config.num_classes {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![labels.len(), self.config.num_classes],
                got: vec![labels.len(), classes],
            });
        }
        let (scores, labels) = filter_valid_labels(logits, labels, &self.config.ignored_labels)?;
        let loss = self.weighted_cross_entropy(scores.clone(), &labels)?;
        Ok(LossOutput {
            loss,
            labels,
            scores,
        })
    }

    /// Cross-entropy `-Σ w[y] log softmax(x)[y] / Σ w[y]` over the given rows.
    ///
    /// Labels must already lie in `[0, num_classes)`.
    pub fn weighted_cross_entropy<B: Backend>(&self, logits: Tensor<B, 2>, labels: &[i64]) -> Result<Tensor<B, 1>> {
        let [rows, classes] = logits.dims();
        if labels.len() != rows {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![rows],
                got: vec![labels.len()],
            });
        }
        if rows == 0 {
            return Err(PointTransformerError::InvalidData(
                "no valid labels left to compute the loss".to_string(),
            ));
        }
        if let Some(label) = labels.iter().find(|&&l| l < 0 || l as usize >= classes) {
            return Err(PointTransformerError::InvalidData(format!(
                "label {label} is outside the {classes} predicted classes"
            )));
        }

        let weights: Vec<f32> = match &self.config.class_weights {
            Some(class_weights) => labels.iter().map(|&l| class_weights[l as usize]).collect(),
            None => vec![1.0; rows],
        };
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return Err(PointTransformerError::InvalidData(
                "all labeled rows have zero class weight".to_string(),
            ));
        }

        let device = logits.device();
        let targets = Tensor::<B, 2, Int>::from_data(TensorData::new(labels.to_vec(), [rows, 1]), &device);
        let weights = Tensor::<B, 1>::from_data(TensorData::new(weights, [rows]), &device);

        let picked = log_softmax(logits, 1).gather(1, targets).reshape([rows]);
        Ok((picked * weights).sum().neg().div_scalar(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::host_values;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn logits(values: Vec<f32>, rows: usize, classes: usize) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values, [rows, classes]), &Default::default())
    }

    #[test]
    fn test_filter_and_remap() {
        let x = logits((0..8).map(|v| v as f32).collect(), 4, 2);
        let (kept, labels) = filter_valid_labels(x, &[0, 1, 2, 0], &[0]).unwrap();

        assert_eq!(labels, vec![0, 1]);
        assert_eq!(host_values(&kept).unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_negative_ignore_id_does_not_shift() {
        let x = logits(vec![0.0; 6], 3, 2);
        let (_, labels) = filter_valid_labels(x, &[-1, 0, 1], &[-1]).unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_out_of_range_label() {
        let x = logits(vec![0.0; 4], 2, 2);
        assert!(filter_valid_labels(x, &[0, 2], &[]).is_err());
    }

    #[test]
    fn test_uniform_logits_give_log_classes() {
        let loss = SemSegLoss::new(SemSegLossConfig::new(4)).unwrap();
        let x = logits(vec![0.0; 12], 3, 4);
        let value = host_values(&loss.compute(x, &[0, 1, 3]).unwrap().loss).unwrap()[0];
        assert!((value - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_class_weights_shift_the_mean() {
        let config = SemSegLossConfig::new(2).with_class_weights(Some(vec![1.0, 3.0]));
        let loss = SemSegLoss::new(config).unwrap();
        // Row 0 is confidently right, row 1 is uniform.
        let x = logits(vec![10.0, -10.0, 0.0, 0.0], 2, 2);
        let value = host_values(&loss.compute(x, &[0, 1]).unwrap().loss).unwrap()[0];

        let expected = 3.0 * 2.0f32.ln() / 4.0;
        assert!((value - expected).abs() < 1e-3);
    }

    #[test]
    fn test_all_ignored_is_an_error() {
        let loss = SemSegLoss::new(SemSegLossConfig::new(2).with_ignored_labels(vec![0])).unwrap();
        let x = logits(vec![0.0; 4], 2, 2);
        assert!(loss.compute(x, &[0, 0]).is_err());
    }

    #[test]
    fn test_frequency_weights() {
        let weights = class_weights_from_counts(&[98, 2, 0]);
        assert!((weights[0] - 1.0).abs() < 1e-5);
        assert!((weights[1] - 25.0).abs() < 1e-3);
        assert!((weights[2] - 50.0).abs() < 1e-3);
    }
}
