//! Batch collation: concatenating variable-size clouds.

use burn::prelude::*;
use burn::tensor::TensorData;
use pt_core::{Point3, RowSplits};

use crate::data::SegmentationCloud;
use crate::error::{PointTransformerError, Result};
use crate::nn::points_tensor;

/// Several clouds concatenated along the point axis.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// Coordinates, `[n, 3]`.
    pub points: Tensor<B, 2>,
    /// Features, `[n, c]`, when the clouds carry them.
    pub features: Option<Tensor<B, 2>>,
    /// Labels, one per point. Empty when the clouds are unlabeled.
    pub labels: Vec<i64>,
    /// Cloud boundaries.
    pub row_splits: RowSplits,
}

impl<B: Backend> SegmentationBatch<B> {
    /// Number of points in the batch.
    pub fn len(&self) -> usize {
        self.row_splits.total()
    }

    /// True when the batch holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of clouds in the batch.
    pub fn num_clouds(&self) -> usize {
        self.row_splits.num_clouds()
    }

    /// Get the device of this batch.
    pub fn device(&self) -> B::Device {
        self.points.device()
    }

    /// Whether every point has a label.
    pub fn is_labeled(&self) -> bool {
        self.labels.len() == self.len()
    }
}

/// Concatenates clouds into a [`SegmentationBatch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatBatcher;

impl ConcatBatcher {
    /// Create a batcher.
    pub fn new() -> Self {
        Self
    }

    /// Concatenate `clouds` in order.
    ///
    /// Either every cloud carries features of the same width or none does; the same
    /// holds for labels.
    pub fn collate<B: Backend>(&self, clouds: &[&SegmentationCloud], device: &B::Device) -> Result<SegmentationBatch<B>> {
        if clouds.is_empty() {
            return Err(PointTransformerError::InvalidData("cannot collate an empty batch".to_string()));
        }

        let first = clouds[0];
        let channels = first.feature_channels();
        let with_features = first.features().is_some();
        let with_labels = first.labels().is_some();
        for (i, cloud) in clouds.iter().enumerate() {
            if cloud.features().is_some() != with_features || cloud.feature_channels() != channels {
                return Err(PointTransformerError::InvalidData(format!(
                    "cloud {i} has {} feature channels, expected {channels}",
                    cloud.feature_channels()
                )));
            }
            if cloud.labels().is_some() != with_labels {
                return Err(PointTransformerError::InvalidData(format!(
                    "cloud {i} disagrees with cloud 0 on having labels"
                )));
            }
        }

        let counts: Vec<usize> = clouds.iter().map(|c| c.len()).collect();
        let row_splits = RowSplits::from_counts(&counts);
        let total = row_splits.total();

        let points: Vec<Point3> = clouds.iter().flat_map(|c| c.points.iter().copied()).collect();
        let features = with_features.then(|| {
            let values: Vec<f32> = clouds
                .iter()
                .flat_map(|c| c.features().unwrap_or_default().iter().copied())
                .collect();
            Tensor::from_data(TensorData::new(values, [total, channels]), device)
        });
        let labels = clouds
            .iter()
            .flat_map(|c| c.labels().unwrap_or_default().iter().copied())
            .collect();

        Ok(SegmentationBatch {
            points: points_tensor(&points, device),
            features,
            labels,
            row_splits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn cloud(n: usize, offset: f32) -> SegmentationCloud {
        let points = (0..n).map(|i| Point3::new(offset + i as f32, 0.0, 0.0)).collect();
        SegmentationCloud::new(points)
            .with_features(vec![offset; n * 3], 3)
            .unwrap()
            .with_labels(vec![1; n])
            .unwrap()
    }

    #[test]
    fn test_collate_concatenates() {
        let a = cloud(10, 0.0);
        let b = cloud(6, 100.0);
        let batch = ConcatBatcher::new()
            .collate::<TestBackend>(&[&a, &b], &Default::default())
            .unwrap();

        assert_eq!(batch.row_splits.as_slice(), &[0, 10, 16]);
        assert_eq!(batch.points.dims(), [16, 3]);
        assert_eq!(batch.features.as_ref().map(|f| f.dims()), Some([16, 3]));
        assert!(batch.is_labeled());
    }

    #[test]
    fn test_collate_rejects_mixed_features() {
        let a = cloud(3, 0.0);
        let b = SegmentationCloud::new(vec![Point3::default(); 2]).with_labels(vec![0, 0]).unwrap();
        let result = ConcatBatcher::new().collate::<TestBackend>(&[&a, &b], &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_collate_rejects_empty_batch() {
        let result = ConcatBatcher::new().collate::<TestBackend>(&[], &Default::default());
        assert!(result.is_err());
    }
}
