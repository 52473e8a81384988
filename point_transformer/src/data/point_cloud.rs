//! Labeled point clouds.

use pt_core::Point3;

use crate::error::{PointTransformerError, Result};

/// A point cloud with optional per-point features and optional per-point labels.
///
/// Features are stored row-major, `feature_channels` values per point.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationCloud {
    /// Point positions.
    pub points: Vec<Point3>,
    features: Option<Vec<f32>>,
    feature_channels: usize,
    labels: Option<Vec<i64>>,
}

impl SegmentationCloud {
    /// Create a cloud from points only.
    pub fn new(points: Vec<Point3>) -> Self {
        Self {
            points,
            features: None,
            feature_channels: 0,
            labels: None,
        }
    }

    /// Attach features, `channels` values per point.
    pub fn with_features(mut self, values: Vec<f32>, channels: usize) -> Result<Self> {
        if channels == 0 || values.len() != self.points.len() * channels {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![self.points.len(), channels],
                got: vec![values.len()],
            });
        }
        self.features = Some(values);
        self.feature_channels = channels;
        Ok(self)
    }

    /// Attach one label per point.
    pub fn with_labels(mut self, labels: Vec<i64>) -> Result<Self> {
        if labels.len() != self.points.len() {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![self.points.len()],
                got: vec![labels.len()],
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Row-major features, if any.
    pub fn features(&self) -> Option<&[f32]> {
        self.features.as_deref()
    }

    /// Feature values per point (0 without features).
    pub fn feature_channels(&self) -> usize {
        self.feature_channels
    }

    /// Per-point labels, if any.
    pub fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }

    /// Mutable access to the features.
    pub fn features_mut(&mut self) -> Option<&mut [f32]> {
        self.features.as_deref_mut()
    }

    /// Compute the bounding box.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        let first = *self.points.first()?;
        Some(
            self.points
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Keep the given rows, in the given order.
    ///
    /// Indices must be in range.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.points.len()) {
            return Err(PointTransformerError::InvalidData(format!(
                "row {bad} out of range for a cloud of {} points",
                self.points.len()
            )));
        }

        let channels = self.feature_channels;
        Ok(Self {
            points: indices.iter().map(|&i| self.points[i]).collect(),
            features: self.features.as_ref().map(|values| {
                indices
                    .iter()
                    .flat_map(|&i| values[i * channels..(i + 1) * channels].iter().copied())
                    .collect()
            }),
            feature_channels: channels,
            labels: self
                .labels
                .as_ref()
                .map(|labels| indices.iter().map(|&i| labels[i]).collect()),
        })
    }
}
