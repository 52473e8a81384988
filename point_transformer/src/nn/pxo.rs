//! Batched point/feature/offset bundle passed between network stages.

use burn::prelude::*;
use burn::tensor::TensorData;
use pt_core::{Point3, RowSplits};

use crate::error::{PointTransformerError, Result};

/// Points, their features and the row splits that separate the clouds of a batch.
///
/// Point `i` and feature row `i` always belong together, and the row splits cover
/// exactly the rows of both tensors.
#[derive(Debug, Clone)]
pub struct Pxo<B: Backend> {
    /// Coordinates, shape `[n, 3]`.
    pub points: Tensor<B, 2>,
    /// Features, shape `[n, c]`.
    pub features: Tensor<B, 2>,
    /// Cloud boundaries.
    pub row_splits: RowSplits,
}

impl<B: Backend> Pxo<B> {
    /// Bundle points, features and row splits, checking that they agree.
    pub fn new(points: Tensor<B, 2>, features: Tensor<B, 2>, row_splits: RowSplits) -> Result<Self> {
        let [n, width] = points.dims();
        if width != 3 {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![n, 3],
                got: vec![n, width],
            });
        }
        let [rows, channels] = features.dims();
        if rows != n {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![n, channels],
                got: vec![rows, channels],
            });
        }
        row_splits.check_len("points", n)?;

        Ok(Self {
            points,
            features,
            row_splits,
        })
    }

    /// Replace the features, keeping points and row splits.
    pub fn with_features(self, features: Tensor<B, 2>) -> Result<Self> {
        Self::new(self.points, features, self.row_splits)
    }

    /// Total number of points.
    pub fn len(&self) -> usize {
        self.row_splits.total()
    }

    /// True when the batch holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature width.
    pub fn channels(&self) -> usize {
        let [_, channels] = self.features.dims();
        channels
    }

    /// Copy the coordinates to host memory for neighbor search and sampling.
    pub fn host_points(&self) -> Result<Vec<Point3>> {
        host_points(&self.points)
    }
}

/// Read an `[n, 3]` coordinate tensor back into points.
pub fn host_points<B: Backend>(points: &Tensor<B, 2>) -> Result<Vec<Point3>> {
    let values = host_values(points)?;
    Ok(Point3::from_flat(&values))
}

/// Read a float tensor back as a flat row-major vector.
pub fn host_values<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .to_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PointTransformerError::TensorData(format!("{e:?}")))
}

/// Upload a coordinate list as an `[n, 3]` tensor.
pub fn points_tensor<B: Backend>(points: &[Point3], device: &B::Device) -> Tensor<B, 2> {
    let values = Point3::to_flat(points);
    Tensor::from_data(TensorData::new(values, [points.len(), 3]), device)
}

/// Upload row indices for `select`/`gather`.
pub(crate) fn index_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let values: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Tensor::from_data(TensorData::new(values, [indices.len()]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_pxo_validates_rows() {
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::zeros([4, 3], &device);
        let features = Tensor::<TestBackend, 2>::zeros([3, 2], &device);

        let result = Pxo::new(points, features, RowSplits::single(4));
        assert!(matches!(result, Err(PointTransformerError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_pxo_validates_splits() {
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::zeros([4, 3], &device);
        let features = Tensor::<TestBackend, 2>::zeros([4, 2], &device);

        let result = Pxo::new(points, features, RowSplits::single(5));
        assert!(matches!(result, Err(PointTransformerError::Core(_))));
    }

    #[test]
    fn test_host_roundtrip() {
        let device = Default::default();
        let points = vec![Point3::new(1.0, 2.0, 3.0), Point3::new(-1.0, 0.5, 0.0)];
        let tensor = points_tensor::<TestBackend>(&points, &device);
        assert_eq!(tensor.dims(), [2, 3]);
        assert_eq!(host_points(&tensor).unwrap(), points);
    }
}
