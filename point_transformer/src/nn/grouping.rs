//! Neighborhood gathering and feature transfer between point sets.

use burn::prelude::*;
use burn::tensor::TensorData;
use pt_core::{inverse_distance_weights, CoreError, NeighborIndex, NeighborSearch, RowSplits};

use super::pxo::{host_points, index_tensor};
use crate::error::{PointTransformerError, Result};

/// Neighbors used when transferring features from a coarse to a fine level.
pub const INTERPOLATION_NEIGHBORS: usize = 3;

/// Gather the `k` nearest source rows of every query point.
///
/// Returns `[m, k, c]`, or `[m, k, 3 + c]` when `with_relative_position` is set, in which
/// case the first three channels hold `neighbor - query`. When `neighbors` is `None` the
/// neighborhoods are searched with `search`; otherwise the given index is reused and
/// must hold exactly `m` rows of `k` neighbors.
#[allow(clippy::too_many_arguments)]
pub fn query_and_group<B: Backend>(
    k: usize,
    source_points: &Tensor<B, 2>,
    query_points: &Tensor<B, 2>,
    source_features: &Tensor<B, 2>,
    neighbors: Option<&NeighborIndex>,
    source_splits: &RowSplits,
    query_splits: &RowSplits,
    with_relative_position: bool,
    search: &dyn NeighborSearch,
) -> Result<Tensor<B, 3>> {
    let [m, _] = query_points.dims();
    let [n, c] = source_features.dims();
    source_splits.check_len("source features", n)?;
    query_splits.check_len("query points", m)?;

    let computed;
    let index = match neighbors {
        Some(index) => index,
        None => {
            computed = search.knn(
                &host_points(source_points)?,
                source_splits,
                &host_points(query_points)?,
                query_splits,
                k,
            )?;
            &computed
        }
    };
    if index.len() != m || index.k() != k {
        return Err(PointTransformerError::ShapeMismatch {
            expected: vec![m, k],
            got: vec![index.len(), index.k()],
        });
    }
    if let Some(&bad) = index.indices().iter().find(|&&i| i >= n) {
        return Err(CoreError::ShapeMismatch {
            what: "neighbor index bound",
            expected: n,
            got: bad + 1,
        }
        .into());
    }

    let device = source_features.device();
    let rows = index_tensor::<B>(index.indices(), &device);
    let grouped = source_features.clone().select(0, rows.clone()).reshape([m, k, c]);
    if !with_relative_position {
        return Ok(grouped);
    }

    let neighbors = source_points.clone().select(0, rows).reshape([m, k, 3]);
    let relative = neighbors - query_points.clone().reshape([m, 1, 3]);
    Ok(Tensor::cat(vec![relative, grouped], 2))
}

/// Transfer per-point features from `source` to `query` points.
///
/// Each query receives the inverse-distance weighted mean of its `k` nearest source
/// features within the same cloud. Weights are `1 / (d² + 1e-8)` normalized to sum to
/// one, so a query that coincides with a source point copies that point's features.
pub fn interpolate<B: Backend>(
    source_points: &Tensor<B, 2>,
    source_splits: &RowSplits,
    query_points: &Tensor<B, 2>,
    query_splits: &RowSplits,
    source_features: &Tensor<B, 2>,
    k: usize,
    search: &dyn NeighborSearch,
) -> Result<Tensor<B, 2>> {
    let [m, _] = query_points.dims();
    let [n, c] = source_features.dims();
    source_splits.check_len("source features", n)?;

    let index = search.knn(
        &host_points(source_points)?,
        source_splits,
        &host_points(query_points)?,
        query_splits,
        k,
    )?;
    let weights = inverse_distance_weights(index.all_distances(), k);

    let device = source_features.device();
    let rows = index_tensor::<B>(index.indices(), &device);
    let grouped = source_features.clone().select(0, rows).reshape([m, k, c]);
    let weights = Tensor::<B, 3>::from_data(TensorData::new(weights, [m, k, 1]), &device);

    Ok((grouped * weights).sum_dim(1).reshape([m, c]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::pxo::{host_values, points_tensor};
    use burn::backend::NdArray;
    use pt_core::{BruteForceSearch, Point3};

    type TestBackend = NdArray;

    fn line(n: usize) -> Vec<Point3> {
        (0..n).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect()
    }

    fn features(rows: usize, channels: usize) -> Tensor<TestBackend, 2> {
        let values: Vec<f32> = (0..rows * channels).map(|v| v as f32).collect();
        Tensor::from_data(TensorData::new(values, [rows, channels]), &Default::default())
    }

    #[test]
    fn test_group_relative_positions() {
        let device = Default::default();
        let points = points_tensor::<TestBackend>(&line(5), &device);
        let feats = features(5, 2);
        let splits = RowSplits::single(5);

        let grouped = query_and_group(
            2,
            &points,
            &points,
            &feats,
            None,
            &splits,
            &splits,
            true,
            &BruteForceSearch,
        )
        .unwrap();
        assert_eq!(grouped.dims(), [5, 2, 5]);

        // First neighbor of each point is itself: zero offset, own features.
        let values = host_values(&grouped).unwrap();
        for point in 0..5 {
            let row = &values[point * 10..point * 10 + 5];
            assert_eq!(&row[..3], &[0.0, 0.0, 0.0]);
            assert_eq!(row[3], (point * 2) as f32);
        }
    }

    #[test]
    fn test_group_rejects_foreign_index() {
        let device = Default::default();
        let points = points_tensor::<TestBackend>(&line(4), &device);
        let feats = features(4, 1);
        let splits = RowSplits::single(4);
        let index = NeighborIndex::from_parts(2, vec![0, 1, 1, 2], vec![0.0; 4]).unwrap();

        let result = query_and_group(
            2,
            &points,
            &points,
            &feats,
            Some(&index),
            &splits,
            &splits,
            false,
            &BruteForceSearch,
        );
        assert!(matches!(result, Err(PointTransformerError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_group_rejects_out_of_range_index() {
        let device = Default::default();
        let points = points_tensor::<TestBackend>(&line(3), &device);
        let feats = features(3, 2);
        let splits = RowSplits::single(3);
        let index = NeighborIndex::from_parts(2, vec![0, 1, 1, 2, 2, 7], vec![0.0; 6]).unwrap();

        let result = query_and_group(
            2,
            &points,
            &points,
            &feats,
            Some(&index),
            &splits,
            &splits,
            true,
            &BruteForceSearch,
        );
        assert!(matches!(
            result,
            Err(PointTransformerError::Core(CoreError::ShapeMismatch { expected: 3, got: 8, .. }))
        ));
    }

    #[test]
    fn test_interpolate_identity_on_same_points() {
        let device = Default::default();
        let points = points_tensor::<TestBackend>(&line(6), &device);
        let feats = features(6, 3);
        let splits = RowSplits::from_counts(&[4, 2]);

        let out = interpolate(
            &points,
            &splits,
            &points,
            &splits,
            &feats,
            INTERPOLATION_NEIGHBORS,
            &BruteForceSearch,
        )
        .unwrap();

        let expected = host_values(&feats).unwrap();
        let got = host_values(&out).unwrap();
        for (a, b) in expected.iter().zip(&got) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_interpolate_midpoint() {
        let device = Default::default();
        let source = points_tensor::<TestBackend>(&line(2), &device);
        let query = points_tensor::<TestBackend>(&[Point3::new(0.5, 0.0, 0.0)], &device);
        let feats = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 2.0], [2, 1]),
            &device,
        );

        let out = interpolate(
            &source,
            &RowSplits::single(2),
            &query,
            &RowSplits::single(1),
            &feats,
            INTERPOLATION_NEIGHBORS,
            &BruteForceSearch,
        )
        .unwrap();
        let value = host_values(&out).unwrap()[0];
        assert!((value - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_interpolate_weights_by_squared_distance() {
        let device = Default::default();
        let source = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
        ];
        let query = [Point3::new(0.25, 0.0, 0.0)];
        let feats = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 0.0], [3, 1]),
            &device,
        );

        let out = interpolate(
            &points_tensor::<TestBackend>(&source, &device),
            &RowSplits::single(3),
            &points_tensor::<TestBackend>(&query, &device),
            &RowSplits::single(1),
            &feats,
            INTERPOLATION_NEIGHBORS,
            &BruteForceSearch,
        )
        .unwrap();

        // 1/0.5625 over 1/0.0625 + 1/0.5625 + 1/22.5625
        let value = host_values(&out).unwrap()[0];
        assert!((value - 0.09975).abs() < 1e-4, "interpolated {value}");
    }
}
