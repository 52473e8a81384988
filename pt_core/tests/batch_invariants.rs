//! Property-based tests for batch-boundary invariants.

use proptest::prelude::*;

use pt_core::prelude::*;

/// Strategy: 1..4 clouds of 1..24 points each with coordinates in a cube.
fn batch() -> impl Strategy<Value = (Vec<Point3>, RowSplits)> {
    prop::collection::vec(1usize..24, 1..4).prop_flat_map(|counts| {
        let total: usize = counts.iter().sum();
        (
            prop::collection::vec((-5.0f32..5.0, -5.0f32..5.0, -5.0f32..5.0), total),
            Just(counts),
        )
            .prop_map(|(coords, counts)| {
                let points = coords
                    .into_iter()
                    .map(|(x, y, z)| Point3::new(x, y, z))
                    .collect();
                (points, RowSplits::from_counts(&counts))
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every neighbor lies in the query's own cloud.
    #[test]
    fn neighbors_stay_in_cloud((points, splits) in batch(), k in 1usize..10) {
        let index = KdTreeSearch::new().knn(&points, &splits, &points, &splits, k).unwrap();
        prop_assert_eq!(index.len(), points.len());

        for range in splits.ranges() {
            for q in range.clone() {
                for &n in index.neighbors(q) {
                    prop_assert!(range.contains(&n), "query {} got neighbor {} outside {:?}", q, n, range);
                }
            }
        }
    }

    /// The kd-tree and the brute-force search agree on distances.
    #[test]
    fn kd_tree_agrees_with_brute_force((points, splits) in batch(), k in 1usize..8) {
        let exact = BruteForceSearch.knn(&points, &splits, &points, &splits, k).unwrap();
        let fast = KdTreeSearch::new().knn(&points, &splits, &points, &splits, k).unwrap();

        for (a, b) in exact.all_distances().iter().zip(fast.all_distances()) {
            if a.is_infinite() {
                prop_assert!(b.is_infinite());
            } else {
                prop_assert!((a - b).abs() < 1e-4);
            }
        }
    }

    /// Coarsened splits are well formed and follow floor division.
    #[test]
    fn downsampled_splits_are_monotonic((_, splits) in batch(), stride in 1usize..6) {
        let coarse = splits.downsample(stride);
        prop_assert_eq!(coarse.as_slice()[0], 0);
        prop_assert_eq!(coarse.num_clouds(), splits.num_clouds());
        prop_assert!(coarse.as_slice().windows(2).all(|w| w[0] <= w[1]));

        for (before, after) in splits.counts().zip(coarse.counts()) {
            if before >= stride {
                prop_assert_eq!(after, before / stride);
            } else {
                prop_assert_eq!(after, 1);
            }
        }
    }

    /// Furthest-point sampling picks distinct points of the right cloud.
    #[test]
    fn sampling_is_a_subset_per_cloud((points, splits) in batch(), stride in 1usize..5) {
        let coarse = splits.downsample(stride);
        let picked = furthest_point_sample(&points, &splits, &coarse).unwrap();
        prop_assert_eq!(picked.len(), coarse.total());

        for (cloud, range) in coarse.ranges().enumerate() {
            let source = splits.range(cloud);
            let mut ids: Vec<usize> = picked[range].to_vec();
            prop_assert!(ids.iter().all(|i| source.contains(i)));
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), coarse.counts().nth(cloud).unwrap_or(0));
        }
    }

    /// Interpolation weights are a partition of unity per query.
    #[test]
    fn weights_partition_unity((points, splits) in batch()) {
        let index = BruteForceSearch.knn(&points, &splits, &points, &splits, 3).unwrap();
        let weights = inverse_distance_weights(index.all_distances(), 3);
        for row in weights.chunks(3) {
            prop_assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        }
    }
}

#[test]
fn single_point_cloud_pads_to_itself() {
    let points = vec![Point3::new(0.5, 0.5, 0.5)];
    let splits = RowSplits::single(1);
    let index = KdTreeSearch::new()
        .knn(&points, &splits, &points, &splits, 4)
        .unwrap();

    assert_eq!(index.neighbors(0), &[0, 0, 0, 0]);
    assert_eq!(index.distances(0)[0], 0.0);
}
