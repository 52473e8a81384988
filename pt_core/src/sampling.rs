//! Furthest-point sampling over batched clouds.

use crate::error::{CoreError, Result};
use crate::row_splits::RowSplits;
use crate::types::Point3;

/// Pick `target_splits` counts of well-spread representatives per cloud.
///
/// Each cloud is sampled independently, seeded at its first point; every
/// further pick maximizes the squared distance to the nearest point already
/// picked (ties go to the lowest index). Returned indices are global and the
/// result is a literal subset of `points`.
pub fn furthest_point_sample(
    points: &[Point3],
    splits: &RowSplits,
    target_splits: &RowSplits,
) -> Result<Vec<usize>> {
    splits.check_same_batch(target_splits)?;
    splits.check_len("sampled points", points.len())?;

    let mut picked = Vec::with_capacity(target_splits.total());
    for (cloud, (range, wanted)) in splits.ranges().zip(target_splits.counts()).enumerate() {
        if wanted > range.len() {
            return Err(CoreError::DegenerateInput {
                reason: format!(
                    "cloud {} has {} points, cannot sample {}",
                    cloud,
                    range.len(),
                    wanted
                ),
            });
        }
        if wanted == 0 {
            continue;
        }
        let offset = range.start;
        let cloud_points = &points[range];
        picked.extend(sample_cloud(cloud_points, wanted).into_iter().map(|i| i + offset));
    }
    Ok(picked)
}

fn sample_cloud(points: &[Point3], wanted: usize) -> Vec<usize> {
    let mut min_dist = vec![f32::INFINITY; points.len()];
    let mut taken = vec![false; points.len()];
    let mut picked = Vec::with_capacity(wanted);
    let mut current = 0;

    for _ in 0..wanted {
        picked.push(current);
        taken[current] = true;
        let anchor = points[current];
        let mut best = 0;
        let mut best_dist = f32::NEG_INFINITY;
        for (i, p) in points.iter().enumerate() {
            let d = p.distance_squared(anchor);
            if d < min_dist[i] {
                min_dist[i] = d;
            }
            // Coincident points have zero distance; never re-pick an index.
            if !taken[i] && min_dist[i] > best_dist {
                best_dist = min_dist[i];
                best = i;
            }
        }
        current = best;
    }
    picked
}
