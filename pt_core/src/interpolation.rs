//! Inverse-distance weights for transferring features between point sets.

/// Additive guard against division by zero for coincident points.
pub const INTERPOLATION_EPSILON: f32 = 1e-8;

/// Normalized inverse-distance weights, row-major `(rows, k)`.
///
/// `distances` are Euclidean, as stored in a [`NeighborIndex`]. The weight of
/// neighbor `j` is `1 / (d_j² + eps)` divided by the row sum. Infinite
/// distances (padded neighbors) get weight zero. A row whose weights all
/// vanish stays all zero.
///
/// [`NeighborIndex`]: crate::NeighborIndex
pub fn inverse_distance_weights(distances: &[f32], k: usize) -> Vec<f32> {
    let mut weights: Vec<f32> = distances
        .iter()
        .map(|&d| 1.0 / (d * d + INTERPOLATION_EPSILON))
        .collect();

    for row in weights.chunks_mut(k.max(1)) {
        let norm: f32 = row.iter().sum();
        if norm > 0.0 {
            row.iter_mut().for_each(|w| *w /= norm);
        }
    }
    weights
}
