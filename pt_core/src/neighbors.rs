//! Batched k-nearest-neighbor search.
//!
//! [`NeighborSearch`] is the single capability the network uses to find
//! neighborhoods. Implementations only answer "k nearest points of these
//! queries inside one cloud"; the provided [`NeighborSearch::knn`] method
//! walks the row splits, offsets local indices to global ones and applies the
//! padding policy, so every implementation shares the same batch semantics.
//!
//! Padding: a cloud with fewer than `k` source points yields all of its
//! points followed by copies of the nearest one. Padded slots report an
//! infinite distance so that distance-weighted consumers can ignore them.

use std::fmt;

use kd_tree::{KdPoint, KdTree};
use rayon::prelude::*;

use crate::error::{CoreError, Result};
use crate::row_splits::RowSplits;
use crate::types::Point3;

/// A single neighbor: index (local to the searched slice) and distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the searched source slice.
    pub index: usize,
    /// Euclidean distance to the query.
    pub distance: f32,
}

/// Result of a batched kNN search, row-major `(num_queries, k)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborIndex {
    k: usize,
    indices: Vec<usize>,
    distances: Vec<f32>,
}

impl NeighborIndex {
    /// Assemble an index from flat buffers.
    ///
    /// Both buffers must hold `num_queries * k` entries.
    pub fn from_parts(k: usize, indices: Vec<usize>, distances: Vec<f32>) -> Result<Self> {
        if k == 0 {
            return Err(CoreError::DegenerateInput {
                reason: "neighbor count k must be positive".to_string(),
            });
        }
        if indices.len() % k != 0 {
            return Err(CoreError::ShapeMismatch {
                what: "neighbor indices",
                expected: indices.len() - indices.len() % k,
                got: indices.len(),
            });
        }
        if distances.len() != indices.len() {
            return Err(CoreError::ShapeMismatch {
                what: "neighbor distances",
                expected: indices.len(),
                got: distances.len(),
            });
        }
        Ok(Self {
            k,
            indices,
            distances,
        })
    }

    /// Neighbors per query.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of queries.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len() / self.k
    }

    /// Whether the index holds no queries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Global neighbor indices of query `q`, nearest first.
    pub fn neighbors(&self, q: usize) -> &[usize] {
        &self.indices[q * self.k..(q + 1) * self.k]
    }

    /// Distances of query `q`'s neighbors; `f32::INFINITY` marks padding.
    pub fn distances(&self, q: usize) -> &[f32] {
        &self.distances[q * self.k..(q + 1) * self.k]
    }

    /// All indices, flattened.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// All distances, flattened.
    pub fn all_distances(&self) -> &[f32] {
        &self.distances
    }
}

/// Capability to find k nearest neighbors inside each cloud of a batch.
pub trait NeighborSearch: Send + Sync + fmt::Debug {
    /// For every query, up to `k` nearest points of `source`, nearest first.
    ///
    /// Indices are local to `source`. Each returned row holds
    /// `min(k, source.len())` entries; `source` is never empty.
    fn search_cloud(&self, source: &[Point3], queries: &[Point3], k: usize) -> Vec<Vec<Neighbor>>;

    /// Batched search: neighbors of each query point within its own cloud.
    ///
    /// Returned indices are global offsets into `source`.
    fn knn(
        &self,
        source: &[Point3],
        source_splits: &RowSplits,
        queries: &[Point3],
        query_splits: &RowSplits,
        k: usize,
    ) -> Result<NeighborIndex> {
        source_splits.check_same_batch(query_splits)?;
        source_splits.check_len("source points", source.len())?;
        query_splits.check_len("query points", queries.len())?;
        if k == 0 {
            return Err(CoreError::DegenerateInput {
                reason: "neighbor count k must be positive".to_string(),
            });
        }

        let mut indices = Vec::with_capacity(queries.len() * k);
        let mut distances = Vec::with_capacity(queries.len() * k);

        for (cloud, (src, qry)) in source_splits.ranges().zip(query_splits.ranges()).enumerate() {
            if qry.is_empty() {
                continue;
            }
            if src.is_empty() {
                return Err(CoreError::DegenerateInput {
                    reason: format!(
                        "cloud {} has {} query points but no source points",
                        cloud,
                        qry.len()
                    ),
                });
            }
            if src.len() < k {
                log::debug!(
                    "cloud {}: {} source points < k={}, padding with nearest neighbor",
                    cloud,
                    src.len(),
                    k
                );
            }

            let offset = src.start;
            let rows = self.search_cloud(&source[src], &queries[qry], k);
            for row in rows {
                let nearest = row.first().copied().ok_or_else(|| CoreError::DegenerateInput {
                    reason: format!("search returned no neighbors in cloud {}", cloud),
                })?;
                for slot in 0..k {
                    match row.get(slot) {
                        Some(n) => {
                            indices.push(n.index + offset);
                            distances.push(n.distance);
                        }
                        None => {
                            indices.push(nearest.index + offset);
                            distances.push(f32::INFINITY);
                        }
                    }
                }
            }
        }

        Ok(NeighborIndex {
            k,
            indices,
            distances,
        })
    }
}

/// Sort candidates by distance, ties broken by index, and keep `k`.
fn nearest_first(mut candidates: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.index.cmp(&b.index))
    });
    candidates.truncate(k);
    candidates
}

/// Exhaustive O(n·m) search. Exact, used as the reference implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSearch;

impl BruteForceSearch {
    /// Create a brute-force search.
    pub fn new() -> Self {
        Self
    }
}

impl NeighborSearch for BruteForceSearch {
    fn search_cloud(&self, source: &[Point3], queries: &[Point3], k: usize) -> Vec<Vec<Neighbor>> {
        queries
            .iter()
            .map(|q| {
                let candidates = source
                    .iter()
                    .enumerate()
                    .map(|(index, p)| Neighbor {
                        index,
                        distance: p.distance(*q),
                    })
                    .collect();
                nearest_first(candidates, k)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    position: [f32; 3],
    index: usize,
}

impl KdPoint for IndexedPoint {
    type Scalar = f32;
    type Dim = typenum::U3;

    fn at(&self, k: usize) -> f32 {
        self.position[k]
    }
}

/// kd-tree backed search; one tree per source cloud.
///
/// Queries of a cloud are answered in parallel once there are at least
/// `min_parallel_queries` of them.
#[derive(Debug, Clone, Copy)]
pub struct KdTreeSearch {
    min_parallel_queries: usize,
}

impl Default for KdTreeSearch {
    fn default() -> Self {
        Self {
            min_parallel_queries: 1024,
        }
    }
}

impl KdTreeSearch {
    /// Create a kd-tree search with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query count above which a cloud is searched in parallel.
    pub fn with_min_parallel_queries(mut self, min_parallel_queries: usize) -> Self {
        self.min_parallel_queries = min_parallel_queries;
        self
    }
}

impl NeighborSearch for KdTreeSearch {
    fn search_cloud(&self, source: &[Point3], queries: &[Point3], k: usize) -> Vec<Vec<Neighbor>> {
        let items: Vec<IndexedPoint> = source
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint {
                position: p.as_array(),
                index,
            })
            .collect();
        let tree = KdTree::build_by_ordered_float(items);
        let k = k.min(source.len());

        let query_one = |q: &Point3| {
            let probe = IndexedPoint {
                position: q.as_array(),
                index: usize::MAX,
            };
            let found = tree
                .nearests(&probe, k)
                .into_iter()
                .map(|hit| Neighbor {
                    index: hit.item.index,
                    distance: hit.squared_distance.sqrt(),
                })
                .collect();
            nearest_first(found, k)
        };

        if queries.len() >= self.min_parallel_queries {
            queries.par_iter().map(query_one).collect()
        } else {
            queries.iter().map(query_one).collect()
        }
    }
}
