//! # pt_core
//!
//! Framework-free building blocks for point-cloud networks that batch clouds
//! by concatenation.
//!
//! A batch of `b` clouds is stored as one flat coordinate array plus a
//! [`RowSplits`] prefix-sum sequence of length `b + 1`; cloud `i` owns the
//! half-open range `[splits[i], splits[i + 1])`. Every algorithm in this crate
//! respects those boundaries: nothing searches, samples, or reduces across
//! two clouds.
//!
//! ## Modules
//!
//! - [`types`]: [`Point3`]
//! - [`row_splits`]: [`RowSplits`] construction, validation and coarsening
//! - [`neighbors`]: the [`NeighborSearch`] capability with a kd-tree backed
//!   and a brute-force implementation
//! - [`sampling`]: per-cloud furthest-point sampling
//! - [`interpolation`]: inverse-distance weights for feature transfer
//! - [`error`]: [`CoreError`]
//!
//! ## Usage
//!
//! ```
//! use pt_core::prelude::*;
//!
//! let points: Vec<Point3> = (0..8).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
//! let splits = RowSplits::from_counts(&[5, 3]);
//!
//! let search = KdTreeSearch::new();
//! let index = search.knn(&points, &splits, &points, &splits, 2).unwrap();
//!
//! // Neighbors of the last point stay inside the second cloud.
//! assert!(index.neighbors(7).iter().all(|&i| (5..8).contains(&i)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod interpolation;
pub mod neighbors;
pub mod row_splits;
pub mod sampling;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{CoreError, Result};
    pub use crate::interpolation::{inverse_distance_weights, INTERPOLATION_EPSILON};
    pub use crate::neighbors::{
        BruteForceSearch, KdTreeSearch, Neighbor, NeighborIndex, NeighborSearch,
    };
    pub use crate::row_splits::RowSplits;
    pub use crate::sampling::furthest_point_sample;
    pub use crate::types::Point3;
}

pub use error::{CoreError, Result};
pub use interpolation::{inverse_distance_weights, INTERPOLATION_EPSILON};
pub use neighbors::{BruteForceSearch, KdTreeSearch, Neighbor, NeighborIndex, NeighborSearch};
pub use row_splits::RowSplits;
pub use sampling::furthest_point_sample;
pub use types::Point3;
