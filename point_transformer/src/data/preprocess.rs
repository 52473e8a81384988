//! Per-cloud preprocessing: cropping, recentering, feature scaling and projection back
//! to the original points.

use pt_core::{NeighborSearch, Point3, RowSplits};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::point_cloud::SegmentationCloud;
use crate::config::PreprocessConfig;
use crate::error::{PointTransformerError, Result};

/// Which pass a cloud is prepared for. Training picks crop seeds at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Training pass.
    Training,
    /// Validation pass.
    Validation,
    /// Inference pass.
    Test,
}

/// A cloud ready for batching, plus how to map predictions back.
#[derive(Debug, Clone)]
pub struct ProcessedCloud {
    /// Cropped, recentered and scaled cloud.
    pub cloud: SegmentationCloud,
    /// Bounding-box center subtracted from the points, if recentered.
    pub center: Option<Point3>,
    /// For each original point, the nearest processed point. Present for test clouds.
    pub projection: Option<Vec<usize>>,
}

/// Keep the `max_points` points nearest to `points[seed]`, nearest first.
///
/// Clouds at or under the ceiling are returned unchanged.
pub fn crop_to_ceiling(cloud: &SegmentationCloud, max_points: usize, seed: usize) -> Result<SegmentationCloud> {
    if cloud.len() <= max_points {
        return Ok(cloud.clone());
    }
    let center = *cloud.points.get(seed).ok_or_else(|| {
        PointTransformerError::InvalidData(format!(
            "crop seed {seed} out of range for {} points",
            cloud.len()
        ))
    })?;

    let mut order: Vec<(f32, usize)> = cloud
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (p.distance_squared(center), i))
        .collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let keep: Vec<usize> = order.into_iter().take(max_points).map(|(_, i)| i).collect();

    cloud.select(&keep)
}

/// Shift points so that their bounding-box center sits at the origin.
///
/// Returns the subtracted center, or `None` for an empty slice.
pub fn recenter(points: &mut [Point3]) -> Option<Point3> {
    let first = *points.first()?;
    let (min, max) = points
        .iter()
        .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
    let center = (min + max) / 2.0;
    for p in points.iter_mut() {
        *p = *p - center;
    }
    Some(center)
}

/// For every original point, the index of the nearest processed point.
pub fn projection_indices(
    original: &[Point3],
    processed: &[Point3],
    search: &dyn NeighborSearch,
) -> Result<Vec<usize>> {
    let index = search.knn(
        processed,
        &RowSplits::single(processed.len()),
        original,
        &RowSplits::single(original.len()),
        1,
    )?;
    Ok(index.indices().to_vec())
}

/// Applies [`PreprocessConfig`] to clouds.
#[derive(Debug)]
pub struct Preprocessor {
    config: PreprocessConfig,
    rng: StdRng,
}

impl Preprocessor {
    /// Create a preprocessor; `seed` drives the training crop seeds.
    pub fn new(config: PreprocessConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Prepare one cloud.
    ///
    /// Clouds above `max_points` are cropped around a seed point: random for training,
    /// the middle point otherwise. Test clouds also record the projection from the
    /// original points onto the kept ones.
    pub fn process(
        &mut self,
        cloud: &SegmentationCloud,
        split: Split,
        search: &dyn NeighborSearch,
    ) -> Result<ProcessedCloud> {
        if cloud.is_empty() {
            return Err(PointTransformerError::InvalidData("cannot preprocess an empty cloud".to_string()));
        }

        let mut processed = match self.config.max_points {
            Some(max_points) if cloud.len() > max_points => {
                let seed = match split {
                    Split::Training => self.rng.gen_range(0..cloud.len()),
                    Split::Validation | Split::Test => cloud.len() / 2,
                };
                log::debug!(
                    "cropping cloud of {} points to {} around point {}",
                    cloud.len(),
                    max_points,
                    seed
                );
                crop_to_ceiling(cloud, max_points, seed)?
            }
            _ => cloud.clone(),
        };

        let projection = match split {
            Split::Test => Some(projection_indices(&cloud.points, &processed.points, search)?),
            Split::Training | Split::Validation => None,
        };

        let center = if self.config.recenter {
            recenter(&mut processed.points)
        } else {
            None
        };

        let scale = self.config.feature_scale;
        if let Some(features) = processed.features_mut() {
            features.iter_mut().for_each(|v| *v /= scale);
        }

        Ok(ProcessedCloud {
            cloud: processed,
            center,
            projection,
        })
    }
}
