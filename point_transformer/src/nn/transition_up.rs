//! Upsampling transition between decoder stages.

use burn::module::Module;
use burn::prelude::*;
use pt_core::{CoreError, NeighborSearch};

use super::grouping::{interpolate, INTERPOLATION_NEIGHBORS};
use super::mlp::{LinearBlock, LinearBlockConfig};
use super::pxo::Pxo;
use crate::config::TransitionUpConfig;
use crate::error::{PointTransformerError, Result};

/// Fuses a decoder level with either its cloud summary or a coarser level.
///
/// Head mode (deepest level, no coarse input): each point's features are concatenated
/// with a projection of the mean feature of its own cloud, then Linear → BN → ReLU.
///
/// Skip mode: `fine' = lin1(fine) + interpolate(lin2(coarse))`, where both projections
/// are Linear → BN → ReLU and the interpolation uses the 3 nearest coarse points.
#[derive(Module, Debug)]
pub struct TransitionUp<B: Backend> {
    linear1: LinearBlock<B>,
    linear2: LinearBlock<B>,
    head: bool,
}

impl<B: Backend> TransitionUp<B> {
    /// Build the transition.
    pub fn new(config: &TransitionUpConfig, device: &B::Device) -> Result<Self> {
        if config.in_planes == 0 || config.out_planes == Some(0) {
            return Err(PointTransformerError::config("transition widths must be positive"));
        }

        let (linear1, linear2) = match config.out_planes {
            None => {
                let c = config.in_planes;
                (
                    LinearBlockConfig::new(2 * c, c).init(device),
                    LinearBlockConfig::new(c, c).with_batch_norm(false).init(device),
                )
            }
            Some(out) => (
                LinearBlockConfig::new(out, out).init(device),
                LinearBlockConfig::new(config.in_planes, out).init(device),
            ),
        };

        Ok(Self {
            linear1,
            linear2,
            head: config.is_head(),
        })
    }

    /// True when this transition runs without a coarse input.
    pub fn is_head(&self) -> bool {
        self.head
    }

    /// Forward pass, returning new features for the rows of `fine`.
    pub fn forward(
        &self,
        fine: &Pxo<B>,
        coarse: Option<&Pxo<B>>,
        search: &dyn NeighborSearch,
    ) -> Result<Tensor<B, 2>> {
        match (self.head, coarse) {
            (true, None) => self.forward_head(fine),
            (false, Some(coarse)) => self.forward_skip(fine, coarse, search),
            (true, Some(_)) => Err(PointTransformerError::config(
                "head transition does not take a coarse input",
            )),
            (false, None) => Err(PointTransformerError::config(
                "skip transition requires a coarse input",
            )),
        }
    }

    fn forward_head(&self, pxo: &Pxo<B>) -> Result<Tensor<B, 2>> {
        let channels = pxo.channels();
        let mut segments = Vec::with_capacity(pxo.row_splits.num_clouds());

        for range in pxo.row_splits.ranges() {
            let count = range.len();
            if count == 0 {
                continue;
            }
            let cloud = pxo.features.clone().slice([range, 0..channels]);
            let mean = cloud.clone().sum_dim(0).div_scalar(count as f32);
            let summary = self.linear2.forward(mean).repeat_dim(0, count);
            segments.push(Tensor::cat(vec![cloud, summary], 1));
        }

        if segments.is_empty() {
            return Err(CoreError::DegenerateInput {
                reason: "head transition received no points".to_string(),
            }
            .into());
        }
        Ok(self.linear1.forward(Tensor::cat(segments, 0)))
    }

    fn forward_skip(&self, fine: &Pxo<B>, coarse: &Pxo<B>, search: &dyn NeighborSearch) -> Result<Tensor<B, 2>> {
        let projected = self.linear2.forward(coarse.features.clone());
        let transferred = interpolate(
            &coarse.points,
            &coarse.row_splits,
            &fine.points,
            &fine.row_splits,
            &projected,
            INTERPOLATION_NEIGHBORS,
            search,
        )?;
        Ok(self.linear1.forward(fine.features.clone()) + transferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::pxo::{host_values, points_tensor};
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use pt_core::{BruteForceSearch, Point3, RowSplits};

    type TestBackend = NdArray;

    fn cloud(counts: &[usize], channels: usize) -> Pxo<TestBackend> {
        let device = Default::default();
        let total: usize = counts.iter().sum();
        let points: Vec<Point3> = (0..total)
            .map(|i| Point3::new(i as f32, (i % 4) as f32, 0.0))
            .collect();
        let features =
            Tensor::<TestBackend, 2>::random([total, channels], Distribution::Normal(0.0, 1.0), &device);
        Pxo::new(points_tensor(&points, &device), features, RowSplits::from_counts(counts)).unwrap()
    }

    #[test]
    fn test_head_mode_shape() {
        let device = Default::default();
        let up = TransitionUp::<TestBackend>::new(&TransitionUpConfig::new(8), &device).unwrap();
        assert!(up.is_head());

        let out = up.forward(&cloud(&[5, 3], 8), None, &BruteForceSearch).unwrap();
        assert_eq!(out.dims(), [8, 8]);
    }

    #[test]
    fn test_skip_mode_shape() {
        let device = Default::default();
        let config = TransitionUpConfig::new(16).with_out_planes(Some(8));
        let up = TransitionUp::<TestBackend>::new(&config, &device).unwrap();

        let fine = cloud(&[6, 4], 8);
        let coarse = cloud(&[2, 1], 16);
        let out = up.forward(&fine, Some(&coarse), &BruteForceSearch).unwrap();
        assert_eq!(out.dims(), [10, 8]);
    }

    #[test]
    fn test_identical_levels_interpolate_to_identity() {
        let device = Default::default();
        let config = TransitionUpConfig::new(8).with_out_planes(Some(8));
        let up = TransitionUp::<TestBackend>::new(&config, &device).unwrap();

        let level = cloud(&[5, 4], 8);
        let out = up.forward(&level, Some(&level), &BruteForceSearch).unwrap();
        let expected = up.linear1.forward(level.features.clone())
            + up.linear2.forward(level.features.clone());

        let got = host_values(&out).unwrap();
        let want = host_values(&expected).unwrap();
        for (a, b) in got.iter().zip(&want) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_mode_mismatch_is_an_error() {
        let device = Default::default();
        let head = TransitionUp::<TestBackend>::new(&TransitionUpConfig::new(8), &device).unwrap();
        let level = cloud(&[4], 8);
        assert!(head.forward(&level, Some(&level), &BruteForceSearch).is_err());
    }
}
