//! Downsampling transition between encoder stages.

use burn::module::Module;
use burn::prelude::*;
use pt_core::{furthest_point_sample, NeighborSearch, Point3};

use super::grouping::query_and_group;
use super::mlp::{LinearBlock, LinearBlockConfig};
use super::pxo::{index_tensor, Pxo};
use crate::config::TransitionDownConfig;
use crate::error::Result;

/// Reduces every cloud to `max(1, floor(count / stride))` points.
///
/// Centers are chosen by furthest point sampling. Each center pools its `nsample`
/// neighbors from the input level: relative positions and features go through a
/// shared Linear → BN → ReLU, then a max over the neighborhood. With `stride == 1`
/// the block is a point-wise Linear → BN → ReLU that keeps points and row splits.
#[derive(Module, Debug)]
pub struct TransitionDown<B: Backend> {
    mlp: LinearBlock<B>,
    stride: usize,
    nsample: usize,
}

impl<B: Backend> TransitionDown<B> {
    /// Build the transition.
    pub fn new(config: &TransitionDownConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let input_dim = if config.stride == 1 {
            config.in_planes
        } else {
            3 + config.in_planes
        };
        let mlp = LinearBlockConfig::new(input_dim, config.out_planes)
            .with_bias(false)
            .init(device);

        Ok(Self {
            mlp,
            stride: config.stride,
            nsample: config.nsample,
        })
    }

    /// Forward pass.
    pub fn forward(&self, pxo: Pxo<B>, search: &dyn NeighborSearch) -> Result<Pxo<B>> {
        if self.stride == 1 {
            let features = self.mlp.forward(pxo.features.clone());
            return pxo.with_features(features);
        }

        let host = pxo.host_points()?;
        let sampled_splits = pxo.row_splits.downsample(self.stride);
        let picked = furthest_point_sample(&host, &pxo.row_splits, &sampled_splits)?;
        let centers: Vec<Point3> = picked.iter().map(|&i| host[i]).collect();

        let device = pxo.points.device();
        let sampled_points = pxo.points.clone().select(0, index_tensor::<B>(&picked, &device));

        let index = search.knn(&host, &pxo.row_splits, &centers, &sampled_splits, self.nsample)?;
        let grouped = query_and_group(
            self.nsample,
            &pxo.points,
            &sampled_points,
            &pxo.features,
            Some(&index),
            &pxo.row_splits,
            &sampled_splits,
            true,
            search,
        )?;

        // [m, k, c] -> [m, c, k] so the max runs over the last axis.
        let pooled = self.mlp.forward_grouped(grouped).swap_dims(1, 2).max_dim(2);
        let [m, channels, _] = pooled.dims();
        log::trace!(
            "transition down: {} -> {} points, {} channels",
            pxo.len(),
            m,
            channels
        );

        Pxo::new(sampled_points, pooled.reshape([m, channels]), sampled_splits)
    }

    /// Downsampling factor.
    pub fn stride(&self) -> usize {
        self.stride
    }
}
