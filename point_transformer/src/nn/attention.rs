//! Vector self-attention over k-nearest-neighbor neighborhoods.

use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use pt_core::NeighborSearch;

use super::grouping::query_and_group;
use super::mlp::{LinearBlock, LinearBlockConfig};
use super::pxo::Pxo;
use crate::config::VectorAttentionConfig;
use crate::error::Result;

/// Point Transformer attention layer.
///
/// For every point and each of its `nsample` neighbors the layer computes a weight
/// vector from `key - query + position`, normalizes it over the neighborhood with a
/// softmax, and applies it channel-group-wise to `value + position`. Each weight is
/// shared by `share_planes` consecutive output channels.
///
/// Padded neighbor slots (clouds smaller than `nsample`) are masked out of the
/// softmax, so in inference the layer matches one built with `nsample` clamped to
/// the cloud size.
#[derive(Module, Debug)]
pub struct VectorAttention<B: Backend> {
    linear_q: Linear<B>,
    linear_k: Linear<B>,
    linear_v: Linear<B>,
    /// Relative position → hidden (Linear(3, 3), BN, ReLU).
    position_hidden: LinearBlock<B>,
    /// Hidden → position encoding of width `out_planes`.
    position_out: Linear<B>,
    weight_norm_in: BatchNorm<B, 0>,
    weight_linear_in: Linear<B>,
    weight_norm_hidden: BatchNorm<B, 0>,
    weight_linear_out: Linear<B>,
    activation: Relu,
    mid_planes: usize,
    out_planes: usize,
    share_planes: usize,
    nsample: usize,
}

impl<B: Backend> VectorAttention<B> {
    /// Build the layer, checking channel divisibility first.
    pub fn new(config: &VectorAttentionConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let mid = config.mid();
        let out = config.out_planes;
        let share = config.share_planes;

        Ok(Self {
            linear_q: LinearConfig::new(config.in_planes, mid).init(device),
            linear_k: LinearConfig::new(config.in_planes, mid).init(device),
            linear_v: LinearConfig::new(config.in_planes, out).init(device),
            position_hidden: LinearBlockConfig::new(3, 3).init(device),
            position_out: LinearConfig::new(3, out).init(device),
            weight_norm_in: BatchNormConfig::new(mid).init(device),
            weight_linear_in: LinearConfig::new(mid, mid / share).init(device),
            weight_norm_hidden: BatchNormConfig::new(mid / share).init(device),
            weight_linear_out: LinearConfig::new(mid / share, out / share).init(device),
            activation: Relu::new(),
            mid_planes: mid,
            out_planes: out,
            share_planes: share,
            nsample: config.nsample,
        })
    }

    /// Forward pass.
    ///
    /// Input: points `[n, 3]`, features `[n, in_planes]`.
    /// Output shape: `[n, out_planes]`.
    pub fn forward(&self, pxo: &Pxo<B>, search: &dyn NeighborSearch) -> Result<Tensor<B, 2>> {
        let (output, _) = self.attend(pxo, search)?;
        Ok(output)
    }

    /// Normalized attention weights, shape `[n, nsample, out_planes / share_planes]`.
    ///
    /// Every `[i, .., g]` slice sums to one over the neighborhood.
    pub fn attention_weights(&self, pxo: &Pxo<B>, search: &dyn NeighborSearch) -> Result<Tensor<B, 3>> {
        let (_, weights) = self.attend(pxo, search)?;
        Ok(weights)
    }

    fn attend(&self, pxo: &Pxo<B>, search: &dyn NeighborSearch) -> Result<(Tensor<B, 2>, Tensor<B, 3>)> {
        let n = pxo.len();
        let ns = self.nsample;
        let mid = self.mid_planes;
        let out = self.out_planes;
        let groups = out / self.share_planes;

        let query = self.linear_q.forward(pxo.features.clone());
        let key = self.linear_k.forward(pxo.features.clone());
        let value = self.linear_v.forward(pxo.features.clone());

        // One search serves both the key and value gathers.
        let host = pxo.host_points()?;
        let index = search.knn(&host, &pxo.row_splits, &host, &pxo.row_splits, ns)?;
        let splits = &pxo.row_splits;

        let key = query_and_group(
            ns, &pxo.points, &pxo.points, &key, Some(&index), splits, splits, true, search,
        )?;
        let value = query_and_group(
            ns, &pxo.points, &pxo.points, &value, Some(&index), splits, splits, false, search,
        )?;
        let relative = key.clone().slice([0..n, 0..ns, 0..3]);
        let key = key.slice([0..n, 0..ns, 3..3 + mid]);

        let position = self.encode_position(relative);
        let position_mid = position
            .clone()
            .reshape([n, ns, out / mid, mid])
            .sum_dim(2)
            .reshape([n, ns, mid]);

        let logits = key - query.reshape([n, 1, mid]) + position_mid;
        let scores = self.weight_scores(logits);
        let scores = match padding_mask::<B>(index.all_distances(), [n, ns], groups, &pxo.points.device()) {
            Some(mask) => scores.mask_fill(mask, f32::NEG_INFINITY),
            None => scores,
        };
        let weights = softmax(scores, 1);

        let value = (value + position).reshape([n, ns, self.share_planes, groups]);
        let output = (value * weights.clone().reshape([n, ns, 1, groups]))
            .sum_dim(1)
            .reshape([n, out]);

        Ok((output, weights))
    }

    /// `[n, ns, 3]` relative positions → `[n, ns, out_planes]`.
    fn encode_position(&self, relative: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.position_hidden.forward_grouped(relative);
        let [n, ns, width] = hidden.dims();
        self.position_out
            .forward(hidden.reshape([n * ns, width]))
            .reshape([n, ns, self.out_planes])
    }

    /// `[n, ns, mid]` logits → `[n, ns, out_planes / share_planes]` scores.
    fn weight_scores(&self, logits: Tensor<B, 3>) -> Tensor<B, 3> {
        let [n, ns, mid] = logits.dims();
        let x = logits.reshape([n * ns, mid]);
        let x = self.activation.forward(self.weight_norm_in.forward(x));
        let x = self.weight_linear_in.forward(x);
        let x = self.activation.forward(self.weight_norm_hidden.forward(x));
        let x = self.weight_linear_out.forward(x);
        x.reshape([n, ns, self.out_planes / self.share_planes])
    }
}

/// `[n, ns, groups]` mask of padded neighbor slots, `None` when every slot is real.
///
/// Slot 0 of every row is the query's nearest neighbor and is never padding, so a
/// masked softmax row always keeps at least one finite score.
fn padding_mask<B: Backend>(
    distances: &[f32],
    [n, ns]: [usize; 2],
    groups: usize,
    device: &B::Device,
) -> Option<Tensor<B, 3, Bool>> {
    let padded: Vec<bool> = distances.iter().map(|d| d.is_infinite()).collect();
    if !padded.contains(&true) {
        return None;
    }
    let mask = Tensor::<B, 3, Bool>::from_bool(TensorData::new(padded, [n, ns, 1]), device);
    Some(mask.repeat_dim(2, groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::pxo::{host_values, points_tensor};
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use pt_core::{BruteForceSearch, Point3, RowSplits};

    type TestBackend = NdArray;

    fn cloud(n: usize, channels: usize) -> Pxo<TestBackend> {
        let device = Default::default();
        let points: Vec<Point3> = (0..n)
            .map(|i| Point3::new(i as f32 * 0.1, (i % 3) as f32, (i % 2) as f32))
            .collect();
        let features =
            Tensor::<TestBackend, 2>::random([n, channels], Distribution::Normal(0.0, 1.0), &device);
        Pxo::new(points_tensor(&points, &device), features, RowSplits::from_counts(&[n - 3, 3])).unwrap()
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let config = VectorAttentionConfig::new(16, 16).with_nsample(4);
        let attention = VectorAttention::<TestBackend>::new(&config, &device).unwrap();

        let out = attention.forward(&cloud(12, 16), &BruteForceSearch).unwrap();
        assert_eq!(out.dims(), [12, 16]);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let device = Default::default();
        let config = VectorAttentionConfig::new(16, 32)
            .with_nsample(5)
            .with_mid_planes(Some(16));
        let attention = VectorAttention::<TestBackend>::new(&config, &device).unwrap();

        let weights = attention
            .attention_weights(&cloud(10, 16), &BruteForceSearch)
            .unwrap();
        assert_eq!(weights.dims(), [10, 5, 4]);

        let sums = host_values(&weights.sum_dim(1)).unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5, "weights sum to {sum}");
        }
    }

    #[test]
    fn test_rejects_indivisible_widths() {
        let device = Default::default();
        let config = VectorAttentionConfig::new(16, 20);
        assert!(VectorAttention::<TestBackend>::new(&config, &device).is_err());
    }

    #[test]
    fn test_padded_neighborhood_matches_clamped_k() {
        let device = Default::default();
        let padded = VectorAttention::<TestBackend>::new(
            &VectorAttentionConfig::new(16, 16).with_nsample(5),
            &device,
        )
        .unwrap();
        let clamped = VectorAttention::<TestBackend>::new(
            &VectorAttentionConfig::new(16, 16).with_nsample(3),
            &device,
        )
        .unwrap()
        .load_record(padded.clone().into_record());

        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let features = Tensor::<TestBackend, 2>::random([3, 16], Distribution::Normal(0.0, 1.0), &device);
        let pxo = Pxo::new(points_tensor(&points, &device), features, RowSplits::single(3)).unwrap();

        let weights = host_values(&padded.attention_weights(&pxo, &BruteForceSearch).unwrap()).unwrap();
        // [3, 5, 2]: slots 3 and 4 of every row are padding.
        for (i, w) in weights.iter().enumerate() {
            if (i / 2) % 5 >= 3 {
                assert_eq!(*w, 0.0);
            }
        }

        let a = host_values(&padded.forward(&pxo, &BruteForceSearch).unwrap()).unwrap();
        let b = host_values(&clamped.forward(&pxo, &BruteForceSearch).unwrap()).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5, "padded {x} vs clamped {y}");
        }
    }
}
