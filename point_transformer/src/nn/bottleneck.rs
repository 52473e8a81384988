//! Residual attention block.

use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig, Relu};
use burn::prelude::*;
use pt_core::NeighborSearch;

use super::attention::VectorAttention;
use super::mlp::{LinearBlock, LinearBlockConfig};
use super::pxo::Pxo;
use crate::config::BottleneckConfig;
use crate::error::Result;

/// Linear → BN → ReLU → attention → BN → ReLU → Linear → BN, plus identity, then ReLU.
///
/// Points and row splits pass through unchanged; only features are updated.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    reduce: LinearBlock<B>,
    attention: VectorAttention<B>,
    attention_norm: BatchNorm<B, 0>,
    expand: LinearBlock<B>,
    activation: Relu,
}

impl<B: Backend> Bottleneck<B> {
    /// Build the block.
    pub fn new(config: &BottleneckConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let planes = config.planes;

        Ok(Self {
            reduce: LinearBlockConfig::new(config.in_planes, planes)
                .with_bias(false)
                .init(device),
            attention: VectorAttention::new(&config.attention(), device)?,
            attention_norm: BatchNormConfig::new(planes).init(device),
            expand: LinearBlockConfig::new(planes, planes)
                .with_bias(false)
                .with_activation(false)
                .init(device),
            activation: Relu::new(),
        })
    }

    /// Forward pass.
    pub fn forward(&self, pxo: Pxo<B>, search: &dyn NeighborSearch) -> Result<Pxo<B>> {
        let identity = pxo.features.clone();

        let reduced = self.reduce.forward(pxo.features.clone());
        let pxo = pxo.with_features(reduced)?;

        let x = self.attention.forward(&pxo, search)?;
        let x = self.activation.forward(self.attention_norm.forward(x));
        let x = self.expand.forward(x);
        let x = self.activation.forward(x + identity);

        pxo.with_features(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::pxo::points_tensor;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use pt_core::{BruteForceSearch, Point3, RowSplits};

    type TestBackend = NdArray;

    #[test]
    fn test_bottleneck_preserves_layout() {
        let device = Default::default();
        let config = BottleneckConfig::new(16, 16).with_nsample(4);
        let block = Bottleneck::<TestBackend>::new(&config, &device).unwrap();

        let points: Vec<Point3> = (0..9).map(|i| Point3::new(i as f32, 0.0, (i % 2) as f32)).collect();
        let features = Tensor::<TestBackend, 2>::random([9, 16], Distribution::Normal(0.0, 1.0), &device);
        let splits = RowSplits::from_counts(&[6, 3]);
        let pxo = Pxo::new(points_tensor(&points, &device), features, splits.clone()).unwrap();

        let out = block.forward(pxo, &BruteForceSearch).unwrap();
        assert_eq!(out.features.dims(), [9, 16]);
        assert_eq!(out.row_splits, splits);
    }

    #[test]
    fn test_bottleneck_rejects_width_change() {
        let device = Default::default();
        let config = BottleneckConfig::new(16, 32);
        assert!(Bottleneck::<TestBackend>::new(&config, &device).is_err());
    }
}
