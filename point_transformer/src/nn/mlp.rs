//! Linear → BatchNorm → ReLU building block.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Configuration for a [`LinearBlock`].
#[derive(Config, Debug)]
pub struct LinearBlockConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension.
    pub output_dim: usize,
    /// Whether the linear layer carries a bias.
    #[config(default = true)]
    pub bias: bool,
    /// Whether to apply batch normalization after the linear layer.
    #[config(default = true)]
    pub batch_norm: bool,
    /// Whether to finish with a ReLU.
    #[config(default = true)]
    pub activation: bool,
}

impl LinearBlockConfig {
    /// Initialize the block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> LinearBlock<B> {
        let linear = LinearConfig::new(self.input_dim, self.output_dim)
            .with_bias(self.bias)
            .init(device);
        let norm = self
            .batch_norm
            .then(|| BatchNormConfig::new(self.output_dim).init(device));

        LinearBlock {
            linear,
            norm,
            activation: Relu::new(),
            use_activation: self.activation,
        }
    }
}

/// A point-wise linear layer with optional batch normalization and ReLU.
///
/// Normalization runs over the rows of a `[rows, channels]` tensor, so grouped
/// `[points, neighbors, channels]` inputs go through [`LinearBlock::forward_grouped`].
#[derive(Module, Debug)]
pub struct LinearBlock<B: Backend> {
    linear: Linear<B>,
    norm: Option<BatchNorm<B, 0>>,
    activation: Relu,
    use_activation: bool,
}

impl<B: Backend> LinearBlock<B> {
    /// Forward pass.
    ///
    /// Input shape: [rows, input_dim]
    /// Output shape: [rows, output_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = self.linear.forward(x);
        if let Some(norm) = &self.norm {
            x = norm.forward(x);
        }
        if self.use_activation {
            x = self.activation.forward(x);
        }
        x
    }

    /// Forward pass over neighborhoods.
    ///
    /// Input shape: [points, neighbors, input_dim]
    /// Output shape: [points, neighbors, output_dim]
    pub fn forward_grouped(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [points, neighbors, channels] = x.dims();
        let y = self.forward(x.reshape([points * neighbors, channels]));
        let [_, out] = y.dims();
        y.reshape([points, neighbors, out])
    }

    /// Output dimension.
    pub fn output_dim(&self) -> usize {
        let [_, out] = self.linear.weight.val().dims();
        out
    }
}
