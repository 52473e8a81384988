//! SGD optimizer and multi-step learning-rate schedule.

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{Sgd, SgdConfig};
use burn::tensor::backend::AutodiffBackend;

use crate::config::OptimizerConfig;

impl OptimizerConfig {
    /// Burn SGD configuration with momentum and weight decay.
    pub fn sgd(&self) -> SgdConfig {
        let momentum = (self.momentum > 0.0).then(|| {
            MomentumConfig::new()
                .with_momentum(self.momentum as _)
                .with_dampening(0.0)
        });
        let weight_decay = (self.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.weight_decay as _));

        SgdConfig::new()
            .with_momentum(momentum)
            .with_weight_decay(weight_decay)
    }

    /// Initialize the optimizer for module `M`.
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Sgd<B::InnerBackend>, M, B> {
        self.sgd().init()
    }

    /// Learning-rate schedule laid out over `max_epoch`.
    pub fn schedule(&self) -> MultiStepSchedule {
        let milestones = self
            .milestones
            .iter()
            .map(|fraction| (fraction * self.max_epoch as f64) as usize)
            .collect();
        MultiStepSchedule::new(self.learning_rate, milestones, self.gamma)
    }
}

/// Learning rate multiplied by `gamma` at every milestone epoch reached.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStepSchedule {
    base: f64,
    milestones: Vec<usize>,
    gamma: f64,
}

impl MultiStepSchedule {
    /// Create a schedule. Milestones are epoch numbers.
    pub fn new(base: f64, mut milestones: Vec<usize>, gamma: f64) -> Self {
        milestones.sort_unstable();
        Self {
            base,
            milestones,
            gamma,
        }
    }

    /// Learning rate in effect during `epoch` (0-based).
    pub fn lr_at(&self, epoch: usize) -> f64 {
        let passed = self.milestones.iter().filter(|&&m| m <= epoch).count();
        self.base * self.gamma.powi(passed as i32)
    }

    /// Milestone epochs.
    pub fn milestones(&self) -> &[usize] {
        &self.milestones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};
    use burn::optim::{GradientsParams, Optimizer};
    use burn::prelude::*;

    #[test]
    fn test_default_milestones() {
        let schedule = OptimizerConfig::new()
            .with_learning_rate(0.5)
            .with_max_epoch(100)
            .schedule();
        assert_eq!(schedule.milestones(), &[60, 80]);

        assert!((schedule.lr_at(0) - 0.5).abs() < 1e-12);
        assert!((schedule.lr_at(59) - 0.5).abs() < 1e-12);
        assert!((schedule.lr_at(60) - 0.05).abs() < 1e-12);
        assert!((schedule.lr_at(80) - 0.005).abs() < 1e-12);
        assert!((schedule.lr_at(1000) - 0.005).abs() < 1e-12);
    }

    type Ad = Autodiff<NdArray>;

    fn weights(linear: &Linear<Ad>) -> Vec<f32> {
        linear.weight.val().to_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    /// Weight deltas of `steps` SGD steps on `scale * sum(W x)` with a ones input.
    fn step_deltas(config: &OptimizerConfig, scale: f32, steps: usize) -> Vec<f32> {
        let device = Default::default();
        let mut linear = LinearConfig::new(2, 2).with_bias(false).init::<Ad>(&device);
        let mut optimizer = config.init::<Ad, Linear<Ad>>();
        let mut deltas = Vec::new();

        for _ in 0..steps {
            let before = weights(&linear);
            let input = Tensor::<Ad, 2>::ones([1, 2], &device);
            let loss = linear.forward(input).sum().mul_scalar(scale);
            let grads = GradientsParams::from_grads(loss.backward(), &linear);
            linear = optimizer.step(1.0, linear, grads);
            let after = weights(&linear);
            deltas.push(before[0] - after[0]);
        }
        deltas
    }

    #[test]
    fn test_weight_decay_moves_weights_without_gradient() {
        let decayed = OptimizerConfig::new().with_momentum(0.0).with_weight_decay(0.5);
        assert!(step_deltas(&decayed, 0.0, 1)[0].abs() > 1e-6);

        let plain = OptimizerConfig::new().with_momentum(0.0).with_weight_decay(0.0);
        assert!(step_deltas(&plain, 0.0, 1)[0].abs() < 1e-7);
    }

    #[test]
    fn test_momentum_accumulates_steps() {
        let plain = OptimizerConfig::new().with_momentum(0.0).with_weight_decay(0.0);
        let deltas = step_deltas(&plain, 1.0, 2);
        assert!((deltas[0] - 1.0).abs() < 1e-5);
        assert!((deltas[1] - 1.0).abs() < 1e-5);

        let heavy = OptimizerConfig::new().with_momentum(0.9).with_weight_decay(0.0);
        let deltas = step_deltas(&heavy, 1.0, 2);
        assert!((deltas[0] - 1.0).abs() < 1e-5);
        assert!((deltas[1] - 1.9).abs() < 1e-5);
    }
}
