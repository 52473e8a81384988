//! Full encoder/decoder segmentation network.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use pt_core::{CoreError, NeighborSearch, RowSplits};

use super::bottleneck::Bottleneck;
use super::mlp::{LinearBlock, LinearBlockConfig};
use super::pxo::Pxo;
use super::transition_down::TransitionDown;
use super::transition_up::TransitionUp;
use crate::config::PointTransformerConfig;
use crate::error::{PointTransformerError, Result};

/// One encoder stage: a downsampling transition followed by residual blocks.
#[derive(Module, Debug)]
pub struct EncoderStage<B: Backend> {
    down: TransitionDown<B>,
    blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> EncoderStage<B> {
    fn forward(&self, pxo: Pxo<B>, search: &dyn NeighborSearch) -> Result<Pxo<B>> {
        let mut pxo = self.down.forward(pxo, search)?;
        for block in &self.blocks {
            pxo = block.forward(pxo, search)?;
        }
        Ok(pxo)
    }
}

/// One decoder stage: an upsampling transition followed by residual blocks.
#[derive(Module, Debug)]
pub struct DecoderStage<B: Backend> {
    up: TransitionUp<B>,
    blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> DecoderStage<B> {
    fn forward(&self, level: &Pxo<B>, coarse: Option<&Pxo<B>>, search: &dyn NeighborSearch) -> Result<Pxo<B>> {
        let features = self.up.forward(level, coarse, search)?;
        let mut pxo = level.clone().with_features(features)?;
        for block in &self.blocks {
            pxo = block.forward(pxo, search)?;
        }
        Ok(pxo)
    }
}

/// Per-point classifier: Linear → BN → ReLU → Linear.
#[derive(Module, Debug)]
pub struct SegmentationHead<B: Backend> {
    hidden: LinearBlock<B>,
    output: Linear<B>,
}

impl<B: Backend> SegmentationHead<B> {
    fn new(width: usize, num_classes: usize, device: &B::Device) -> Self {
        Self {
            hidden: LinearBlockConfig::new(width, width).init(device),
            output: LinearConfig::new(width, num_classes).init(device),
        }
    }

    /// `[n, width]` → `[n, num_classes]` logits.
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.output.forward(self.hidden.forward(features))
    }
}

/// Point Transformer semantic segmentation network.
///
/// A U-shaped network over batched point clouds: encoder stages progressively
/// downsample each cloud and widen its features, decoder stages transfer features back
/// to the finer levels through skip connections, and a point-wise head emits one row of
/// class logits per input point, in input order.
#[derive(Module, Debug)]
pub struct PointTransformer<B: Backend> {
    encoders: Vec<EncoderStage<B>>,
    decoders: Vec<DecoderStage<B>>,
    head: SegmentationHead<B>,
    in_channels: usize,
    num_classes: usize,
}

impl PointTransformerConfig {
    /// Validate the configuration and build the network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<PointTransformer<B>> {
        PointTransformer::new(self, device)
    }
}

impl<B: Backend> PointTransformer<B> {
    /// Build the network.
    pub fn new(config: &PointTransformerConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let mut encoders = Vec::with_capacity(config.num_stages());
        let mut decoders = Vec::with_capacity(config.num_stages());
        let mut in_planes = config.in_channels;

        for stage in 0..config.num_stages() {
            let down = TransitionDown::new(&config.down(stage, in_planes), device)?;
            let blocks = (1..config.blocks[stage])
                .map(|_| Bottleneck::new(&config.bottleneck(stage), device))
                .collect::<Result<Vec<_>>>()?;
            encoders.push(EncoderStage { down, blocks });
            in_planes = config.planes[stage];
        }

        for stage in 0..config.num_stages() {
            let up = TransitionUp::new(&config.up(stage), device)?;
            let blocks = (1..config.decoder_blocks[stage])
                .map(|_| Bottleneck::new(&config.bottleneck(stage), device))
                .collect::<Result<Vec<_>>>()?;
            decoders.push(DecoderStage { up, blocks });
        }

        let head = SegmentationHead::new(config.planes[0], config.num_classes, device);

        log::debug!(
            "built point transformer: {} stages, planes {:?}, {} classes",
            config.num_stages(),
            config.planes,
            config.num_classes
        );

        Ok(Self {
            encoders,
            decoders,
            head,
            in_channels: config.in_channels,
            num_classes: config.num_classes,
        })
    }

    /// Forward pass.
    ///
    /// `points` is `[n, 3]`. `features` is `[n, in_channels - 3]` and is required unless
    /// the network takes coordinates only (`in_channels == 3`), in which case it is
    /// ignored. Returns `[n, num_classes]` logits aligned with the input rows.
    pub fn forward(
        &self,
        points: Tensor<B, 2>,
        features: Option<Tensor<B, 2>>,
        row_splits: RowSplits,
        search: &dyn NeighborSearch,
    ) -> Result<Tensor<B, 2>> {
        let [n, _] = points.dims();
        if n == 0 {
            return Err(CoreError::DegenerateInput {
                reason: "batch contains no points".to_string(),
            }
            .into());
        }

        let input = self.input_features(&points, features)?;
        let pxo = Pxo::new(points, input, row_splits)?;

        let mut levels = Vec::with_capacity(self.encoders.len());
        let mut current = pxo;
        for (stage, encoder) in self.encoders.iter().enumerate() {
            current = encoder.forward(current, search)?;
            log::trace!(
                "encoder {}: {} points, {} channels",
                stage,
                current.len(),
                current.channels()
            );
            levels.push(current.clone());
        }

        let mut upper: Option<Pxo<B>> = None;
        for (decoder, level) in self.decoders.iter().zip(&levels).rev() {
            upper = Some(decoder.forward(level, upper.as_ref(), search)?);
        }
        let finest = upper.ok_or_else(|| PointTransformerError::config("network has no stages"))?;

        Ok(self.head.forward(finest.features))
    }

    /// Input width, coordinates included.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Number of predicted classes.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_features(&self, points: &Tensor<B, 2>, features: Option<Tensor<B, 2>>) -> Result<Tensor<B, 2>> {
        if self.in_channels == 3 {
            return Ok(points.clone());
        }

        let [n, _] = points.dims();
        let expected = self.in_channels - 3;
        let features = features.ok_or_else(|| {
            PointTransformerError::InvalidData(format!(
                "network expects {expected} feature channels but none were given"
            ))
        })?;
        let [rows, channels] = features.dims();
        if rows != n || channels != expected {
            return Err(PointTransformerError::ShapeMismatch {
                expected: vec![n, expected],
                got: vec![rows, channels],
            });
        }
        Ok(Tensor::cat(vec![points.clone(), features], 1))
    }
}
