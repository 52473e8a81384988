//! Network configuration types.

use burn::config::Config;

use crate::error::PointTransformerError;

/// Configuration for the vector self-attention layer.
#[derive(Config, Debug)]
pub struct VectorAttentionConfig {
    /// Input feature width.
    pub in_planes: usize,

    /// Output feature width.
    pub out_planes: usize,

    /// Number of output channels that share one attention weight.
    #[config(default = 8)]
    pub share_planes: usize,

    /// Neighborhood size.
    #[config(default = 16)]
    pub nsample: usize,

    /// Width of the query/key projections. Defaults to `out_planes`.
    #[config(default = "None")]
    pub mid_planes: Option<usize>,
}

impl VectorAttentionConfig {
    /// Width of the query/key projections.
    pub fn mid(&self) -> usize {
        self.mid_planes.unwrap_or(self.out_planes)
    }

    /// Check the channel divisibility the grouped weighting relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        let mid = self.mid();
        if self.in_planes == 0 || self.out_planes == 0 || mid == 0 {
            return Err(PointTransformerError::config("attention widths must be positive"));
        }
        if self.nsample == 0 {
            return Err(PointTransformerError::config("attention nsample must be positive"));
        }
        if self.share_planes == 0 {
            return Err(PointTransformerError::config("share_planes must be positive"));
        }
        if self.out_planes % self.share_planes != 0 {
            return Err(PointTransformerError::config(format!(
                "out_planes {} is not divisible by share_planes {}",
                self.out_planes, self.share_planes
            )));
        }
        if mid % self.share_planes != 0 {
            return Err(PointTransformerError::config(format!(
                "mid_planes {} is not divisible by share_planes {}",
                mid, self.share_planes
            )));
        }
        if self.out_planes % mid != 0 {
            return Err(PointTransformerError::config(format!(
                "out_planes {} is not divisible by mid_planes {}",
                self.out_planes, mid
            )));
        }
        Ok(())
    }
}

/// Configuration for a residual bottleneck block.
#[derive(Config, Debug)]
pub struct BottleneckConfig {
    /// Input feature width.
    pub in_planes: usize,

    /// Inner and output feature width.
    pub planes: usize,

    /// Number of output channels that share one attention weight.
    #[config(default = 8)]
    pub share_planes: usize,

    /// Neighborhood size of the inner attention layer.
    #[config(default = 16)]
    pub nsample: usize,
}

impl BottleneckConfig {
    /// Configuration of the inner attention layer.
    pub fn attention(&self) -> VectorAttentionConfig {
        VectorAttentionConfig::new(self.planes, self.planes)
            .with_share_planes(self.share_planes)
            .with_nsample(self.nsample)
    }

    /// The residual add needs matching widths.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.in_planes != self.planes {
            return Err(PointTransformerError::config(format!(
                "bottleneck input width {} differs from output width {}",
                self.in_planes, self.planes
            )));
        }
        self.attention().validate()
    }
}

/// Configuration for the downsampling transition.
#[derive(Config, Debug)]
pub struct TransitionDownConfig {
    /// Input feature width.
    pub in_planes: usize,

    /// Output feature width.
    pub out_planes: usize,

    /// Downsampling factor. A stride of 1 keeps every point.
    #[config(default = 1)]
    pub stride: usize,

    /// Neighborhood size used for pooling when `stride > 1`.
    #[config(default = 16)]
    pub nsample: usize,
}

impl TransitionDownConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.stride == 0 {
            return Err(PointTransformerError::config("stride must be at least 1"));
        }
        if self.nsample == 0 {
            return Err(PointTransformerError::config("nsample must be positive"));
        }
        if self.in_planes == 0 || self.out_planes == 0 {
            return Err(PointTransformerError::config("transition widths must be positive"));
        }
        Ok(())
    }
}

/// Configuration for the upsampling transition.
///
/// Without `out_planes` the transition runs in head mode: every point is fused with the
/// mean feature of its own cloud. With `out_planes` it runs in skip mode and fuses a
/// fine level with features interpolated from the coarser level.
#[derive(Config, Debug)]
pub struct TransitionUpConfig {
    /// Feature width of the coarse input (or of the single input in head mode).
    pub in_planes: usize,

    /// Feature width of the fine input and of the output, in skip mode.
    #[config(default = "None")]
    pub out_planes: Option<usize>,
}

impl TransitionUpConfig {
    /// True when the transition fuses a single level with its cloud summary.
    pub fn is_head(&self) -> bool {
        self.out_planes.is_none()
    }

    /// Output feature width.
    pub fn output_width(&self) -> usize {
        self.out_planes.unwrap_or(self.in_planes)
    }
}

/// Configuration for the full segmentation network.
///
/// The per-stage lists (`planes`, `blocks`, `decoder_blocks`, `strides`, `nsamples`) must
/// all have the same length; each entry describes one encoder stage and its decoder
/// counterpart.
#[derive(Config, Debug)]
pub struct PointTransformerConfig {
    /// Input width: 3 for coordinates only, otherwise 3 plus the feature channels.
    #[config(default = 6)]
    pub in_channels: usize,

    /// Number of semantic classes.
    #[config(default = 13)]
    pub num_classes: usize,

    /// Feature width per stage.
    #[config(default = "vec![32, 64, 128, 256, 512]")]
    pub planes: Vec<usize>,

    /// Number of encoder blocks per stage (the transition counts as one).
    #[config(default = "vec![2, 2, 2, 2, 2]")]
    pub blocks: Vec<usize>,

    /// Number of decoder blocks per stage (the transition counts as one).
    #[config(default = "vec![2, 2, 2, 2, 2]")]
    pub decoder_blocks: Vec<usize>,

    /// Downsampling stride per stage.
    #[config(default = "vec![1, 4, 4, 4, 4]")]
    pub strides: Vec<usize>,

    /// Neighborhood size per stage.
    #[config(default = "vec![8, 16, 16, 16, 16]")]
    pub nsamples: Vec<usize>,

    /// Number of channels that share one attention weight.
    #[config(default = 8)]
    pub share_planes: usize,
}

impl Default for PointTransformerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PointTransformerConfig {
    /// Number of encoder (and decoder) stages.
    pub fn num_stages(&self) -> usize {
        self.planes.len()
    }

    /// Number of feature channels expected next to the coordinates.
    pub fn feature_channels(&self) -> usize {
        self.in_channels.saturating_sub(3)
    }

    /// Validate the configuration before building the network.
    pub fn validate(&self) -> crate::error::Result<()> {
        let stages = self.planes.len();
        if stages == 0 {
            return Err(PointTransformerError::config("at least one stage is required"));
        }
        let lists = [
            ("blocks", self.blocks.len()),
            ("decoder_blocks", self.decoder_blocks.len()),
            ("strides", self.strides.len()),
            ("nsamples", self.nsamples.len()),
        ];
        for (name, len) in lists {
            if len != stages {
                return Err(PointTransformerError::config(format!(
                    "{name} has {len} entries but planes has {stages}"
                )));
            }
        }
        if self.in_channels < 3 {
            return Err(PointTransformerError::config(format!(
                "in_channels must be at least 3, got {}",
                self.in_channels
            )));
        }
        if self.num_classes == 0 {
            return Err(PointTransformerError::config("num_classes must be positive"));
        }
        if self.blocks.iter().chain(&self.decoder_blocks).any(|&b| b == 0) {
            return Err(PointTransformerError::config(
                "every stage needs at least one block",
            ));
        }
        for stage in 0..stages {
            let input = if stage == 0 {
                self.in_channels
            } else {
                self.planes[stage - 1]
            };
            self.down(stage, input).validate()?;
            if self.blocks[stage] > 1 || self.decoder_blocks[stage] > 1 {
                self.bottleneck(stage).validate()?;
            }
        }
        Ok(())
    }

    pub(crate) fn down(&self, stage: usize, in_planes: usize) -> TransitionDownConfig {
        TransitionDownConfig::new(in_planes, self.planes[stage])
            .with_stride(self.strides[stage])
            .with_nsample(self.nsamples[stage])
    }

    pub(crate) fn bottleneck(&self, stage: usize) -> BottleneckConfig {
        BottleneckConfig::new(self.planes[stage], self.planes[stage])
            .with_share_planes(self.share_planes)
            .with_nsample(self.nsamples[stage])
    }

    pub(crate) fn up(&self, stage: usize) -> TransitionUpConfig {
        if stage + 1 == self.planes.len() {
            TransitionUpConfig::new(self.planes[stage])
        } else {
            TransitionUpConfig::new(self.planes[stage + 1]).with_out_planes(Some(self.planes[stage]))
        }
    }
}
