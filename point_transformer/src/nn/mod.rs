//! Neural network modules.
//!
//! - [`Pxo`]: points, features and row splits of a batch at one resolution
//! - [`VectorAttention`]: vector self-attention over k-nearest neighborhoods
//! - [`TransitionDown`] / [`TransitionUp`]: moves between resolutions
//! - [`Bottleneck`]: residual attention block
//! - [`PointTransformer`]: the full segmentation network

mod attention;
mod bottleneck;
mod grouping;
mod mlp;
mod model;
mod pxo;
mod transition_down;
mod transition_up;

pub use attention::VectorAttention;
pub use bottleneck::Bottleneck;
pub use grouping::{interpolate, query_and_group, INTERPOLATION_NEIGHBORS};
pub use mlp::{LinearBlock, LinearBlockConfig};
pub use model::{DecoderStage, EncoderStage, PointTransformer, SegmentationHead};
pub use pxo::{host_points, host_values, points_tensor, Pxo};
pub use transition_down::TransitionDown;
pub use transition_up::TransitionUp;
