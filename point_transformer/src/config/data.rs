//! Data pipeline configuration.

use burn::config::Config;

use crate::error::PointTransformerError;

/// Configuration for per-cloud preprocessing.
#[derive(Config, Debug)]
pub struct PreprocessConfig {
    /// Upper bound on the number of points kept per cloud. Larger clouds are cropped
    /// to the points nearest to a seed point.
    #[config(default = "Some(80000)")]
    pub max_points: Option<usize>,

    /// Raw feature values are divided by this factor (8-bit colors by default).
    #[config(default = 255.0)]
    pub feature_scale: f32,

    /// Move every cloud so that its bounding-box center sits at the origin.
    #[config(default = true)]
    pub recenter: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_points == Some(0) {
            return Err(PointTransformerError::config("max_points must be positive"));
        }
        if !(self.feature_scale.is_finite() && self.feature_scale > 0.0) {
            return Err(PointTransformerError::config(
                "feature_scale must be finite and positive",
            ));
        }
        Ok(())
    }
}
