//! Data loading and preprocessing for segmentation.

mod point_cloud;
mod preprocess;

pub use point_cloud::SegmentationCloud;
pub use preprocess::{crop_to_ceiling, projection_indices, recenter, Preprocessor, ProcessedCloud, Split};
