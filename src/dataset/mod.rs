//! Dataset handling: directory loading, preprocessing, augmentation,
//! batching and class weighting.

pub mod augmentation;
pub mod batcher;
pub mod loader;
pub mod preprocess;
pub mod weights;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use batcher::{XrayBatch, XrayBatcher, XrayItem, XrayTensorDataset};
pub use loader::{DatasetStats, ImageSample, LungXrayDataset};
pub use preprocess::Preprocessor;
pub use weights::compute_class_weights;
