//! # lungscan
//!
//! A Rust library for lung condition classification from chest X-ray images,
//! built on the Burn deep-learning framework.
//!
//! ## Features
//!
//! - **Transfer-learning CNN** with a partially frozen convolutional backbone
//!   and a configurable dense classification head
//! - **Aspect-preserving preprocessing** shared by training, validation and
//!   inference so no path can drift out of sync
//! - **Seeded data augmentation** (affine + photometric) for training only
//! - **Class-imbalance aware** training with balanced loss weights
//! - **Plateau-driven training control**: best-checkpointing, learning-rate
//!   decay and early stopping with best-weight restoration
//!
//! ## Modules
//!
//! - `dataset`: directory loading, preprocessing, augmentation, batching and
//!   class weighting
//! - `model`: CNN architecture, defined once and shared by training and
//!   inference
//! - `training`: training loop, LR scheduling, checkpointing, history
//! - `eval`: metrics, confusion matrix, misclassification report, SVG charts
//! - `inference`: checkpoint-backed predictor
//! - `utils`: errors and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lungscan::dataset::LungXrayDataset;
//! use lungscan::model::ModelConfig;
//!
//! let dataset = LungXrayDataset::new("data/train")?;
//! let config = ModelConfig::default();
//! // ... training and inference
//! ```

pub mod backend;
pub mod dataset;
pub mod eval;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::augmentation::{AugmentationConfig, Augmenter};
pub use dataset::batcher::{XrayBatch, XrayBatcher, XrayItem, XrayTensorDataset};
pub use dataset::loader::LungXrayDataset;
pub use dataset::preprocess::Preprocessor;
pub use dataset::weights::compute_class_weights;
pub use eval::evaluator::{EvaluationReport, Evaluator};
pub use eval::metrics::{ConfusionMatrix, Metrics};
pub use inference::predictor::{Prediction, Predictor};
pub use model::cnn::LungClassifier;
pub use model::config::ModelConfig;
pub use training::checkpoint::CheckpointManifest;
pub use training::history::TrainingHistory;
pub use training::trainer::Trainer;
pub use training::TrainingConfig;
pub use utils::error::{LungScanError, Result};

/// Lung condition classes, in label-index order
pub const CLASS_NAMES: [&str; 5] = [
    "bacterial",
    "corona virus",
    "normal",
    "tuberculosis",
    "viral",
];

/// Number of lung condition classes
pub const NUM_CLASSES: usize = 5;

/// Default input image size (square)
pub const IMAGE_SIZE: usize = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
