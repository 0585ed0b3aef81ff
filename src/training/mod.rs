//! Training: epoch loop, learning-rate scheduling, checkpointing and
//! history tracking.

pub mod checkpoint;
pub mod history;
pub mod lr_schedule;
pub mod trainer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;

pub use checkpoint::CheckpointManifest;
pub use history::{EpochRecord, TrainingHistory};
pub use lr_schedule::{LearningRateScheduler, SchedulerType};
pub use trainer::{Trainer, TrainerState};

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Upper bound on training epochs
    pub epochs: usize,

    /// Batch size
    pub batch_size: usize,

    /// Initial learning rate
    pub learning_rate: f64,

    /// SGD momentum factor (fixed for the whole run)
    pub momentum: f64,

    /// Early stopping patience: epochs without a new best validation
    /// accuracy before training halts and the best weights are restored
    pub early_stopping_patience: usize,

    /// Plateau epochs on validation loss before the learning rate decays
    pub lr_patience: usize,

    /// Multiplier applied to the learning rate on plateau
    pub lr_factor: f64,

    /// Minimum improvement in validation loss that counts as progress
    pub lr_threshold: f64,

    /// Learning rate floor
    pub min_lr: f64,

    /// Random seed for shuffling and augmentation
    pub seed: u64,

    /// Training-time augmentation bounds
    pub augmentation: AugmentationConfig,

    /// Directory for best/final checkpoints
    pub checkpoint_dir: PathBuf,

    /// Optional cap on training samples per epoch, for smoke runs
    pub limit: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.01,
            momentum: 0.9,
            early_stopping_patience: 15,
            lr_patience: 3,
            lr_factor: 0.2,
            lr_threshold: 1e-4,
            min_lr: 1e-6,
            seed: 42,
            augmentation: AugmentationConfig::default(),
            checkpoint_dir: PathBuf::from("output/checkpoints"),
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.early_stopping_patience, 15);
        assert_eq!(config.lr_patience, 3);
        assert!((config.lr_factor - 0.2).abs() < 1e-9);
        assert!((config.min_lr - 1e-6).abs() < 1e-12);
    }
}
