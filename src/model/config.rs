//! Model Configuration
//!
//! Defines the externally configurable architecture surface: head widths,
//! dropout rates, regularization strength and the frozen/unfrozen split
//! point of the backbone. These are the primary levers for re-tuning, so
//! none of them is hard-coded in the model itself.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::error::{LungScanError, Result};

/// Configuration for the CNN architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input image size (width and height, assumed square)
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    pub in_channels: usize,

    /// Base number of convolutional filters; doubles per stage
    pub base_filters: usize,

    /// Widths of the dense head layers
    pub hidden_units: Vec<usize>,

    /// Dropout rate per dense head layer (same length as `hidden_units`)
    pub dropout_rates: Vec<f64>,

    /// L2 regularization coefficient, applied as optimizer weight decay
    pub weight_decay: f64,

    /// Number of leading backbone stages frozen during training.
    ///
    /// Named explicitly instead of slicing into backbone internals, since
    /// stage counts vary across architecture revisions.
    pub frozen_stages: usize,

    /// Optional Burn record with pretrained backbone weights
    pub pretrained_backbone: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes: crate::NUM_CLASSES,
            input_size: crate::IMAGE_SIZE,
            in_channels: 3,
            base_filters: 32,
            hidden_units: vec![512, 256],
            dropout_rates: vec![0.5, 0.3],
            weight_decay: 1e-4,
            frozen_stages: 3,
            pretrained_backbone: None,
        }
    }
}

impl ModelConfig {
    /// Number of convolutional stages in the backbone
    pub const NUM_STAGES: usize = 4;

    /// Create a configuration with custom class count and input size
    pub fn new(num_classes: usize, input_size: usize) -> Self {
        Self {
            num_classes,
            input_size,
            ..Default::default()
        }
    }

    /// Feature width produced by the backbone (after global pooling)
    pub fn feature_dim(&self) -> usize {
        self.base_filters << (Self::NUM_STAGES - 1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(LungScanError::Config(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.input_size == 0 || self.input_size % 16 != 0 {
            return Err(LungScanError::Config(
                "input_size must be a positive multiple of 16".to_string(),
            ));
        }

        if self.base_filters == 0 {
            return Err(LungScanError::Config(
                "base_filters must be greater than 0".to_string(),
            ));
        }

        if self.hidden_units.is_empty() {
            return Err(LungScanError::Config(
                "hidden_units must name at least one dense layer".to_string(),
            ));
        }

        if self.hidden_units.len() != self.dropout_rates.len() {
            return Err(LungScanError::Config(format!(
                "hidden_units ({}) and dropout_rates ({}) must have the same length",
                self.hidden_units.len(),
                self.dropout_rates.len()
            )));
        }

        if self.dropout_rates.iter().any(|&r| !(0.0..1.0).contains(&r)) {
            return Err(LungScanError::Config(
                "dropout rates must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if self.frozen_stages > Self::NUM_STAGES {
            return Err(LungScanError::Config(format!(
                "frozen_stages must be at most {}",
                Self::NUM_STAGES
            )));
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
