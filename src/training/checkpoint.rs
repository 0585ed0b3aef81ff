//! Model checkpointing
//!
//! A checkpoint is a weight record plus a JSON manifest carrying the model
//! configuration and the resolved class-name/index mapping. The manifest is
//! what lets the inference service rebuild the exact training architecture
//! without re-deriving anything from a directory listing.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::cnn::LungClassifier;
use crate::model::config::ModelConfig;
use crate::utils::error::{LungScanError, Result};

/// Metadata persisted alongside the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointManifest {
    /// Class names in label-index order
    pub class_names: Vec<String>,
    /// Architecture the weights belong to
    pub model: ModelConfig,
    /// Epoch the checkpoint was taken at (0-based)
    pub epoch: usize,
    /// Validation accuracy at checkpoint time
    pub val_accuracy: f64,
    /// RFC 3339 creation timestamp
    pub timestamp: String,
}

impl CheckpointManifest {
    /// Create a manifest stamped with the current time
    pub fn new(
        class_names: Vec<String>,
        model: ModelConfig,
        epoch: usize,
        val_accuracy: f64,
    ) -> Self {
        Self {
            class_names,
            model,
            epoch,
            val_accuracy,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Save manifest to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Path of the weight record for a checkpoint stem
pub fn weights_path(stem: &Path) -> PathBuf {
    stem.with_extension("mpk")
}

/// Path of the manifest for a checkpoint stem
pub fn manifest_path(stem: &Path) -> PathBuf {
    stem.with_extension("json")
}

/// Persist model weights and manifest under the given stem
pub fn save_checkpoint<B: Backend>(
    model: &LungClassifier<B>,
    manifest: &CheckpointManifest,
    stem: &Path,
) -> Result<()> {
    if let Some(parent) = stem.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let recorder = CompactRecorder::new();
    model
        .clone()
        .save_file(stem, &recorder)
        .map_err(|e| LungScanError::Training(format!("failed to save checkpoint: {:?}", e)))?;

    manifest.save(&manifest_path(stem))?;

    info!(
        "Checkpoint saved to {:?} (epoch {}, val accuracy {:.2}%)",
        weights_path(stem),
        manifest.epoch + 1,
        manifest.val_accuracy * 100.0
    );

    Ok(())
}

/// Rebuild the persisted architecture and load its weights.
///
/// Fails with `WeightsNotFound` when either file is absent, and with
/// `ShapeMismatch` when the stored weights do not fit the architecture the
/// manifest describes (e.g. a stale class count).
pub fn load_checkpoint<B: Backend>(
    stem: &Path,
    device: &B::Device,
) -> Result<(LungClassifier<B>, CheckpointManifest)> {
    let weights = weights_path(stem);
    if !weights.exists() {
        return Err(LungScanError::WeightsNotFound(weights));
    }

    let manifest_file = manifest_path(stem);
    if !manifest_file.exists() {
        return Err(LungScanError::WeightsNotFound(manifest_file));
    }

    let manifest = CheckpointManifest::load(&manifest_file)?;

    if manifest.class_names.len() != manifest.model.num_classes {
        return Err(LungScanError::ShapeMismatch(format!(
            "manifest lists {} class names but the model was built for {} classes",
            manifest.class_names.len(),
            manifest.model.num_classes
        )));
    }

    // The full weight record supersedes any pretrained backbone reference.
    let mut config = manifest.model.clone();
    config.pretrained_backbone = None;

    let model = LungClassifier::<B>::new(&config, device)?;
    let recorder = CompactRecorder::new();
    let model = model.load_file(stem, &recorder, device).map_err(|e| {
        LungScanError::ShapeMismatch(format!(
            "stored weights at {:?} do not match the manifest architecture: {:?}",
            weights, e
        ))
    })?;

    info!("Checkpoint loaded from {:?}", weights);

    Ok((model, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn small_config(num_classes: usize) -> ModelConfig {
        ModelConfig {
            num_classes,
            input_size: 32,
            in_channels: 3,
            base_filters: 4,
            hidden_units: vec![8],
            dropout_rates: vec![0.0],
            weight_decay: 0.0,
            frozen_stages: 0,
            pretrained_backbone: None,
        }
    }

    fn class_names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class_{}", i)).collect()
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("best_model");
        let device = Default::default();

        let config = small_config(3);
        let model = LungClassifier::<TestBackend>::new(&config, &device).unwrap();
        let manifest = CheckpointManifest::new(class_names(3), config, 4, 0.91);

        save_checkpoint(&model, &manifest, &stem).unwrap();
        assert!(weights_path(&stem).exists());
        assert!(manifest_path(&stem).exists());

        let (loaded, loaded_manifest) = load_checkpoint::<TestBackend>(&stem, &device).unwrap();
        assert_eq!(loaded.num_classes(), 3);
        assert_eq!(loaded_manifest.epoch, 4);
        assert_eq!(loaded_manifest.class_names, class_names(3));
    }

    #[test]
    fn test_missing_checkpoint_is_weights_not_found() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("missing");
        let device = Default::default();

        let err = load_checkpoint::<TestBackend>(&stem, &device).unwrap_err();
        assert!(matches!(err, LungScanError::WeightsNotFound(_)));
    }

    #[test]
    fn test_inconsistent_manifest_is_shape_mismatch() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("model");
        let device = Default::default();

        let config = small_config(3);
        let model = LungClassifier::<TestBackend>::new(&config, &device).unwrap();
        // Manifest claims 4 class names for a 3-class architecture.
        let manifest = CheckpointManifest::new(class_names(4), config, 0, 0.5);
        save_checkpoint(&model, &manifest, &stem).unwrap();

        let err = load_checkpoint::<TestBackend>(&stem, &device).unwrap_err();
        assert!(matches!(err, LungScanError::ShapeMismatch(_)));
    }

    #[test]
    fn test_stale_class_count_is_shape_mismatch() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("model");
        let device = Default::default();

        // Weights trained for 2 classes, manifest rewritten for 3.
        let config = small_config(2);
        let model = LungClassifier::<TestBackend>::new(&config, &device).unwrap();
        let manifest = CheckpointManifest::new(class_names(2), config, 0, 0.5);
        save_checkpoint(&model, &manifest, &stem).unwrap();

        let stale = CheckpointManifest::new(class_names(3), small_config(3), 0, 0.5);
        stale.save(&manifest_path(&stem)).unwrap();

        let err = load_checkpoint::<TestBackend>(&stem, &device).unwrap_err();
        assert!(matches!(err, LungScanError::ShapeMismatch(_)));
    }
}
