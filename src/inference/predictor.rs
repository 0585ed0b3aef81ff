//! Inference Predictor
//!
//! Rebuilds the trained architecture from a checkpoint manifest, loads the
//! persisted weights and serves single-image predictions. Missing weights
//! are a hard error: predictions from random weights must never be returned
//! as if trained.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::tensor::{backend::Backend, Tensor};
use tracing::info;

use crate::dataset::preprocess::Preprocessor;
use crate::model::cnn::LungClassifier;
use crate::training::checkpoint::{load_checkpoint, CheckpointManifest};
use crate::utils::error::Result;

/// Number of runner-up predictions reported alongside the top class
const TOP_K: usize = 3;

/// Result of a single prediction
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Path of the classified image
    pub image_path: PathBuf,

    /// Predicted class index
    pub class_index: usize,

    /// Predicted class name
    pub class_name: String,

    /// Confidence for the predicted class, in percent
    pub confidence_percent: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// Top-k (class name, probability) pairs, best first
    pub top_k: Vec<(String, f32)>,

    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl Prediction {
    /// Pretty print the prediction
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Image: {}\n", self.image_path.display()));
        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.class_name, self.class_index
        ));
        output.push_str(&format!("Confidence: {:.1}%\n", self.confidence_percent));
        output.push_str(&format!("Time: {:.2} ms\n", self.inference_time_ms));

        output.push_str("Top predictions:\n");
        for (rank, (name, prob)) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} ({:.1}%)\n",
                rank + 1,
                name,
                prob * 100.0
            ));
        }

        output
    }
}

/// Checkpoint-backed predictor
#[derive(Debug)]
pub struct Predictor<B: Backend> {
    model: LungClassifier<B>,
    manifest: CheckpointManifest,
    preprocessor: Preprocessor,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Load a predictor from a checkpoint stem.
    ///
    /// Fails with `WeightsNotFound` if the checkpoint does not exist and
    /// with `ShapeMismatch` if the stored weights do not fit the manifest
    /// architecture.
    pub fn load(checkpoint_stem: &Path, device: B::Device) -> Result<Self> {
        let (model, manifest) = load_checkpoint::<B>(checkpoint_stem, &device)?;
        let preprocessor = Preprocessor::new(manifest.model.input_size as u32);

        info!(
            "Predictor ready: {} classes, input {}x{}",
            manifest.class_names.len(),
            manifest.model.input_size,
            manifest.model.input_size
        );

        Ok(Self {
            model,
            manifest,
            preprocessor,
            device,
        })
    }

    /// Class names in label-index order, as persisted at training time
    pub fn class_names(&self) -> &[String] {
        &self.manifest.class_names
    }

    /// The checkpoint manifest backing this predictor
    pub fn manifest(&self) -> &CheckpointManifest {
        &self.manifest
    }

    /// Classify one image file
    pub fn predict(&self, path: &Path) -> Result<Prediction> {
        let data = self.preprocessor.load(path)?;
        let size = self.manifest.model.input_size;

        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device)
            .reshape([1, 3, size, size]);

        let start = Instant::now();
        let probs = self.model.forward_softmax(tensor);
        let inference_time = start.elapsed();

        let probabilities: Vec<f32> = probs.into_data().to_vec().unwrap();

        let (class_index, &confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap_or((0, &0.0));

        let mut indexed: Vec<(usize, f32)> = probabilities
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, p))
            .collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let top_k = indexed
            .iter()
            .take(TOP_K)
            .map(|&(idx, prob)| (self.class_name(idx), prob))
            .collect();

        Ok(Prediction {
            image_path: path.to_path_buf(),
            class_index,
            class_name: self.class_name(class_index),
            confidence_percent: confidence * 100.0,
            probabilities,
            top_k,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// Classify several image files
    pub fn predict_batch(&self, paths: &[PathBuf]) -> Result<Vec<Prediction>> {
        paths.iter().map(|path| self.predict(path)).collect()
    }

    fn class_name(&self, index: usize) -> String {
        self.manifest
            .class_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::ModelConfig;
    use crate::training::checkpoint::{save_checkpoint, CheckpointManifest};
    use crate::utils::error::LungScanError;
    use burn::backend::NdArray;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn small_config() -> ModelConfig {
        ModelConfig {
            num_classes: 2,
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

    #[test]
    fn test_missing_checkpoint_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("untrained");

        let err = Predictor::<TestBackend>::load(&stem, Default::default()).unwrap_err();
        assert!(matches!(err, LungScanError::WeightsNotFound(_)));
    }

    #[test]
    fn test_predict_uses_persisted_class_names() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("model");
        let device = Default::default();

        let config = small_config();
        let model = LungClassifier::<TestBackend>::new(&config, &device).unwrap();
        let manifest = CheckpointManifest::new(
            vec!["bacterial".to_string(), "viral".to_string()],
            config,
            0,
            0.5,
        );
        save_checkpoint(&model, &manifest, &stem).unwrap();

        let image_path = tmp.path().join("scan.png");
        let img: image::RgbImage = ImageBuffer::from_pixel(40, 40, Rgb([120u8, 80, 60]));
        img.save(&image_path).unwrap();

        let predictor = Predictor::<TestBackend>::load(&stem, device).unwrap();
        assert_eq!(predictor.class_names(), ["bacterial", "viral"]);

        let prediction = predictor.predict(&image_path).unwrap();

        assert!(prediction.class_index < 2);
        assert_eq!(prediction.probabilities.len(), 2);
        assert!(prediction.confidence_percent >= 0.0 && prediction.confidence_percent <= 100.0);
        assert_eq!(prediction.top_k.len(), 2);
        assert!(["bacterial", "viral"].contains(&prediction.class_name.as_str()));

        let prob_sum: f32 = prediction.probabilities.iter().sum();
        assert!((prob_sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_unreadable_image_is_image_load_error() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("model");
        let device = Default::default();

        let config = small_config();
        let model = LungClassifier::<TestBackend>::new(&config, &device).unwrap();
        let manifest = CheckpointManifest::new(
            vec!["bacterial".to_string(), "viral".to_string()],
            config,
            0,
            0.5,
        );
        save_checkpoint(&model, &manifest, &stem).unwrap();

        let predictor = Predictor::<TestBackend>::load(&stem, device).unwrap();
        let err = predictor.predict(Path::new("/nonexistent/scan.png")).unwrap_err();
        assert!(matches!(err, LungScanError::ImageLoad(_, _)));
    }
}
