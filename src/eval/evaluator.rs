//! Model Evaluator
//!
//! Runs a trained model over the validation set in deterministic order and
//! produces aggregate metrics, a confusion matrix and a misclassification
//! report with example file references. The evaluator is strictly read-only
//! over the model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::{backend::Backend, ElementConversion};
use tracing::info;

use super::metrics::Metrics;
use crate::dataset::batcher::{XrayBatcher, XrayTensorDataset};
use crate::model::cnn::LungClassifier;
use crate::utils::error::Result;

/// Maximum example files retained per misclassified (true, predicted) pair
const MAX_EXAMPLES_PER_PAIR: usize = 5;

/// Prediction for a single validation sample
#[derive(Debug, Clone)]
pub struct SamplePrediction {
    /// Source image path
    pub path: PathBuf,
    /// True class index
    pub true_label: usize,
    /// Predicted class index
    pub predicted: usize,
    /// Probability of the predicted class
    pub confidence: f32,
}

/// Misclassified examples for one (true, predicted) class pair
#[derive(Debug, Clone)]
pub struct MisclassifiedGroup {
    /// True class name
    pub true_class: String,
    /// Predicted class name
    pub predicted_class: String,
    /// Total occurrences of this confusion
    pub count: usize,
    /// Up to five example files for inspection
    pub examples: Vec<PathBuf>,
}

/// Result of a full evaluation pass
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// Aggregate metrics and confusion matrix
    pub metrics: Metrics,
    /// Per-sample predictions, in validation order
    pub predictions: Vec<SamplePrediction>,
    /// Misclassification groups, ordered by class pair
    pub misclassified: Vec<MisclassifiedGroup>,
    /// Class names in label-index order
    pub class_names: Vec<String>,
}

impl EvaluationReport {
    /// Render the console report
    pub fn render(&self) -> String {
        let mut output = String::new();

        output.push_str(&self.metrics.display());
        output.push_str(&self.metrics.confusion_matrix.display(Some(&self.class_names)));

        if self.misclassified.is_empty() {
            output.push_str("\nNo misclassified samples.\n");
        } else {
            output.push_str("\nMisclassified examples:\n");
            for group in &self.misclassified {
                output.push_str(&format!(
                    "\n  {} -> {} ({} samples):\n",
                    group.true_class, group.predicted_class, group.count
                ));
                for example in &group.examples {
                    output.push_str(&format!("    {}\n", example.display()));
                }
            }
        }

        output
    }
}

/// Read-only evaluator over a trained model
pub struct Evaluator<'a, B: Backend> {
    model: &'a LungClassifier<B>,
    class_names: Vec<String>,
    batch_size: usize,
}

impl<'a, B: Backend> Evaluator<'a, B> {
    /// Create an evaluator
    pub fn new(model: &'a LungClassifier<B>, class_names: Vec<String>, batch_size: usize) -> Self {
        Self {
            model,
            class_names,
            batch_size,
        }
    }

    /// Evaluate the model over a dataset in its stored (deterministic) order
    pub fn evaluate(
        &self,
        dataset: &XrayTensorDataset,
        device: &B::Device,
    ) -> Result<EvaluationReport> {
        let num_classes = self.class_names.len();
        let batcher = XrayBatcher::<B>::new(dataset.preprocessor().target_size() as usize);

        let labels = dataset.labels();
        let len = labels.len();
        info!("Evaluating {} samples across {} classes", len, num_classes);

        let mut predictions = Vec::with_capacity(len);
        let mut predicted_labels = Vec::with_capacity(len);
        let mut true_labels = Vec::with_capacity(len);
        let mut total_loss = 0.0;
        let mut batches_seen = 0usize;

        for start in (0..len).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(len);

            let mut items = Vec::with_capacity(end - start);
            for index in start..end {
                items.push(dataset.load_item(index)?);
            }

            let batch = batcher.batch(items, device);

            let logits = self.model.forward(batch.images.clone());

            let loss = CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits.clone(), batch.targets.clone());
            let loss_value: f64 = loss.into_scalar().elem();
            total_loss += loss_value;
            batches_seen += 1;

            let probs = burn::tensor::activation::softmax(logits, 1);
            let probs_vec: Vec<f32> = probs.into_data().to_vec().unwrap();

            for (offset, row) in probs_vec.chunks(num_classes).enumerate() {
                let index = start + offset;
                let (predicted, &confidence) = row
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
                    .unwrap_or((0, &0.0));

                let true_label = labels[index];
                predicted_labels.push(predicted);
                true_labels.push(true_label);
                predictions.push(SamplePrediction {
                    path: dataset
                        .path(index)
                        .cloned()
                        .unwrap_or_default(),
                    true_label,
                    predicted,
                    confidence,
                });
            }
        }

        let mut metrics = Metrics::from_predictions(&predicted_labels, &true_labels, num_classes);
        metrics.loss = Some(total_loss / batches_seen.max(1) as f64);

        let misclassified = self.collect_misclassified(&predictions);

        info!(
            "Evaluation: accuracy = {:.2}%, weighted F1 = {:.4}, MCC = {:.4}",
            metrics.accuracy * 100.0,
            metrics.weighted_f1,
            metrics.matthews_corrcoef
        );

        Ok(EvaluationReport {
            metrics,
            predictions,
            misclassified,
            class_names: self.class_names.clone(),
        })
    }

    /// Group misclassified samples by (true, predicted) pair, keeping up to
    /// five example paths per pair
    fn collect_misclassified(&self, predictions: &[SamplePrediction]) -> Vec<MisclassifiedGroup> {
        let mut groups: BTreeMap<(usize, usize), (usize, Vec<PathBuf>)> = BTreeMap::new();

        for prediction in predictions {
            if prediction.true_label == prediction.predicted {
                continue;
            }
            let entry = groups
                .entry((prediction.true_label, prediction.predicted))
                .or_default();
            entry.0 += 1;
            if entry.1.len() < MAX_EXAMPLES_PER_PAIR {
                entry.1.push(prediction.path.clone());
            }
        }

        groups
            .into_iter()
            .map(|((true_label, predicted), (count, examples))| MisclassifiedGroup {
                true_class: self.class_name(true_label),
                predicted_class: self.class_name(predicted),
                count,
                examples,
            })
            .collect()
    }

    fn class_name(&self, index: usize) -> String {
        self.class_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }
}
