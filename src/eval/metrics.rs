//! Metrics for Model Evaluation
//!
//! Provides aggregate metrics for the classifier:
//! - Accuracy
//! - Support-weighted precision, recall, F1 (zero division counts as 0)
//! - Matthews correlation coefficient
//! - Confusion matrix

use serde::{Deserialize, Serialize};

/// Aggregate metrics for a validation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Precision weighted by class support
    pub weighted_precision: f64,

    /// Recall weighted by class support
    pub weighted_recall: f64,

    /// F1-score weighted by class support
    pub weighted_f1: f64,

    /// Matthews correlation coefficient over all classes
    pub matthews_corrcoef: f64,

    /// Average loss, when the caller computed one
    pub loss: Option<f64>,

    /// Per-class metrics
    pub per_class: Vec<ClassMetrics>,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Compute metrics from predictions and ground truth labels
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "predictions and ground truth must have the same length"
        );

        let total_samples = predictions.len();
        if total_samples == 0 {
            return Self::default();
        }

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let correct_predictions = confusion_matrix.correct();
        let accuracy = correct_predictions as f64 / total_samples as f64;

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|class_idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, class_idx))
            .collect();

        let total_support: usize = per_class.iter().map(|m| m.support).sum();
        let weighted = |metric: fn(&ClassMetrics) -> f64| -> f64 {
            if total_support == 0 {
                return 0.0;
            }
            per_class
                .iter()
                .map(|m| metric(m) * m.support as f64)
                .sum::<f64>()
                / total_support as f64
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy,
            weighted_precision: weighted(|m| m.precision),
            weighted_recall: weighted(|m| m.recall),
            weighted_f1: weighted(|m| m.f1),
            matthews_corrcoef: confusion_matrix.matthews_corrcoef(),
            loss: None,
            per_class,
            confusion_matrix,
        }
    }

    /// Pretty print metrics
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str("╔══════════════════════════════════════════╗\n");
        output.push_str("║            Evaluation Metrics            ║\n");
        output.push_str("╠══════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║ Accuracy:            {:6.2}%             ║\n",
            self.accuracy * 100.0
        ));
        output.push_str(&format!(
            "║ Weighted Precision:  {:6.2}%             ║\n",
            self.weighted_precision * 100.0
        ));
        output.push_str(&format!(
            "║ Weighted Recall:     {:6.2}%             ║\n",
            self.weighted_recall * 100.0
        ));
        output.push_str(&format!(
            "║ Weighted F1:         {:6.2}%             ║\n",
            self.weighted_f1 * 100.0
        ));
        output.push_str(&format!(
            "║ Matthews CC:         {:+6.3}              ║\n",
            self.matthews_corrcoef
        ));
        if let Some(loss) = self.loss {
            output.push_str(&format!(
                "║ Loss:                {:6.4}              ║\n",
                loss
            ));
        }
        output.push_str(&format!(
            "║ Total Samples:       {:6}              ║\n",
            self.total_samples
        ));
        output.push_str("╚══════════════════════════════════════════╝\n");

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            total_samples: 0,
            correct_predictions: 0,
            accuracy: 0.0,
            weighted_precision: 0.0,
            weighted_recall: 0.0,
            weighted_f1: 0.0,
            matthews_corrcoef: 0.0,
            loss: None,
            per_class: Vec::new(),
            confusion_matrix: ConfusionMatrix::default(),
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// True positives
    pub true_positives: usize,

    /// False positives
    pub false_positives: usize,

    /// False negatives
    pub false_negatives: usize,

    /// Precision = TP / (TP + FP), 0 when undefined
    pub precision: f64,

    /// Recall = TP / (TP + FN), 0 when undefined
    pub recall: f64,

    /// F1 = 2 * (precision * recall) / (precision + recall), 0 when undefined
    pub f1: f64,

    /// Support = number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for one class from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;

        let precision = if true_positives + false_positives > 0 {
            true_positives as f64 / (true_positives + false_positives) as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            true_positives as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Confusion matrix for multi-class classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Matrix data (row = actual, column = predicted), row-major
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConfusionMatrix {
    /// Create an empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Build a matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Total count
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Correct predictions (diagonal sum)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Row sums (actual class counts)
    pub fn row_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|row| (0..self.num_classes).map(|col| self.get(row, col)).sum())
            .collect()
    }

    /// Column sums (predicted class counts)
    pub fn col_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|col| (0..self.num_classes).map(|row| self.get(row, col)).sum())
            .collect()
    }

    /// Multi-class Matthews correlation coefficient.
    ///
    /// `(c*s - Σ t_k p_k) / sqrt((s² - Σ p_k²)(s² - Σ t_k²))`, where c is the
    /// diagonal sum, s the total, t_k the row sums and p_k the column sums.
    /// Returns 0 when the denominator vanishes.
    pub fn matthews_corrcoef(&self) -> f64 {
        let s = self.total() as f64;
        if s == 0.0 {
            return 0.0;
        }

        let c = self.correct() as f64;
        let t: Vec<f64> = self.row_sums().iter().map(|&v| v as f64).collect();
        let p: Vec<f64> = self.col_sums().iter().map(|&v| v as f64).collect();

        let tp_dot: f64 = t.iter().zip(p.iter()).map(|(a, b)| a * b).sum();
        let p_sq: f64 = p.iter().map(|v| v * v).sum();
        let t_sq: f64 = t.iter().map(|v| v * v).sum();

        let denominator = ((s * s - p_sq) * (s * s - t_sq)).sqrt();
        if denominator == 0.0 {
            return 0.0;
        }

        (c * s - tp_dot) / denominator
    }

    /// Pretty print the matrix with optional class names
    pub fn display(&self, class_names: Option<&[String]>) -> String {
        let mut output = String::new();

        output.push_str("\nConfusion Matrix (rows=actual, cols=predicted):\n\n");

        let label = |idx: usize| -> String {
            match class_names.and_then(|names| names.get(idx)) {
                Some(name) => {
                    let truncated: String = name.chars().take(12).collect();
                    truncated
                }
                None => idx.to_string(),
            }
        };

        output.push_str(&format!("{:>14}", ""));
        for col in 0..self.num_classes {
            output.push_str(&format!("{:>14}", label(col)));
        }
        output.push('\n');

        for row in 0..self.num_classes {
            output.push_str(&format!("{:>14}", label(row)));
            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    output.push_str(&format!("       [{:>4}] ", count));
                } else if count > 0 {
                    output.push_str(&format!("        {:>4}  ", count));
                } else {
                    output.push_str("           .  ");
                }
            }
            output.push('\n');
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));

        output
    }

    /// Save the matrix to CSV
    pub fn save_csv(&self, path: &std::path::Path) -> std::io::Result<()> {
        let mut content = String::new();

        content.push_str("actual\\predicted");
        for col in 0..self.num_classes {
            content.push_str(&format!(",{}", col));
        }
        content.push('\n');

        for row in 0..self.num_classes {
            content.push_str(&format!("{}", row));
            for col in 0..self.num_classes {
                content.push_str(&format!(",{}", self.get(row, col)));
            }
            content.push('\n');
        }

        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 2];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 2];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 2), 3);
        assert_eq!(cm.total(), 10);
        assert_eq!(cm.correct(), 7);
        assert!((cm.accuracy() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_predictions() {
        let labels = vec![0, 1, 2, 0, 1, 2];
        let metrics = Metrics::from_predictions(&labels, &labels, 3);

        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert!((metrics.weighted_precision - 1.0).abs() < 1e-9);
        assert!((metrics.weighted_recall - 1.0).abs() < 1e-9);
        assert!((metrics.weighted_f1 - 1.0).abs() < 1e-9);
        assert!((metrics.matthews_corrcoef - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_metrics_respect_support() {
        // Class 0: 4 samples all correct; class 1: 1 sample, missed.
        let predictions = vec![0, 0, 0, 0, 0];
        let ground_truth = vec![0, 0, 0, 0, 1];

        let metrics = Metrics::from_predictions(&predictions, &ground_truth, 2);

        // Recall: class 0 = 1.0 (support 4), class 1 = 0.0 (support 1).
        assert!((metrics.weighted_recall - 0.8).abs() < 1e-9);
        // Class 1 has no predictions at all; its precision contributes 0
        // rather than raising a division error.
        assert!(metrics.weighted_precision < 1.0);
        assert_eq!(metrics.per_class[1].precision, 0.0);
    }

    #[test]
    fn test_mcc_zero_for_degenerate_predictions() {
        // All predictions in one class: MCC denominator vanishes.
        let predictions = vec![0, 0, 0, 0];
        let ground_truth = vec![0, 0, 1, 1];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        assert_eq!(cm.matthews_corrcoef(), 0.0);
    }

    #[test]
    fn test_mcc_known_value() {
        // Binary case: TP=2, TN=1, FP=1, FN=0.
        let predictions = vec![1, 1, 1, 0];
        let ground_truth = vec![1, 1, 0, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        // MCC = (TP*TN - FP*FN) / sqrt((TP+FP)(TP+FN)(TN+FP)(TN+FN))
        //     = (2*1 - 1*0) / sqrt(3 * 2 * 2 * 1)
        let expected = 2.0 / (12.0f64).sqrt();
        assert!((cm.matthews_corrcoef() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_class_metrics() {
        let predictions = vec![0, 0, 0, 1, 1];
        let ground_truth = vec![0, 0, 1, 1, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        let class0 = ClassMetrics::from_confusion_matrix(&cm, 0);

        assert_eq!(class0.true_positives, 2);
        assert_eq!(class0.false_positives, 1);
        assert_eq!(class0.false_negatives, 1);
        assert!((class0.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((class0.recall - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_csv() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("confusion.csv");

        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[0, 1], 2);
        cm.save_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("actual\\predicted"));
        assert_eq!(content.lines().count(), 3);
    }
}
