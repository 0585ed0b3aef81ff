//! Evaluation: metrics, confusion matrix, misclassification reporting and
//! chart rendering.

pub mod charts;
pub mod evaluator;
pub mod metrics;

pub use evaluator::{EvaluationReport, Evaluator, MisclassifiedGroup, SamplePrediction};
pub use metrics::{ClassMetrics, ConfusionMatrix, Metrics};
