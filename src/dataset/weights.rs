//! Class-imbalance weighting
//!
//! Derives per-class loss weights from inverse class frequency using the
//! balanced rule `weight[c] = n_samples / (n_classes * count[c])`.

use crate::utils::error::{LungScanError, Result};

/// Compute balanced class weights from training label indices.
///
/// Every class with at least one sample receives a finite positive weight.
/// A class with zero samples fails fast instead of propagating a division
/// by zero into the loss.
pub fn compute_class_weights(labels: &[usize], num_classes: usize) -> Result<Vec<f32>> {
    if num_classes == 0 {
        return Err(LungScanError::Dataset(
            "cannot compute class weights for zero classes".to_string(),
        ));
    }

    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        if label >= num_classes {
            return Err(LungScanError::Dataset(format!(
                "label index {} out of range for {} classes",
                label, num_classes
            )));
        }
        counts[label] += 1;
    }

    if let Some(empty) = counts.iter().position(|&c| c == 0) {
        return Err(LungScanError::Dataset(format!(
            "class index {} has no training samples; cannot derive a loss weight",
            empty
        )));
    }

    let n_samples = labels.len() as f32;
    let weights = counts
        .iter()
        .map(|&count| n_samples / (num_classes as f32 * count as f32))
        .collect();

    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_distribution_gives_unit_weights() {
        let labels = vec![0, 0, 1, 1, 2, 2];
        let weights = compute_class_weights(&labels, 3).unwrap();

        for w in weights {
            assert!((w - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_minority_class_gets_larger_weight() {
        let labels = vec![0, 0, 0, 0, 1];
        let weights = compute_class_weights(&labels, 2).unwrap();

        assert!(weights[1] > weights[0]);
        assert!((weights[0] - 5.0 / (2.0 * 4.0)).abs() < 1e-6);
        assert!((weights[1] - 5.0 / (2.0 * 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_balanced_weight_identity() {
        // sum_c count[c] * weight[c] == n_samples * n_classes ... rearranged
        // from the rule, the per-class product count[c] * weight[c] is
        // n_samples / n_classes, so the total is n_samples.
        let labels = vec![0, 0, 0, 1, 1, 2, 2, 2, 2, 2];
        let num_classes = 3;
        let weights = compute_class_weights(&labels, num_classes).unwrap();

        let mut counts = vec![0usize; num_classes];
        for &l in &labels {
            counts[l] += 1;
        }

        let total: f32 = counts
            .iter()
            .zip(weights.iter())
            .map(|(&c, &w)| c as f32 * w)
            .sum();

        assert!((total - labels.len() as f32).abs() < 1e-4);
    }

    #[test]
    fn test_zero_count_class_fails_fast() {
        let labels = vec![0, 0, 2, 2];
        let err = compute_class_weights(&labels, 3).unwrap_err();

        assert!(matches!(err, LungScanError::Dataset(_)));
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_out_of_range_label_fails() {
        let labels = vec![0, 5];
        assert!(compute_class_weights(&labels, 2).is_err());
    }
}
