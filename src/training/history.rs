//! Training history
//!
//! Append-only per-epoch metric snapshots, produced by the training
//! controller and consumed by the chart renderer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Epoch index (0-based)
    pub epoch: usize,
    /// Average training loss over the epoch
    pub train_loss: f64,
    /// Training accuracy over the epoch
    pub train_accuracy: f64,
    /// Average validation loss
    pub val_loss: f64,
    /// Validation accuracy
    pub val_accuracy: f64,
    /// Learning rate used during the epoch
    pub learning_rate: f64,
    /// Unreadable training samples skipped during the epoch
    pub skipped_samples: usize,
}

/// Ordered sequence of per-epoch records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    records: Vec<EpochRecord>,
}

impl TrainingHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for the next epoch
    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    /// All records in epoch order
    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    /// Number of recorded epochs
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the history is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with the highest validation accuracy
    pub fn best_epoch(&self) -> Option<&EpochRecord> {
        self.records.iter().max_by(|a, b| {
            a.val_accuracy
                .partial_cmp(&b.val_accuracy)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Save history to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load history from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, val_accuracy: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 1.0 / (epoch + 1) as f64,
            train_accuracy: 0.5,
            val_loss: 1.0,
            val_accuracy,
            learning_rate: 0.01,
            skipped_samples: 0,
        }
    }

    #[test]
    fn test_history_is_append_only_ordered() {
        let mut history = TrainingHistory::new();
        history.push(record(0, 0.5));
        history.push(record(1, 0.7));
        history.push(record(2, 0.6));

        assert_eq!(history.len(), 3);
        let epochs: Vec<usize> = history.records().iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![0, 1, 2]);
    }

    #[test]
    fn test_best_epoch() {
        let mut history = TrainingHistory::new();
        assert!(history.best_epoch().is_none());

        history.push(record(0, 0.5));
        history.push(record(1, 0.8));
        history.push(record(2, 0.6));

        assert_eq!(history.best_epoch().unwrap().epoch, 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("history.json");

        let mut history = TrainingHistory::new();
        history.push(record(0, 0.5));
        history.push(record(1, 0.9));
        history.save(&path).unwrap();

        let loaded = TrainingHistory::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.best_epoch().unwrap().epoch, 1);
    }
}
