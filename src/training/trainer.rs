//! Training Controller
//!
//! Drives the optimization loop: SGD with fixed momentum over class-weighted
//! cross-entropy, one augmented training pass and one deterministic
//! validation pass per epoch.
//!
//! Three plateau monitors run at every epoch boundary, in fixed order:
//! best-accuracy checkpointing, learning-rate decay on validation loss, and
//! early stopping on validation accuracy. The ordering matters: an early
//! stop restores weights from the best checkpoint, which must already
//! reflect the current epoch when it is the new best.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig,
    },
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion},
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::checkpoint::{load_checkpoint, save_checkpoint, weights_path, CheckpointManifest};
use super::history::{EpochRecord, TrainingHistory};
use super::lr_schedule::{LearningRateScheduler, SchedulerType};
use super::TrainingConfig;
use crate::dataset::augmentation::Augmenter;
use crate::dataset::batcher::{XrayBatcher, XrayTensorDataset};
use crate::dataset::weights::compute_class_weights;
use crate::model::cnn::LungClassifier;
use crate::model::config::ModelConfig;
use crate::utils::error::{LungScanError, Result};
use crate::utils::logging::TrainingLogger;
use burn::data::dataloader::batcher::Batcher;

/// Monitoring state shared by the checkpoint and early-stop policies
#[derive(Debug, Clone)]
pub struct TrainerState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Best validation accuracy seen so far
    pub best_val_accuracy: f64,
    /// Epochs since the last new best validation accuracy
    pub epochs_without_improvement: usize,
    /// Per-epoch metric history
    pub history: TrainingHistory,
}

impl Default for TrainerState {
    fn default() -> Self {
        Self {
            epoch: 0,
            best_val_accuracy: 0.0,
            epochs_without_improvement: 0,
            history: TrainingHistory::new(),
        }
    }
}

impl TrainerState {
    /// Record a validation accuracy; returns true when it is a new best
    pub fn update_best(&mut self, val_accuracy: f64) -> bool {
        if val_accuracy > self.best_val_accuracy {
            self.best_val_accuracy = val_accuracy;
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }

    /// Check the early stopping criterion against a patience value
    pub fn should_early_stop(&self, patience: usize) -> bool {
        self.epochs_without_improvement >= patience
    }
}

/// Trainer for the lung classifier
pub struct Trainer<B: AutodiffBackend> {
    model: LungClassifier<B>,
    model_config: ModelConfig,
    config: TrainingConfig,
    state: TrainerState,
    class_names: Vec<String>,
    device: B::Device,
    abort: Option<Arc<AtomicBool>>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Build a fresh model and trainer
    pub fn new(
        model_config: ModelConfig,
        config: TrainingConfig,
        class_names: Vec<String>,
        device: B::Device,
    ) -> Result<Self> {
        if class_names.len() != model_config.num_classes {
            return Err(LungScanError::Config(format!(
                "{} class names given for a {}-class model",
                class_names.len(),
                model_config.num_classes
            )));
        }

        let model = LungClassifier::new(&model_config, &device)?;

        Ok(Self {
            model,
            model_config,
            config,
            state: TrainerState::default(),
            class_names,
            device,
            abort: None,
        })
    }

    /// Install a cooperative abort flag, checked at epoch boundaries and
    /// inside the batch loop
    pub fn set_abort_flag(&mut self, flag: Arc<AtomicBool>) {
        self.abort = Some(flag);
    }

    fn aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// The model being trained
    pub fn model(&self) -> &LungClassifier<B> {
        &self.model
    }

    /// Current monitoring state
    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    /// Checkpoint stem for the best-validation weights
    pub fn best_checkpoint_stem(&self) -> PathBuf {
        self.config.checkpoint_dir.join("best_model")
    }

    /// Checkpoint stem for the end-of-training weights
    pub fn final_checkpoint_stem(&self) -> PathBuf {
        self.config.checkpoint_dir.join("final_model")
    }

    /// Run the full training loop and return the per-epoch history.
    ///
    /// Terminal conditions: the epoch bound, an early stop (best weights
    /// restored), or an external abort.
    pub fn fit(
        &mut self,
        train: &XrayTensorDataset,
        val: &XrayTensorDataset,
    ) -> Result<TrainingHistory> {
        let train_labels = train.labels();
        let class_weights = compute_class_weights(&train_labels, self.model_config.num_classes)?;

        info!(
            "Training on {} samples, validating on {} ({} classes)",
            train_labels.len(),
            val.labels().len(),
            self.model_config.num_classes
        );

        let mut augmenter = Augmenter::new(self.config.augmentation.clone(), self.config.seed);
        let batcher = XrayBatcher::<B>::new(self.model_config.input_size);
        let inner_batcher = XrayBatcher::<B::InnerBackend>::new(self.model_config.input_size);

        let mut optimizer = SgdConfig::new()
            .with_momentum(Some(
                MomentumConfig::new()
                    .with_momentum(self.config.momentum as _)
                    .with_dampening(0.0),
            ))
            .with_weight_decay(Some(WeightDecayConfig::new(
                self.model_config.weight_decay as _,
            )))
            .init();

        let mut scheduler = LearningRateScheduler::new(
            SchedulerType::ReduceOnPlateau {
                factor: self.config.lr_factor,
                patience: self.config.lr_patience,
                threshold: self.config.lr_threshold,
                min_lr: self.config.min_lr,
            },
            self.config.learning_rate,
        );

        let mut epoch_rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut logger = TrainingLogger::new(self.config.epochs);

        for epoch in 0..self.config.epochs {
            self.state.epoch = epoch;

            if self.aborted() {
                warn!("Abort requested; stopping before epoch {}", epoch + 1);
                self.restore_best()?;
                break;
            }

            logger.start_epoch(epoch);

            let lr = scheduler.get_lr();
            let (train_loss, train_accuracy, skipped) = self.train_epoch(
                train,
                &mut augmenter,
                &batcher,
                &mut optimizer,
                lr,
                &class_weights,
                &mut epoch_rng,
            )?;

            if self.aborted() {
                warn!("Abort requested during epoch {}; stopping", epoch + 1);
                self.restore_best()?;
                break;
            }

            let (val_loss, val_accuracy) = self.validate(val, &inner_batcher)?;

            self.state.history.push(EpochRecord {
                epoch,
                train_loss,
                train_accuracy,
                val_loss,
                val_accuracy,
                learning_rate: lr,
                skipped_samples: skipped,
            });

            logger.end_epoch(train_loss, val_loss, val_accuracy, lr);
            if skipped > 0 {
                warn!(
                    "Epoch {}: skipped {} unreadable training samples",
                    epoch + 1,
                    skipped
                );
            }

            // Monitors, in fixed order: checkpoint, LR decay, early stop.
            if self.state.update_best(val_accuracy) {
                let manifest = CheckpointManifest::new(
                    self.class_names.clone(),
                    self.model_config.clone(),
                    epoch,
                    val_accuracy,
                );
                save_checkpoint(&self.model, &manifest, &self.best_checkpoint_stem())?;
                logger.log_new_best(val_accuracy);
            }

            scheduler.step_with_metric(val_loss);

            if self.state.should_early_stop(self.config.early_stopping_patience) {
                logger.log_early_stop(self.config.early_stopping_patience);
                self.restore_best()?;
                break;
            }
        }

        let manifest = CheckpointManifest::new(
            self.class_names.clone(),
            self.model_config.clone(),
            self.state.epoch,
            self.state.best_val_accuracy,
        );
        save_checkpoint(&self.model, &manifest, &self.final_checkpoint_stem())?;

        logger.log_complete(self.state.best_val_accuracy);

        Ok(self.state.history.clone())
    }

    /// One full pass over shuffled, augmented training batches.
    ///
    /// Returns (average loss, accuracy, skipped sample count). Unreadable
    /// samples are skipped and counted; everything else propagates.
    #[allow(clippy::too_many_arguments)]
    fn train_epoch(
        &mut self,
        train: &XrayTensorDataset,
        augmenter: &mut Augmenter,
        batcher: &XrayBatcher<B>,
        optimizer: &mut impl Optimizer<LungClassifier<B>, B>,
        lr: f64,
        class_weights: &[f32],
        epoch_rng: &mut ChaCha8Rng,
    ) -> Result<(f64, f64, usize)> {
        let mut indices: Vec<usize> = (0..train.labels().len()).collect();
        indices.shuffle(epoch_rng);
        if let Some(limit) = self.config.limit {
            indices.truncate(limit);
        }

        let batch_size = self.config.batch_size;
        let num_batches = indices.len().div_ceil(batch_size);

        let mut total_loss = 0.0;
        let mut batches_seen = 0usize;
        let mut correct = 0usize;
        let mut total = 0usize;
        let mut skipped = 0usize;

        for batch_idx in 0..num_batches {
            if self.aborted() {
                break;
            }

            let start = batch_idx * batch_size;
            let end = (start + batch_size).min(indices.len());

            let mut items = Vec::with_capacity(end - start);
            for &sample_idx in &indices[start..end] {
                match train.load_augmented(sample_idx, augmenter) {
                    Ok(item) => items.push(item),
                    Err(LungScanError::ImageLoad(path, reason)) => {
                        warn!("Skipping unreadable sample {:?}: {}", path, reason);
                        skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            if items.is_empty() {
                continue;
            }

            let batch = batcher.batch(items, &self.device);

            let output = self.model.forward(batch.images.clone());
            let loss = CrossEntropyLossConfig::new()
                .with_weights(Some(class_weights.to_vec()))
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            total_loss += loss_value;
            batches_seen += 1;

            let this_batch = batch.targets.dims()[0];
            let predictions = output.argmax(1);
            let batch_correct: i64 = predictions
                .equal(batch.targets.clone().reshape([this_batch, 1]))
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            total += this_batch;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = optimizer.step(lr, self.model.clone(), grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx == num_batches - 1 {
                debug!(
                    "  Batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    100.0 * correct as f64 / total.max(1) as f64
                );
            }
        }

        let avg_loss = total_loss / batches_seen.max(1) as f64;
        let accuracy = correct as f64 / total.max(1) as f64;

        Ok((avg_loss, accuracy, skipped))
    }

    /// One deterministic pass over the validation set with unweighted loss.
    ///
    /// Runs on the inner (non-autodiff) backend; validation read errors
    /// propagate instead of being skipped.
    fn validate(
        &self,
        val: &XrayTensorDataset,
        batcher: &XrayBatcher<B::InnerBackend>,
    ) -> Result<(f64, f64)> {
        let model = self.model.valid();
        let device = <B::InnerBackend as Backend>::Device::default();

        let len = val.labels().len();
        let batch_size = self.config.batch_size;

        let mut total_loss = 0.0;
        let mut batches_seen = 0usize;
        let mut correct = 0usize;
        let mut total = 0usize;

        for start in (0..len).step_by(batch_size) {
            let end = (start + batch_size).min(len);

            let mut items = Vec::with_capacity(end - start);
            for index in start..end {
                items.push(val.load_item(index)?);
            }

            let batch = batcher.batch(items, &device);

            let output = model.forward(batch.images.clone());
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.into_scalar().elem();
            total_loss += loss_value;
            batches_seen += 1;

            let this_batch = end - start;
            let predictions = output.argmax(1);
            let batch_correct: i64 = predictions
                .equal(batch.targets.reshape([this_batch, 1]))
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            total += this_batch;
        }

        let avg_loss = total_loss / batches_seen.max(1) as f64;
        let accuracy = correct as f64 / total.max(1) as f64;

        Ok((avg_loss, accuracy))
    }

    /// Reload the best checkpoint into the live model, if one exists
    fn restore_best(&mut self) -> Result<()> {
        let stem = self.best_checkpoint_stem();
        if !weights_path(&stem).exists() {
            return Ok(());
        }

        let (model, manifest) = load_checkpoint::<B>(&stem, &self.device)?;
        self.model = model;
        info!(
            "Restored best weights from epoch {} ({:.2}% validation accuracy)",
            manifest.epoch + 1,
            manifest.val_accuracy * 100.0
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainer_state_default() {
        let state = TrainerState::default();
        assert_eq!(state.epoch, 0);
        assert_eq!(state.best_val_accuracy, 0.0);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_update_best_tracks_improvement() {
        let mut state = TrainerState::default();

        assert!(state.update_best(0.5));
        assert_eq!(state.epochs_without_improvement, 0);

        assert!(!state.update_best(0.4));
        assert_eq!(state.epochs_without_improvement, 1);

        assert!(state.update_best(0.6));
        assert_eq!(state.epochs_without_improvement, 0);
    }

    #[test]
    fn test_early_stop_halts_after_plateau() {
        // A metric sequence that plateaus for exactly P + 1 epochs must halt
        // at epoch P + 1, per the early-stop contract.
        let patience = 2;
        let accuracies = [0.8, 0.8, 0.8, 0.9];
        let mut state = TrainerState::default();

        let mut halted_at = None;
        for (epoch, &acc) in accuracies.iter().enumerate() {
            state.epoch = epoch;
            state.update_best(acc);
            if state.should_early_stop(patience) {
                halted_at = Some(epoch);
                break;
            }
        }

        // Epoch 0 sets the best; epochs 1 and 2 plateau; the 0.9 at epoch 3
        // is never reached.
        assert_eq!(halted_at, Some(patience));
    }

    #[test]
    fn test_no_early_stop_while_improving() {
        let mut state = TrainerState::default();

        for (epoch, acc) in [0.5, 0.6, 0.7, 0.8].iter().enumerate() {
            state.epoch = epoch;
            state.update_best(*acc);
            assert!(!state.should_early_stop(2));
        }
    }
}
