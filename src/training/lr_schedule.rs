//! Learning rate scheduling
//!
//! Plateau-driven learning rate decay: when the monitored validation metric
//! stops improving for `patience` epochs, the rate is multiplied by
//! `factor` down to a floor.

use serde::{Deserialize, Serialize};

/// Learning rate scheduler type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulerType {
    /// Constant learning rate (no scheduling)
    Constant,

    /// Reduce LR when the monitored metric stops improving
    ReduceOnPlateau {
        factor: f64,
        patience: usize,
        threshold: f64,
        min_lr: f64,
    },
}

impl Default for SchedulerType {
    fn default() -> Self {
        Self::Constant
    }
}

/// Learning rate scheduler
pub struct LearningRateScheduler {
    scheduler_type: SchedulerType,
    base_lr: f64,
    current_lr: f64,
    best_metric: Option<f64>,
    patience_counter: usize,
}

impl LearningRateScheduler {
    /// Create a new scheduler
    pub fn new(scheduler_type: SchedulerType, base_lr: f64) -> Self {
        Self {
            scheduler_type,
            base_lr,
            current_lr: base_lr,
            best_metric: None,
            patience_counter: 0,
        }
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Step the scheduler with the epoch's monitored metric (lower is
    /// better; validation loss)
    pub fn step_with_metric(&mut self, metric: f64) {
        if let SchedulerType::ReduceOnPlateau {
            factor,
            patience,
            threshold,
            min_lr,
        } = &self.scheduler_type
        {
            let improved = match self.best_metric {
                Some(best) => metric < best - threshold,
                None => true,
            };

            if improved {
                self.best_metric = Some(metric);
                self.patience_counter = 0;
            } else {
                self.patience_counter += 1;

                if self.patience_counter >= *patience {
                    let new_lr = self.current_lr * factor;
                    self.current_lr = new_lr.max(*min_lr);
                    self.patience_counter = 0;
                }
            }
        }
    }

    /// Reset the scheduler
    pub fn reset(&mut self) {
        self.current_lr = self.base_lr;
        self.best_metric = None;
        self.patience_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plateau_scheduler() -> LearningRateScheduler {
        LearningRateScheduler::new(
            SchedulerType::ReduceOnPlateau {
                factor: 0.2,
                patience: 3,
                threshold: 1e-4,
                min_lr: 1e-6,
            },
            0.01,
        )
    }

    #[test]
    fn test_constant_scheduler() {
        let mut scheduler = LearningRateScheduler::new(SchedulerType::Constant, 0.001);

        scheduler.step_with_metric(0.5);
        scheduler.step_with_metric(0.9);
        assert_eq!(scheduler.get_lr(), 0.001);
    }

    #[test]
    fn test_improving_metric_keeps_lr() {
        let mut scheduler = plateau_scheduler();

        scheduler.step_with_metric(0.5);
        scheduler.step_with_metric(0.4);
        scheduler.step_with_metric(0.3);
        assert_eq!(scheduler.get_lr(), 0.01);
    }

    #[test]
    fn test_plateau_reduces_lr_after_patience() {
        let mut scheduler = plateau_scheduler();

        scheduler.step_with_metric(0.5);
        // Three non-improving epochs trigger the decay.
        scheduler.step_with_metric(0.51);
        scheduler.step_with_metric(0.52);
        assert_eq!(scheduler.get_lr(), 0.01);
        scheduler.step_with_metric(0.50);

        assert!((scheduler.get_lr() - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_lr_never_drops_below_floor() {
        let mut scheduler = plateau_scheduler();

        scheduler.step_with_metric(0.5);
        for _ in 0..40 {
            scheduler.step_with_metric(0.6);
        }

        assert!(scheduler.get_lr() >= 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut scheduler = plateau_scheduler();

        scheduler.step_with_metric(0.5);
        for _ in 0..6 {
            scheduler.step_with_metric(0.6);
        }
        assert!(scheduler.get_lr() < 0.01);

        scheduler.reset();
        assert_eq!(scheduler.get_lr(), 0.01);
    }
}
