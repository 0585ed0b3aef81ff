//! Inference: checkpoint-backed prediction on single images.

pub mod predictor;

pub use predictor::{Prediction, Predictor};
