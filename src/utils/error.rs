//! Error Handling Module
//!
//! Defines custom error types for the lungscan library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for lungscan operations
#[derive(Error, Debug)]
pub enum LungScanError {
    /// Error loading or decoding an image file
    #[error("failed to load image '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset layout or contents
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Inference requested but no trained weights exist
    #[error("weights not found at '{0}' (train a model first or pass a valid checkpoint)")]
    WeightsNotFound(PathBuf),

    /// Persisted weights do not match the freshly built architecture
    #[error("architecture mismatch: {0}")]
    ShapeMismatch(String),

    /// Error during training
    #[error("training error: {0}")]
    Training(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LungScanError {
    fn from(err: serde_json::Error) -> Self {
        LungScanError::Serialization(err.to_string())
    }
}

/// Convenience Result type for lungscan operations
pub type Result<T> = std::result::Result<T, LungScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LungScanError::Dataset("missing directory".to_string());
        assert_eq!(err.to_string(), "dataset error: missing directory");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/path/to/scan.jpg");
        let err = LungScanError::ImageLoad(path, "file not found".to_string());
        assert!(err.to_string().contains("scan.jpg"));
    }

    #[test]
    fn test_weights_not_found_display() {
        let err = LungScanError::WeightsNotFound(PathBuf::from("output/best_model.mpk"));
        assert!(err.to_string().contains("best_model.mpk"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LungScanError = io_err.into();
        assert!(matches!(err, LungScanError::Io(_)));
    }
}
