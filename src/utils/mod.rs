//! Utility modules: error types and logging.

pub mod error;
pub mod logging;

pub use error::{LungScanError, Result};
