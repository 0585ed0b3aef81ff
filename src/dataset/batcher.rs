//! Burn Dataset Integration
//!
//! Implements Burn's Dataset trait and Batcher for loading and batching
//! preprocessed X-ray samples during training and evaluation.

use std::marker::PhantomData;
use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::augmentation::Augmenter;
use super::loader::LungXrayDataset;
use super::preprocess::Preprocessor;
use crate::utils::error::Result;

/// A single preprocessed sample ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XrayItem {
    /// Image data as flattened CHW float array [3 * H * W], normalized
    pub image: Vec<f32>,
    /// Class label index
    pub label: usize,
    /// Image path (for evaluation reports and debugging)
    pub path: String,
}

/// Lazily loading dataset over (path, label) pairs.
///
/// `Dataset::get` and `load_item` preserve the stored sample order, which is
/// what makes validation passes deterministic; training shuffles indices
/// externally and fetches augmented items through `load_augmented`.
#[derive(Debug, Clone)]
pub struct XrayTensorDataset {
    samples: Vec<(PathBuf, usize)>,
    preprocessor: Preprocessor,
}

impl XrayTensorDataset {
    /// Create a dataset from a list of (path, label) samples
    pub fn new(samples: Vec<(PathBuf, usize)>, preprocessor: Preprocessor) -> Self {
        Self {
            samples,
            preprocessor,
        }
    }

    /// Create from a directory loader
    pub fn from_loader(loader: &LungXrayDataset, preprocessor: Preprocessor) -> Self {
        let samples = loader
            .samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect();
        Self::new(samples, preprocessor)
    }

    /// Load and preprocess one sample, propagating failures
    pub fn load_item(&self, index: usize) -> Result<XrayItem> {
        let (path, label) = &self.samples[index];
        let image = self.preprocessor.load(path)?;
        Ok(XrayItem {
            image,
            label: *label,
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Load one sample with a randomized augmentation applied (training only)
    pub fn load_augmented(&self, index: usize, augmenter: &mut Augmenter) -> Result<XrayItem> {
        let (path, label) = &self.samples[index];
        let letterboxed = self.preprocessor.load_letterboxed(path)?;
        let augmented = augmenter.augment(&letterboxed);
        Ok(XrayItem {
            image: self.preprocessor.normalize(&augmented),
            label: *label,
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Source path of a sample
    pub fn path(&self, index: usize) -> Option<&PathBuf> {
        self.samples.get(index).map(|(p, _)| p)
    }

    /// Label indices of all samples, in stored order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|(_, label)| *label).collect()
    }

    /// The preprocessor shared by every sample load
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }
}

impl Dataset<XrayItem> for XrayTensorDataset {
    fn get(&self, index: usize) -> Option<XrayItem> {
        if index >= self.samples.len() {
            return None;
        }
        self.load_item(index).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of X-ray images
#[derive(Clone, Debug)]
pub struct XrayBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher assembling preprocessed items into tensors
#[derive(Clone, Debug)]
pub struct XrayBatcher<B: Backend> {
    image_size: usize,
    _backend: PhantomData<B>,
}

impl<B: Backend> XrayBatcher<B> {
    /// Create a batcher for the given square image size
    pub fn new(image_size: usize) -> Self {
        Self {
            image_size,
            _backend: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, XrayItem, XrayBatch<B>> for XrayBatcher<B> {
    fn batch(&self, items: Vec<XrayItem>, device: &B::Device) -> XrayBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 1>::from_floats(images_data.as_slice(), device)
            .reshape([batch_size, channels, height, width]);

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_ints(targets_data.as_slice(), device);

        XrayBatch { images, targets }
    }
}
