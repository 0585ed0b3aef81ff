//! Dataset Loader
//!
//! Loads a chest X-ray dataset from disk. The immediate subdirectories of
//! the root name the classes; their lexicographic order fixes the
//! class-index mapping. Files within a class are enumerated in sorted order
//! so that two passes over the same directory always yield the same
//! index-to-path mapping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{LungScanError, Result};

/// Image file extensions recognized by the loader
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (e.g., "tuberculosis")
    pub class_name: String,
}

/// Directory-derived chest X-ray dataset
#[derive(Debug, Clone)]
pub struct LungXrayDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples, grouped by class in index order, sorted within a class
    pub samples: Vec<ImageSample>,
    /// Class names in label-index order
    pub class_names: Vec<String>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
}

impl LungXrayDataset {
    /// Load a dataset from a directory
    ///
    /// The directory should be structured as:
    /// ```text
    /// root_dir/
    /// ├── bacterial/
    /// │   ├── scan1.jpg
    /// │   └── scan2.jpg
    /// ├── normal/
    /// │   └── ...
    /// └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading dataset from: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(LungScanError::Dataset(format!(
                "dataset directory does not exist: {}",
                root_dir.display()
            )));
        }

        // Discover class directories; lexicographic order defines the labels
        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(LungScanError::Dataset(format!(
                "no class directories found under: {}",
                root_dir.display()
            )));
        }

        let class_to_idx: HashMap<String, usize> = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut samples = Vec::new();

        for class_name in &class_names {
            let class_dir = root_dir.join(class_name);
            let label = class_to_idx[class_name];

            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.path().to_path_buf())
                .filter(|p| is_image_file(p))
                .collect();
            paths.sort();

            if paths.is_empty() {
                return Err(LungScanError::Dataset(format!(
                    "class directory contains no images: {}",
                    class_dir.display()
                )));
            }

            debug!("Class '{}' (label {}): {} samples", class_name, label, paths.len());

            samples.extend(paths.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));
        }

        info!(
            "Loaded {} samples across {} classes",
            samples.len(),
            class_names.len()
        );

        Ok(Self {
            root_dir,
            samples,
            class_names,
            class_to_idx,
        })
    }

    /// Number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Label indices of all samples, in dataset order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Per-class sample counts, indexed by label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }

    /// Statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts: self.class_counts(),
            class_names: self.class_names.clone(),
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Statistics about a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\nDataset statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = (count as f32 / self.total_samples.max(1) as f32 * 40.0) as usize;
            let bar: String = "█".repeat(bar_len);
            println!("    {:2}. {:20} {:6} {}", idx, name, count, bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_image(path: &Path, color: [u8; 3]) {
        let img: image::RgbImage = ImageBuffer::from_pixel(8, 8, Rgb(color));
        img.save(path).unwrap();
    }

    fn build_dataset_dir(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("data");
        for (class, color) in [("viral", [10u8, 0, 0]), ("bacterial", [0u8, 10, 0])] {
            let dir = root.join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..3 {
                write_image(&dir.join(format!("scan_{}.png", i)), color);
            }
        }
        root
    }

    #[test]
    fn test_class_order_is_lexicographic() {
        let tmp = TempDir::new().unwrap();
        let root = build_dataset_dir(&tmp);

        let dataset = LungXrayDataset::new(&root).unwrap();

        assert_eq!(dataset.class_names, vec!["bacterial", "viral"]);
        assert_eq!(dataset.class_to_idx["bacterial"], 0);
        assert_eq!(dataset.class_to_idx["viral"], 1);
        assert_eq!(dataset.len(), 6);
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let root = build_dataset_dir(&tmp);

        let first = LungXrayDataset::new(&root).unwrap();
        let second = LungXrayDataset::new(&root).unwrap();

        let paths_first: Vec<_> = first.samples.iter().map(|s| s.path.clone()).collect();
        let paths_second: Vec<_> = second.samples.iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths_first, paths_second);
    }

    #[test]
    fn test_missing_directory_fails() {
        let err = LungXrayDataset::new("/nonexistent/dataset").unwrap_err();
        assert!(matches!(err, LungScanError::Dataset(_)));
        assert!(err.to_string().contains("/nonexistent/dataset"));
    }

    #[test]
    fn test_empty_class_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let root = build_dataset_dir(&tmp);
        std::fs::create_dir_all(root.join("normal")).unwrap();

        let err = LungXrayDataset::new(&root).unwrap_err();
        assert!(err.to_string().contains("normal"));
    }

    #[test]
    fn test_class_counts() {
        let tmp = TempDir::new().unwrap();
        let root = build_dataset_dir(&tmp);

        let dataset = LungXrayDataset::new(&root).unwrap();
        assert_eq!(dataset.class_counts(), vec![3, 3]);
        assert_eq!(dataset.labels().len(), 6);
    }

    #[test]
    fn test_non_image_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let root = build_dataset_dir(&tmp);
        std::fs::write(root.join("bacterial").join("notes.txt"), "not an image").unwrap();

        let dataset = LungXrayDataset::new(&root).unwrap();
        assert_eq!(dataset.len(), 6);
    }
}
