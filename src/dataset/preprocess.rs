//! Image preprocessing
//!
//! Loads an image, fits it inside the target square while preserving aspect
//! ratio (zero-padded letterbox), and normalizes pixels for network input.
//!
//! This is the single preprocessing path shared by training, validation and
//! inference. Any caller that resizes differently would silently degrade
//! accuracy, so nothing else in the crate touches raw images.

use std::path::Path;

use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};

use crate::utils::error::{LungScanError, Result};

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Aspect-preserving image preprocessor
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_size: u32,
}

impl Preprocessor {
    /// Create a preprocessor for the given square target size
    pub fn new(target_size: u32) -> Self {
        Self { target_size }
    }

    /// The configured square target size
    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Load an image from disk and letterbox it to the target size
    pub fn load_letterboxed(&self, path: &Path) -> Result<RgbImage> {
        let img = image::open(path)
            .map_err(|e| LungScanError::ImageLoad(path.to_path_buf(), e.to_string()))?;
        Ok(self.letterbox(&img.to_rgb8()))
    }

    /// Fit the image inside the target square without distortion.
    ///
    /// Scales by `min(target/w, target/h)`, then centers the result on a
    /// zero-filled canvas.
    pub fn letterbox(&self, image: &RgbImage) -> RgbImage {
        let (width, height) = image.dimensions();
        let target = self.target_size;

        if width == target && height == target {
            return image.clone();
        }

        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, target);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, target);

        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let mut canvas = ImageBuffer::from_pixel(target, target, Rgb([0u8, 0, 0]));
        let x_offset = (target - new_w) / 2;
        let y_offset = (target - new_h) / 2;
        image::imageops::replace(&mut canvas, &resized, x_offset as i64, y_offset as i64);

        canvas
    }

    /// Normalize a letterboxed image to a flat CHW tensor with ImageNet
    /// statistics
    pub fn normalize(&self, image: &RgbImage) -> Vec<f32> {
        let (width, height) = image.dimensions();
        let num_pixels = (width * height) as usize;

        let mut normalized = vec![0.0f32; 3 * num_pixels];

        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                normalized[c * num_pixels + i] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }

        normalized
    }

    /// Load, letterbox and normalize an image in one step
    pub fn load(&self, path: &Path) -> Result<Vec<f32>> {
        let image = self.load_letterboxed(path)?;
        Ok(self.normalize(&image))
    }

    /// Expected output shape after preprocessing, as `[C, H, W]`
    pub fn output_shape(&self) -> [usize; 3] {
        [3, self.target_size as usize, self.target_size as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_pixel(width, height, Rgb([255u8, 255, 255]))
    }

    #[test]
    fn test_letterbox_output_size() {
        let pre = Preprocessor::new(224);

        for (w, h) in [(100, 50), (50, 100), (224, 224), (500, 500), (3, 7)] {
            let out = pre.letterbox(&white_image(w, h));
            assert_eq!(out.dimensions(), (224, 224));
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        let pre = Preprocessor::new(224);
        let out = pre.letterbox(&white_image(100, 50));

        // 100x50 scales by 2.24 to 224x112, centered vertically.
        let content_rows: u32 = (0..224)
            .filter(|&y| (0..224).any(|x| out.get_pixel(x, y)[0] > 0))
            .count() as u32;
        let content_cols: u32 = (0..224)
            .filter(|&x| (0..224).any(|y| out.get_pixel(x, y)[0] > 0))
            .count() as u32;

        assert!((content_rows as i64 - 112).abs() <= 1);
        assert_eq!(content_cols, 224);

        // Padding is zero-filled.
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(223, 223)[0], 0);
        // Center carries image content.
        assert_eq!(out.get_pixel(112, 112)[0], 255);
    }

    #[test]
    fn test_normalize_shape_and_values() {
        let pre = Preprocessor::new(32);
        let out = pre.normalize(&white_image(32, 32));

        assert_eq!(out.len(), 3 * 32 * 32);
        assert!(out.iter().all(|v| v.is_finite()));

        // White pixel, red channel: (1.0 - 0.485) / 0.229
        let expected = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((out[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_output_shape() {
        let pre = Preprocessor::new(224);
        assert_eq!(pre.output_shape(), [3, 224, 224]);
    }

    #[test]
    fn test_load_missing_file_is_image_load_error() {
        let pre = Preprocessor::new(64);
        let err = pre.load(Path::new("/nonexistent/scan.png")).unwrap_err();
        assert!(matches!(err, LungScanError::ImageLoad(_, _)));
    }
}
