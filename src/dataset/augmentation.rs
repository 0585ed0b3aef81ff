//! Data augmentation
//!
//! Randomized geometric and photometric perturbations applied on top of the
//! preprocessor's letterboxed output, during training only. Each call draws
//! independent parameters from a seeded RNG, so runs are reproducible when
//! the seed is fixed.

use image::{ImageBuffer, Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Bounds for the randomized augmentation transforms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees (drawn from +/- this value)
    pub rotation_degrees: f32,
    /// Maximum horizontal/vertical translation as a fraction of the extent
    pub translate_fraction: f32,
    /// Maximum shear factor
    pub shear_fraction: f32,
    /// Maximum zoom deviation from 1.0
    pub zoom_fraction: f32,
    /// Whether to randomly flip horizontally
    pub horizontal_flip: bool,
    /// Brightness multiplier range
    pub brightness_range: (f32, f32),
    /// Maximum per-channel shift as a fraction of the channel range
    pub channel_shift: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 15.0,
            translate_fraction: 0.10,
            shear_fraction: 0.10,
            zoom_fraction: 0.10,
            horizontal_flip: true,
            brightness_range: (0.85, 1.15),
            channel_shift: 0.3,
        }
    }
}

impl AugmentationConfig {
    /// Identity configuration (no augmentation)
    pub fn none() -> Self {
        Self {
            rotation_degrees: 0.0,
            translate_fraction: 0.0,
            shear_fraction: 0.0,
            zoom_fraction: 0.0,
            horizontal_flip: false,
            brightness_range: (1.0, 1.0),
            channel_shift: 0.0,
        }
    }
}

/// Seeded augmenter applying one randomized transform set per call
pub struct Augmenter {
    config: AugmentationConfig,
    rng: ChaCha8Rng,
}

impl Augmenter {
    /// Create an augmenter with an injectable seed
    pub fn new(config: AugmentationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Apply one randomized augmentation to a letterboxed image
    pub fn augment(&mut self, image: &RgbImage) -> RgbImage {
        let mut out = self.random_affine(image);

        if self.config.horizontal_flip && self.rng.gen_bool(0.5) {
            out = image::imageops::flip_horizontal(&out);
        }

        self.random_photometric(&out)
    }

    /// Combined rotation, shear, zoom and translation as a single warp.
    ///
    /// Target pixels are inverse-mapped into the source; out-of-bounds
    /// coordinates clamp to the nearest edge pixel (edge replication).
    fn random_affine(&mut self, image: &RgbImage) -> RgbImage {
        let cfg = &self.config;

        let theta = self
            .rng
            .gen_range(-cfg.rotation_degrees..=cfg.rotation_degrees)
            .to_radians();
        let shear = self.rng.gen_range(-cfg.shear_fraction..=cfg.shear_fraction);
        let zoom = self
            .rng
            .gen_range(1.0 - cfg.zoom_fraction..=1.0 + cfg.zoom_fraction);

        let (width, height) = image.dimensions();
        let tx = self.rng.gen_range(-cfg.translate_fraction..=cfg.translate_fraction)
            * width as f32;
        let ty = self.rng.gen_range(-cfg.translate_fraction..=cfg.translate_fraction)
            * height as f32;

        if theta == 0.0 && shear == 0.0 && zoom == 1.0 && tx == 0.0 && ty == 0.0 {
            return image.clone();
        }

        // Forward matrix M = R(theta) * Shear(s) * Zoom(z); det = z^2 > 0.
        let (sin, cos) = theta.sin_cos();
        let a = cos * zoom;
        let b = (cos * shear - sin) * zoom;
        let c = sin * zoom;
        let d = (sin * shear + cos) * zoom;
        let det = a * d - b * c;

        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;

        ImageBuffer::from_fn(width, height, |x, y| {
            let u = x as f32 - cx - tx;
            let v = y as f32 - cy - ty;
            let src_x = (d * u - b * v) / det + cx;
            let src_y = (-c * u + a * v) / det + cy;
            sample_bilinear(image, src_x, src_y)
        })
    }

    /// Brightness jitter and per-channel color shift in one pixel pass
    fn random_photometric(&mut self, image: &RgbImage) -> RgbImage {
        let (lo, hi) = self.config.brightness_range;
        let brightness = self.rng.gen_range(lo..=hi);

        let max_shift = self.config.channel_shift * 255.0;
        let shift = [
            self.rng.gen_range(-max_shift..=max_shift),
            self.rng.gen_range(-max_shift..=max_shift),
            self.rng.gen_range(-max_shift..=max_shift),
        ];

        if brightness == 1.0 && shift == [0.0, 0.0, 0.0] {
            return image.clone();
        }

        let (width, height) = image.dimensions();
        ImageBuffer::from_fn(width, height, |x, y| {
            let pixel = image.get_pixel(x, y);
            Rgb([
                (pixel[0] as f32 * brightness + shift[0]).clamp(0.0, 255.0) as u8,
                (pixel[1] as f32 * brightness + shift[1]).clamp(0.0, 255.0) as u8,
                (pixel[2] as f32 * brightness + shift[2]).clamp(0.0, 255.0) as u8,
            ])
        })
    }
}

/// Bilinear sample with edge-replicated out-of-bounds coordinates
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }

    Rgb(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> RgbImage {
        ImageBuffer::from_fn(64, 64, |x, y| {
            if x < 32 && y < 32 {
                Rgb([255u8, 0, 0])
            } else if x >= 32 && y < 32 {
                Rgb([0u8, 255, 0])
            } else if x < 32 {
                Rgb([0u8, 0, 255])
            } else {
                Rgb([255u8, 255, 0])
            }
        })
    }

    #[test]
    fn test_augment_preserves_dimensions() {
        let mut augmenter = Augmenter::new(AugmentationConfig::default(), 42);
        let image = test_image();

        for _ in 0..5 {
            let out = augmenter.augment(&image);
            assert_eq!(out.dimensions(), image.dimensions());
        }
    }

    #[test]
    fn test_identity_config_is_identity() {
        let mut augmenter = Augmenter::new(AugmentationConfig::none(), 42);
        let image = test_image();

        let out = augmenter.augment(&image);
        assert_eq!(out.as_raw(), image.as_raw());
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let image = test_image();

        let mut a = Augmenter::new(AugmentationConfig::default(), 1234);
        let mut b = Augmenter::new(AugmentationConfig::default(), 1234);

        for _ in 0..3 {
            assert_eq!(a.augment(&image).as_raw(), b.augment(&image).as_raw());
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let image = test_image();

        let mut a = Augmenter::new(AugmentationConfig::default(), 1);
        let mut b = Augmenter::new(AugmentationConfig::default(), 2);

        assert_ne!(a.augment(&image).as_raw(), b.augment(&image).as_raw());
    }

    #[test]
    fn test_bilinear_sampling_at_integer_coords() {
        let image = test_image();
        assert_eq!(sample_bilinear(&image, 0.0, 0.0), Rgb([255, 0, 0]));
        assert_eq!(sample_bilinear(&image, 40.0, 10.0), Rgb([0, 255, 0]));
        // Far out-of-bounds coordinates replicate the nearest edge.
        assert_eq!(sample_bilinear(&image, -100.0, -100.0), Rgb([255, 0, 0]));
    }
}
