//! Image preprocessing for OCR: grayscale, blur, Otsu binarization, deskew.

use std::path::Path;

use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Longest side of the thumbnail used to estimate skew.
const SKEW_SAMPLE_SIZE: u32 = 400;

/// Angle step of the skew search, in degrees.
const SKEW_STEP_DEGREES: f32 = 0.5;

/// Image preprocessor for the OCR pipeline.
///
/// Deterministic: the same input always yields the same output.
pub struct ImagePreprocessor {
    /// Maximum image dimension.
    max_size: u32,
    /// Gaussian blur sigma applied before thresholding.
    blur_sigma: f32,
    /// Whether to correct rotation.
    deskew: bool,
    /// Largest rotation searched, in degrees.
    max_skew_degrees: f32,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self {
            max_size: 2048,
            blur_sigma: 0.8,
            deskew: true,
            max_skew_degrees: 5.0,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new()
            .with_max_size(config.max_image_size)
            .with_deskew(config.deskew, config.max_skew_degrees)
    }

    /// Set maximum image dimension.
    pub fn with_max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Enable or disable deskew and set the search range.
    pub fn with_deskew(mut self, enabled: bool, max_degrees: f32) -> Self {
        self.deskew = enabled;
        self.max_skew_degrees = max_degrees.abs();
        self
    }

    /// Load and preprocess an image file.
    pub fn process_path(&self, path: &Path) -> Result<GrayImage, OcrError> {
        let bytes = std::fs::read(path).map_err(|e| {
            OcrError::ImageDecode(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.process_bytes(&bytes)
    }

    /// Decode and preprocess encoded image bytes.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<GrayImage, OcrError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
        self.process(&image)
    }

    /// Preprocess a decoded image.
    pub fn process(&self, image: &DynamicImage) -> Result<GrayImage, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::Preprocessing("image has no pixels".to_string()));
        }
        debug!("Original image size: {}x{}", width, height);

        let (new_width, new_height) = self.calculate_resize_dimensions(width, height, self.max_size);
        let resized = if (new_width, new_height) == (width, height) {
            image.clone()
        } else {
            image.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
        };

        let gray = resized.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.blur_sigma);
        let binary = binarize(&blurred);

        if !self.deskew || self.max_skew_degrees == 0.0 {
            return Ok(binary);
        }

        let angle = self.estimate_skew(&binary);
        if angle == 0.0 {
            return Ok(binary);
        }

        debug!("Correcting skew by {:.1} degrees", angle);
        Ok(rotate_about_center(
            &binary,
            angle.to_radians(),
            Interpolation::Nearest,
            Luma([255]),
        ))
    }

    /// Find the rotation that makes text rows most distinct.
    ///
    /// Projection profile search: for each candidate angle, rotate a thumbnail
    /// and score the variance of dark pixels per row. Aligned text gives
    /// sharply alternating dense and empty rows.
    fn estimate_skew(&self, binary: &GrayImage) -> f32 {
        let (width, height) = binary.dimensions();
        let (sample_width, sample_height) =
            self.calculate_resize_dimensions(width, height, SKEW_SAMPLE_SIZE);
        let sample = image::imageops::resize(
            binary,
            sample_width,
            sample_height,
            image::imageops::FilterType::Nearest,
        );

        let steps = (self.max_skew_degrees / SKEW_STEP_DEGREES).floor() as i32;
        let mut best_angle = 0.0f32;
        let mut best_score = row_profile_variance(&sample);

        // Walk outward from zero so ties keep the smaller correction.
        for step in 1..=steps {
            for sign in [1.0f32, -1.0] {
                let angle = sign * step as f32 * SKEW_STEP_DEGREES;
                let rotated = rotate_about_center(
                    &sample,
                    angle.to_radians(),
                    Interpolation::Nearest,
                    Luma([255]),
                );
                let score = row_profile_variance(&rotated);
                if score > best_score {
                    best_score = score;
                    best_angle = angle;
                }
            }
        }

        best_angle
    }

    fn calculate_resize_dimensions(
        &self,
        width: u32,
        height: u32,
        target_size: u32,
    ) -> (u32, u32) {
        let max_dim = width.max(height);

        if max_dim <= target_size {
            return (width, height);
        }

        let scale = target_size as f32 / max_dim as f32;
        let new_width = (width as f32 * scale) as u32;
        let new_height = (height as f32 * scale) as u32;

        (new_width.max(1), new_height.max(1))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Global Otsu threshold: dark text becomes 0, background 255.
fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let mut result = GrayImage::new(gray.width(), gray.height());

    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = if pixel[0] > level { 255 } else { 0 };
        result.put_pixel(x, y, Luma([value]));
    }

    result
}

fn row_profile_variance(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    if height == 0 {
        return 0.0;
    }

    let counts: Vec<f64> = (0..height)
        .map(|y| {
            (0..width)
                .filter(|&x| image.get_pixel(x, y)[0] < 128)
                .count() as f64
        })
        .collect();

    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// White page with horizontal black bars standing in for text rows.
    fn striped_page() -> DynamicImage {
        let mut img = RgbImage::from_pixel(200, 120, image::Rgb([255, 255, 255]));
        for y in 0..120 {
            if (y / 10) % 2 == 1 {
                for x in 20..180 {
                    img.put_pixel(x, y, image::Rgb([0, 0, 0]));
                }
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_resize_dimensions() {
        let preprocessor = ImagePreprocessor::new();

        let (w, h) = preprocessor.calculate_resize_dimensions(500, 300, 960);
        assert_eq!((w, h), (500, 300));

        let (w, h) = preprocessor.calculate_resize_dimensions(1920, 1080, 960);
        assert_eq!(w, 960);
        assert!(h < 960);
    }

    #[test]
    fn test_output_is_binary() {
        let preprocessor = ImagePreprocessor::new().with_deskew(false, 0.0);
        let out = preprocessor.process(&striped_page()).unwrap();

        assert_eq!(out.dimensions(), (200, 120));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(out.pixels().any(|p| p[0] == 0));
    }

    #[test]
    fn test_aligned_page_is_not_rotated() {
        let preprocessor = ImagePreprocessor::new();
        let binary = binarize(&striped_page().to_luma8());
        assert_eq!(preprocessor.estimate_skew(&binary), 0.0);
    }

    #[test]
    fn test_deterministic() {
        let preprocessor = ImagePreprocessor::new();
        let a = preprocessor.process(&striped_page()).unwrap();
        let b = preprocessor.process(&striped_page()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_corrupt_bytes_fail_with_decode_error() {
        let preprocessor = ImagePreprocessor::new();
        let result = preprocessor.process_bytes(b"definitely not an image");
        assert!(matches!(result, Err(OcrError::ImageDecode(_))));
    }

    #[test]
    fn test_missing_file_fails_with_decode_error() {
        let preprocessor = ImagePreprocessor::new();
        let result = preprocessor.process_path(Path::new("/nonexistent/receipt.jpg"));
        assert!(matches!(result, Err(OcrError::ImageDecode(_))));
    }
}
