//! Image normalization
//!
//! Every scorer works on the same canonical form: 8-bit RGB, no side longer than the
//! configured maximum. Anything else (grayscale, palette, alpha, 16-bit) is converted first,
//! then oversized images are shrunk with a Lanczos filter keeping the aspect ratio.

use crate::error::{DetectError, DetectResult};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Default bound on either side of a canonical image.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Normalized RGB raster shared read-only by the classifier and both scorers.
#[derive(Debug, Clone)]
pub struct CanonicalImage {
    pixels: RgbImage,
}

impl CanonicalImage {
    /// Decode encoded image bytes (PNG, JPEG, WebP, ...) and normalize them.
    pub fn from_bytes(data: &[u8], max_dimension: u32) -> DetectResult<Self> {
        let decoded = image::load_from_memory(data)?;
        Self::from_dynamic(decoded, max_dimension)
    }

    /// Normalize an already decoded image.
    pub fn from_dynamic(image: DynamicImage, max_dimension: u32) -> DetectResult<Self> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(DetectError::EmptyImage { width, height });
        }

        let rgb = image.into_rgb8();
        let max_dimension = max_dimension.max(1);

        let pixels = if width > max_dimension || height > max_dimension {
            let resized = DynamicImage::ImageRgb8(rgb)
                .resize(max_dimension, max_dimension, FilterType::Lanczos3)
                .into_rgb8();
            debug!(
                from = %format!("{}x{}", width, height),
                to = %format!("{}x{}", resized.width(), resized.height()),
                "image resized"
            );
            resized
        } else {
            rgb
        };

        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.width() as usize * self.pixels.height() as usize
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// Row-major luminance plane: the plain mean of R, G and B for each pixel.
    pub fn luminance(&self) -> Vec<f64> {
        self.pixels
            .pixels()
            .map(|p| (p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0)
            .collect()
    }
}
