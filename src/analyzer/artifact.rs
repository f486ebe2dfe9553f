//! Spatial-domain artifact analysis
//!
//! Three cheap statistics that tend to separate generated images from camera output:
//!
//! 1. **Color entropy**: generators favour smooth, narrow color distributions, so the per-channel
//!    histogram entropy is often lower than a photograph's.
//! 2. **Edge smoothness**: Sobel edge strength varies less across a generated image.
//! 3. **Noise**: sensors leave high-frequency noise behind. The residual after a small Gaussian
//!    blur is a rough estimate of it; generated images are often too clean.
//!
//! Each statistic is mapped to [0, 1] with higher meaning "more artificial", and the artifact
//! score is their plain mean.
//!
//! ```text
//! Sub-score       | Statistic                      | Mapping
//! ----------------|--------------------------------|------------------------------
//! color_entropy   | H(channel) / 8 bits            | 1 - H/8, averaged over R,G,B
//! edge_smoothness | std(|sobel|)                   | 1 - min(std / 50, 1)
//! noise           | std(lum - gaussian(lum, 1.0))  | 1 - min(std / 10, 1)
//! ```

use super::normalize::CanonicalImage;
use crate::error::ScoreError;
use serde::Serialize;

const HISTOGRAM_BINS: usize = 256;
/// Entropy of a uniform 256-bin histogram.
const MAX_ENTROPY_BITS: f64 = 8.0;
const LOG_EPSILON: f64 = 1e-10;

const EDGE_STD_NORM: f64 = 50.0;
const NOISE_STD_NORM: f64 = 10.0;
const NOISE_BLUR_SIGMA: f64 = 1.0;
/// Gaussian kernel radius in standard deviations.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// The three spatial sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ArtifactBreakdown {
    pub color_entropy: f64,
    pub edge_smoothness: f64,
    pub noise: f64,
}

impl ArtifactBreakdown {
    /// Unweighted mean of the sub-scores.
    pub fn score(&self) -> f64 {
        (self.color_entropy + self.edge_smoothness + self.noise) / 3.0
    }
}

/// Compute all three sub-scores for an image.
pub fn analyze(image: &CanonicalImage) -> Result<ArtifactBreakdown, ScoreError> {
    if image.pixel_count() == 0 {
        return Err(ScoreError::EmptyImage);
    }

    let width = image.width() as usize;
    let height = image.height() as usize;
    let luminance = image.luminance();

    let color_entropy = color_entropy_score(image);

    let edges = sobel_magnitude(&luminance, width, height);
    let edge_smoothness = 1.0 - (std_dev(&edges) / EDGE_STD_NORM).min(1.0);

    let blurred = gaussian_blur(&luminance, width, height, NOISE_BLUR_SIGMA);
    let residual: Vec<f64> = luminance
        .iter()
        .zip(blurred.iter())
        .map(|(&l, &b)| l - b)
        .collect();
    let noise = 1.0 - (std_dev(&residual) / NOISE_STD_NORM).min(1.0);

    let breakdown = ArtifactBreakdown {
        color_entropy: finite(color_entropy, "color entropy")?,
        edge_smoothness: finite(edge_smoothness, "edge smoothness")?,
        noise: finite(noise, "noise level")?,
    };
    Ok(breakdown)
}

/// Artifact score in [0, 1]; higher is more consistent with a generated image.
pub fn score(image: &CanonicalImage) -> Result<f64, ScoreError> {
    let breakdown = analyze(image)?;
    finite(breakdown.score(), "artifact score")
}

fn finite(value: f64, what: &'static str) -> Result<f64, ScoreError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScoreError::NonFinite(what))
    }
}

/// Mean over R, G, B of `1 - entropy / 8`.
fn color_entropy_score(image: &CanonicalImage) -> f64 {
    let mut histograms = [[0u64; HISTOGRAM_BINS]; 3];
    for pixel in image.as_rgb().pixels() {
        for (channel, histogram) in histograms.iter_mut().enumerate() {
            // 256 bins over 0..=255 puts every intensity in its own bin
            histogram[pixel[channel] as usize] += 1;
        }
    }

    let total = image.pixel_count() as f64;
    let sum: f64 = histograms
        .iter()
        .map(|h| (1.0 - shannon_entropy(h, total) / MAX_ENTROPY_BITS).clamp(0.0, 1.0))
        .sum();
    sum / 3.0
}

/// Shannon entropy in bits. The epsilon keeps empty bins out of `log2(0)`.
fn shannon_entropy(histogram: &[u64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    -histogram
        .iter()
        .map(|&count| {
            let p = count as f64 / total;
            p * (p + LOG_EPSILON).log2()
        })
        .sum::<f64>()
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    variance.sqrt()
}

/// Sobel gradient magnitude with zero padding outside the image.
fn sobel_magnitude(data: &[f64], width: usize, height: usize) -> Vec<f64> {
    let at = |x: isize, y: isize| -> f64 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0.0
        } else {
            data[y as usize * width + x as usize]
        }
    };

    let mut out = Vec::with_capacity(width * height);
    for y in 0..height as isize {
        for x in 0..width as isize {
            let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            out.push(gx.hypot(gy));
        }
    }
    out
}

/// Normalized 1-D Gaussian kernel, radius `truncate * sigma` rounded.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Mirror an out-of-range index back into `0..n` (edge sample repeated: `d c b a | a b c d`).
fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Separable Gaussian blur with reflected borders.
fn gaussian_blur(data: &[f64], width: usize, height: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut vertical = vec![0.0; data.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = reflect_index(y as isize + k as isize - radius, height);
                acc += w * data[sy * width + x];
            }
            vertical[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0; data.len()];
    for y in 0..height {
        let row = &vertical[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = reflect_index(x as isize + k as isize - radius, width);
                acc += w * row[sx];
            }
            out[y * width + x] = acc;
        }
    }
    out
}
