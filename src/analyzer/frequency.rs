//! Frequency-domain artifact analysis
//!
//! Uses a 2-D FFT of the luminance plane to compare low- and high-frequency energy.
//!
//! # How It Works
//!
//! After shifting the spectrum so DC sits in the middle, a centered square whose half-width is
//! a quarter of the shorter side holds the low frequencies. Everything outside it is "high".
//!
//! ```text
//! +-----------------------+
//! |        outer          |
//! |    +-----------+      |
//! |    |  center   |      |     ratio = center energy / outer energy
//! |    |   (DC)    |      |     score = clamp(log10(ratio) / 3, 0, 1)
//! |    +-----------+      |
//! |                       |
//! +-----------------------+
//! ```
//!
//! Camera sensors add broadband noise, which keeps the outer band busy. Generated images tend to
//! concentrate energy at low frequencies, so the ratio climbs. The log maps ratios of 1..1000 onto
//! 0..1; anything beyond saturates.

use super::normalize::CanonicalImage;
use crate::analyzer::NEUTRAL_SCORE;
use crate::error::ScoreError;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;

/// Decades of energy ratio mapped onto the [0, 1] score.
const RATIO_DECADES: f64 = 3.0;

/// Spectral energy split between the centered low-frequency square and the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BandEnergy {
    pub center: f64,
    pub outer: f64,
}

impl BandEnergy {
    /// Map the energy split to a score. Zero outer energy is treated as "no information".
    pub fn score(&self) -> Result<f64, ScoreError> {
        if !self.center.is_finite() || !self.outer.is_finite() {
            return Err(ScoreError::NonFinite("spectral energy"));
        }
        if self.outer == 0.0 {
            return Ok(NEUTRAL_SCORE);
        }

        let ratio = self.center / self.outer;
        // a zero ratio gives -inf, which clamps to 0
        let score = (ratio.log10() / RATIO_DECADES).clamp(0.0, 1.0);
        if score.is_nan() {
            return Err(ScoreError::NonFinite("frequency score"));
        }
        Ok(score)
    }
}

/// Forward 2-D FFT of a row-major real plane, returned row-major.
fn fft_2d(data: &[f64], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft_forward(width);
    let col_fft = planner.plan_fft_forward(height);

    // Rows are contiguous, so one call transforms all of them
    let mut rows: Vec<Complex<f64>> = data.iter().map(|&v| Complex::new(v, 0.0)).collect();
    row_fft.process(&mut rows);

    let mut columns = vec![Complex::new(0.0, 0.0); width * height];
    for y in 0..height {
        for x in 0..width {
            columns[x * height + y] = rows[y * width + x];
        }
    }
    col_fft.process(&mut columns);

    for x in 0..width {
        for y in 0..height {
            rows[y * width + x] = columns[x * height + y];
        }
    }
    rows
}

/// Sum squared spectrum magnitudes inside and outside the centered low-frequency square.
pub fn band_energy(image: &CanonicalImage) -> Result<BandEnergy, ScoreError> {
    if image.pixel_count() == 0 {
        return Err(ScoreError::EmptyImage);
    }

    let width = image.width() as usize;
    let height = image.height() as usize;
    let spectrum = fft_2d(&image.luminance(), width, height);

    let (center_y, center_x) = (height / 2, width / 2);
    let half = width.min(height) / 4;
    let rows = (center_y - half)..(center_y + half);
    let cols = (center_x - half)..(center_x + half);

    let mut energy = BandEnergy::default();
    for y in 0..height {
        // position of this row once DC is shifted to the middle
        let shifted_y = (y + height / 2) % height;
        let in_rows = rows.contains(&shifted_y);
        for x in 0..width {
            let shifted_x = (x + width / 2) % width;
            let power = spectrum[y * width + x].norm_sqr();
            if in_rows && cols.contains(&shifted_x) {
                energy.center += power;
            } else {
                energy.outer += power;
            }
        }
    }

    Ok(energy)
}

/// Frequency score in [0, 1]; higher is more consistent with a generated image.
pub fn score(image: &CanonicalImage) -> Result<f64, ScoreError> {
    band_energy(image)?.score()
}
