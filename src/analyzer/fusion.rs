//! Score fusion and confidence calibration
//!
//! The classifier carries the decision; the two heuristics only nudge it:
//!
//! ```text
//! combined_raw = p_classifier * 0.9 + mean(artifact, frequency) * 0.1
//! ```
//!
//! The blended score is then calibrated. Outside the uncertain band it passes through
//! unchanged; inside `[0.3, 0.7]` it is pulled toward 0.5 so ambiguous images do not get
//! confident verdicts:
//!
//! ```text
//! confidence
//!   1.0 |                                   /
//!       |                                 /
//!  0.64 |                    ___________/   <- jump back to identity above 0.7
//!       |              _____/
//!  0.36 |   __________/                     <- jump up from identity at 0.3
//!       |  /
//!   0.0 |/______________________________________
//!       0.0        0.3       0.5       0.7       1.0   combined_raw
//! ```
//!
//! These constants define the accuracy / false-positive trade-off. They are kept exactly as
//! they are; they are not meant to be tuned per deployment.

use serde::Serialize;

/// Weight of the classifier probability in the blend.
pub const CLASSIFIER_WEIGHT: f64 = 0.9;
/// Weight of the mean heuristic score in the blend.
pub const HEURISTIC_WEIGHT: f64 = 0.1;
/// Lower edge of the uncertain band.
pub const UNCERTAIN_LOW: f64 = 0.3;
/// Upper edge of the uncertain band.
pub const UNCERTAIN_HIGH: f64 = 0.7;
/// How much of the distance from 0.5 survives inside the uncertain band.
pub const UNCERTAIN_COMPRESSION: f64 = 0.7;
/// Confidence must be strictly above this to call an image AI-generated.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Output of the fusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fusion {
    pub combined_raw: f64,
    pub confidence: f64,
    pub is_ai_generated: bool,
}

/// Fixed-weight blend of the classifier probability and the two heuristic scores.
pub fn combine(classifier_probability: f64, artifact_score: f64, frequency_score: f64) -> f64 {
    classifier_probability * CLASSIFIER_WEIGHT
        + ((artifact_score + frequency_score) / 2.0) * HEURISTIC_WEIGHT
}

/// Piecewise calibration: identity outside the uncertain band, compressed toward 0.5 inside.
pub fn calibrate(combined_raw: f64) -> f64 {
    if combined_raw > UNCERTAIN_HIGH || combined_raw < UNCERTAIN_LOW {
        combined_raw
    } else {
        0.5 + (combined_raw - 0.5) * UNCERTAIN_COMPRESSION
    }
}

/// Strict verdict: exactly 0.5 is not AI-generated.
pub fn is_ai_generated(confidence: f64) -> bool {
    confidence > DECISION_THRESHOLD
}

/// Run the full blend → calibrate → verdict pipeline.
pub fn fuse(classifier_probability: f64, artifact_score: f64, frequency_score: f64) -> Fusion {
    let combined_raw = combine(classifier_probability, artifact_score, frequency_score);
    let confidence = calibrate(combined_raw);
    Fusion {
        combined_raw,
        confidence,
        is_ai_generated: is_ai_generated(confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    // ==========================================================================
    // WORKED EXAMPLES
    // ==========================================================================
    //
    // | p    | artifact | frequency | combined_raw | confidence | AI?   |
    // |------|----------|-----------|--------------|------------|-------|
    // | 0.95 | 0.8      | 0.2       | 0.905        | 0.905      | yes   |
    // | 0.5  | 0.5      | 0.5       | 0.5          | 0.5        | no    |
    // | 0.4  | 0.4      | 0.6       | 0.41         | 0.437      | no    |
    // ==========================================================================

    #[test]
    fn test_confident_ai_passes_through() {
        let f = fuse(0.95, 0.8, 0.2);
        assert!((f.combined_raw - 0.905).abs() < EPS);
        assert_eq!(f.confidence, f.combined_raw);
        assert!(f.is_ai_generated);
    }

    #[test]
    fn test_exact_half_is_not_ai() {
        let f = fuse(0.5, 0.5, 0.5);
        assert_eq!(f.combined_raw, 0.5);
        assert_eq!(f.confidence, 0.5);
        assert!(!f.is_ai_generated, "0.5 must not be classified as AI-generated");
    }

    #[test]
    fn test_uncertain_band_compressed() {
        let f = fuse(0.4, 0.4, 0.6);
        assert!((f.combined_raw - 0.41).abs() < EPS);
        assert!((f.confidence - 0.437).abs() < EPS);
        assert!(!f.is_ai_generated);
    }

    #[test]
    fn test_confident_real_passes_through() {
        let f = fuse(0.05, 0.1, 0.3);
        // 0.045 + 0.02
        assert!((f.combined_raw - 0.065).abs() < EPS);
        assert_eq!(f.confidence, f.combined_raw);
        assert!(!f.is_ai_generated);
    }

    #[test]
    fn test_classifier_dominates_heuristics() {
        // heuristics maxed out cannot flip a confident "real" classifier
        assert!(!fuse(0.1, 1.0, 1.0).is_ai_generated);
        // heuristics at zero cannot flip a confident "AI" classifier
        assert!(fuse(0.9, 0.0, 0.0).is_ai_generated);
    }

    #[test]
    fn test_combine_extremes() {
        assert_eq!(combine(0.0, 0.0, 0.0), 0.0);
        assert!((combine(1.0, 1.0, 1.0) - 1.0).abs() < EPS);
    }

    // ==========================================================================
    // CALIBRATION CURVE PROPERTIES
    // ==========================================================================

    #[test]
    fn test_calibration_identity_outside_band() {
        for i in 0..300 {
            let x = i as f64 / 1000.0; // 0.000 .. 0.299
            assert_eq!(calibrate(x), x);
        }
        for i in 701..=1000 {
            let x = i as f64 / 1000.0;
            assert_eq!(calibrate(x), x);
        }
    }

    #[test]
    fn test_calibration_band_edges() {
        assert!((calibrate(0.3) - 0.36).abs() < EPS);
        assert!((calibrate(0.7) - 0.64).abs() < EPS);
        assert_eq!(calibrate(0.5), 0.5);
    }

    #[test]
    fn test_calibration_monotonic() {
        let mut prev = calibrate(0.0);
        for i in 1..=10_000 {
            let x = i as f64 / 10_000.0;
            let y = calibrate(x);
            assert!(y >= prev, "calibration decreased at {}: {} < {}", x, y, prev);
            prev = y;
        }
    }

    #[test]
    fn test_calibration_stays_in_unit_range() {
        for i in 0..=1000 {
            let y = calibrate(i as f64 / 1000.0);
            assert!((0.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn test_verdict_matches_confidence() {
        for p in 0..=20 {
            for a in 0..=4 {
                for q in 0..=4 {
                    let f = fuse(p as f64 / 20.0, a as f64 / 4.0, q as f64 / 4.0);
                    assert_eq!(f.is_ai_generated, f.confidence > 0.5);
                    assert!((0.0..=1.0).contains(&f.combined_raw));
                    assert!((0.0..=1.0).contains(&f.confidence));
                }
            }
        }
    }

    #[test]
    fn test_verdict_threshold_strict() {
        assert!(!is_ai_generated(0.5));
        assert!(is_ai_generated(0.5 + 1e-12));
        assert!(!is_ai_generated(0.0));
    }
}
