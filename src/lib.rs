//! Synthscan - Detect AI-generated images
//!
//! Synthscan estimates whether an image was produced by a generative model or captured by a
//! camera. A learned classifier does most of the work; two cheap forensic heuristics nudge its
//! answer and a calibration step softens verdicts the evidence cannot support.
//!
//! # Detection Methods
//!
//! 1. **Classifier** (external model): Any program that reads a PNG on stdin and prints class
//!    probabilities or logits. See [`CommandClassifier`].
//!
//! 2. **Spatial Artifacts**: Generators tend to leave unusually smooth edges, low sensor noise
//!    and narrow color histograms. Each is scored in [0, 1] and averaged.
//!
//! 3. **Frequency Analysis**: Uses a 2-D FFT to compare low-frequency energy against
//!    high-frequency energy. Camera noise fills the high band; synthetic images often don't.
//!
//! # Quick Start
//!
//! ```no_run
//! use synthscan::{CommandClassifier, Detector, Verdict};
//!
//! let detector = Detector::new(CommandClassifier::new("./detect.py"));
//! let detection = detector.analyze_file("suspicious.png");
//!
//! match detection.result.verdict() {
//!     Verdict::Camera => println!("Looks like a photo"),
//!     Verdict::AiGenerated => println!("Likely generated"),
//!     Verdict::Error => println!("Couldn't analyze: {:?}", detection.result.error),
//! }
//!
//! println!("Confidence: {:.2}", detection.result.confidence);
//! ```
//!
//! # Scoring System
//!
//! The raw score blends classifier (90%) with the two heuristics (5% each). Calibration then
//! compresses the uncertain middle of the range toward 0.5:
//!
//! | Raw Score | Confidence | Meaning |
//! |-----------|------------|---------|
//! | below 0.3 | unchanged | Confident: camera |
//! | 0.3-0.7 | 0.5 + (raw - 0.5) × 0.7 | Uncertain |
//! | above 0.7 | unchanged | Confident: AI-generated |
//!
//! An image is reported as AI-generated when its confidence is strictly above 0.5.
//!
//! # Modules
//!
//! - [`analyzer`]: Normalization, heuristics, fusion and the [`Detector`] orchestrator
//! - [`classifier`]: Classifier trait and output adapters
//! - [`report`]: Output formatters (JSON, CSV)
//! - [`serve`]: HTTP API

pub mod analyzer;
pub mod classifier;
pub mod error;
pub mod report;
pub mod serve;

pub use analyzer::{
    collect_image_files, CanonicalImage, DetectionResult, Detector, FileDetection,
    ScoreComponents, Verdict, DEFAULT_MAX_DIMENSION, SUPPORTED_EXTENSIONS,
};
pub use classifier::{Classifier, CommandClassifier, LabelPolicy, OutputKind};
pub use error::{ClassifierError, DetectError, ScoreError};

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the public API surface is reachable from the crate root.
    // ==========================================================================

    #[test]
    fn test_public_exports() {
        let _: Verdict = Verdict::Camera;
        let _ = LabelPolicy::default();
        let _ = OutputKind::default();
        assert_eq!(DEFAULT_MAX_DIMENSION, 1024);
    }

    #[test]
    fn test_detector_accessible() {
        let detector = Detector::new(CommandClassifier::new("detector").with_name("demo"));
        assert_eq!(detector.model_name(), "demo");
        assert_eq!(detector.max_dimension(), DEFAULT_MAX_DIMENSION);
    }

    #[test]
    fn test_verdict_variants() {
        let _ = Verdict::Camera;
        let _ = Verdict::AiGenerated;
        let _ = Verdict::Error;
    }

    #[test]
    fn test_supported_extensions_lowercase() {
        for ext in SUPPORTED_EXTENSIONS {
            assert_eq!(*ext, ext.to_ascii_lowercase());
        }
    }
}
