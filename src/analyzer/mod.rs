//! Detection engine
//!
//! Runs the full pipeline for one image:
//!
//! ```text
//! bytes ──> normalize ──> CanonicalImage ──┬──> classifier ────────┐
//!                                          ├──> artifact scorer ───┼──> fusion ──> DetectionResult
//!                                          └──> frequency scorer ──┘
//! ```
//!
//! Decode and classifier failures are fatal for the request and produce a neutral result with
//! `error` set. Scorer failures are not: the failing scorer contributes [`NEUTRAL_SCORE`].

pub mod artifact;
pub mod frequency;
pub mod fusion;
pub mod normalize;

pub use normalize::{CanonicalImage, DEFAULT_MAX_DIMENSION};

use crate::classifier::{validate_probability, Classifier};
use crate::error::{DetectError, DetectResult, ScoreError};
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Score used by a heuristic that could not be computed.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Image file extensions picked up by directory scans.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff",
];

/// The independent signals behind a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreComponents {
    /// Classifier's probability for the AI-generated class
    pub classifier_probability: f64,
    /// Spatial artifact score
    pub artifact_score: f64,
    /// Frequency-domain score
    pub frequency_score: f64,
    /// Blend of the three, before calibration
    pub combined_raw: f64,
    /// Canonical image (width, height)
    pub image_size: (u32, u32),
}

/// Outcome of one detection.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub is_ai_generated: bool,
    /// Calibrated confidence that the image is AI-generated
    pub confidence: f64,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ScoreComponents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    fn failed(model_name: &str, error: &DetectError) -> Self {
        Self {
            is_ai_generated: false,
            confidence: 0.0,
            model_name: model_name.to_string(),
            details: None,
            error: Some(error.to_string()),
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.error.is_some() {
            Verdict::Error
        } else if self.is_ai_generated {
            Verdict::AiGenerated
        } else {
            Verdict::Camera
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Camera,
    AiGenerated,
    Error,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Camera => write!(f, "REAL"),
            Verdict::AiGenerated => write!(f, "AI"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

/// A detection result tagged with the file it came from.
#[derive(Debug, Clone, Serialize)]
pub struct FileDetection {
    pub file_path: String,
    pub file_name: String,
    #[serde(flatten)]
    pub result: DetectionResult,
}

/// Detection orchestrator. Owns the classifier for its whole lifetime.
pub struct Detector<C> {
    classifier: C,
    max_dimension: u32,
}

impl<C: Classifier> Detector<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Bound on either side of the canonical image (default 1024).
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Detect from encoded image bytes. Never fails; problems are reported in `error`.
    pub fn detect(&self, data: &[u8]) -> DetectionResult {
        match CanonicalImage::from_bytes(data, self.max_dimension) {
            Ok(image) => self.detect_canonical(&image),
            Err(e) => self.failure(e),
        }
    }

    /// Detect from an already decoded image.
    pub fn detect_image(&self, image: DynamicImage) -> DetectionResult {
        match CanonicalImage::from_dynamic(image, self.max_dimension) {
            Ok(image) => self.detect_canonical(&image),
            Err(e) => self.failure(e),
        }
    }

    pub fn detect_canonical(&self, image: &CanonicalImage) -> DetectionResult {
        match self.score(image) {
            Ok(components) => {
                let confidence = fusion::calibrate(components.combined_raw);
                DetectionResult {
                    is_ai_generated: fusion::is_ai_generated(confidence),
                    confidence,
                    model_name: self.model_name().to_string(),
                    details: Some(components),
                    error: None,
                }
            }
            Err(e) => self.failure(e),
        }
    }

    /// Classifier call plus both heuristics and the raw blend.
    ///
    /// The heuristics only run once the classifier has produced a valid probability. They are
    /// evaluated in parallel; each is a pure function of the image and the blend always
    /// combines them in the same order, so results match a sequential run bit for bit.
    pub fn score(&self, image: &CanonicalImage) -> DetectResult<ScoreComponents> {
        let classifier_probability = self
            .classifier
            .ai_probability(image)
            .and_then(validate_probability)?;

        let (artifact_score, frequency_score) = rayon::join(
            || absorb("artifact", artifact::score(image)),
            || absorb("frequency", frequency::score(image)),
        );

        let combined_raw = fusion::combine(classifier_probability, artifact_score, frequency_score);
        debug!(
            classifier_probability,
            artifact_score, frequency_score, combined_raw, "scores fused"
        );

        Ok(ScoreComponents {
            classifier_probability,
            artifact_score,
            frequency_score,
            combined_raw,
            image_size: image.dimensions(),
        })
    }

    /// Read and detect a single file.
    pub fn analyze_file<P: AsRef<Path>>(&self, path: P) -> FileDetection {
        let path = path.as_ref();
        let file_path = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.clone());

        let result = match std::fs::read(path) {
            Ok(data) => self.detect(&data),
            Err(e) => self.failure(DetectError::Io(e)),
        };

        FileDetection {
            file_path,
            file_name,
            result,
        }
    }

    fn failure(&self, error: DetectError) -> DetectionResult {
        warn!(model = self.model_name(), error = %error, "detection failed");
        DetectionResult::failed(self.model_name(), &error)
    }
}

/// Replace a failed heuristic with the neutral score.
fn absorb(scorer: &'static str, outcome: Result<f64, ScoreError>) -> f64 {
    match outcome {
        Ok(score) => score,
        Err(e) => {
            warn!(scorer, error = %e, "scorer failed, using neutral score");
            NEUTRAL_SCORE
        }
    }
}

/// Collect image files under `path` (or `path` itself if it is a file).
pub fn collect_image_files(path: &Path) -> Vec<PathBuf> {
    let supported: HashSet<&str> = SUPPORTED_EXTENSIONS.iter().copied().collect();

    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| supported.contains(ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    } else if path.exists() {
        vec![path.to_path_buf()]
    } else {
        vec![]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analyzer::normalize::tests::png_bytes;
    use crate::error::ClassifierError;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==========================================================================
    // TEST CLASSIFIERS
    // ==========================================================================

    /// Returns a fixed probability and counts calls.
    pub(crate) struct FixedClassifier {
        pub probability: f64,
        pub calls: AtomicUsize,
    }

    impl FixedClassifier {
        pub(crate) fn new(probability: f64) -> Self {
            Self {
                probability,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed-test-model"
        }

        fn ai_probability(&self, _image: &CanonicalImage) -> Result<f64, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.probability)
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken-model"
        }

        fn ai_probability(&self, _image: &CanonicalImage) -> Result<f64, ClassifierError> {
            Err(ClassifierError::Malformed("no logits".to_string()))
        }
    }

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let rgb = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        png_bytes(&DynamicImage::ImageRgb8(rgb))
    }

    fn assert_unit(value: f64, what: &str) {
        assert!((0.0..=1.0).contains(&value), "{} = {} is outside [0, 1]", what, value);
    }

    // ==========================================================================
    // HAPPY PATH
    // ==========================================================================

    #[test]
    fn test_detect_populates_details() {
        let detector = Detector::new(FixedClassifier::new(0.95));
        let result = detector.detect(&gradient_png(64, 48));

        assert!(result.error.is_none());
        assert_eq!(result.model_name, "fixed-test-model");
        let details = result.details.expect("details on success");
        assert_eq!(details.classifier_probability, 0.95);
        assert_eq!(details.image_size, (64, 48));
        for (v, what) in [
            (details.artifact_score, "artifact"),
            (details.frequency_score, "frequency"),
            (details.combined_raw, "combined_raw"),
            (result.confidence, "confidence"),
        ] {
            assert_unit(v, what);
        }
        // p = 0.95 keeps the blend above 0.7 whatever the heuristics say
        assert!(result.is_ai_generated);
        assert_eq!(result.confidence, details.combined_raw);
        assert_eq!(result.verdict(), Verdict::AiGenerated);
    }

    #[test]
    fn test_detect_matches_fusion_engine() {
        let detector = Detector::new(FixedClassifier::new(0.45));
        let result = detector.detect(&gradient_png(40, 40));
        let d = result.details.unwrap();

        let expected = fusion::fuse(d.classifier_probability, d.artifact_score, d.frequency_score);
        assert_eq!(d.combined_raw, expected.combined_raw);
        assert_eq!(result.confidence, expected.confidence);
        assert_eq!(result.is_ai_generated, expected.is_ai_generated);
    }

    #[test]
    fn test_verdict_always_matches_confidence() {
        for p in [0.0, 0.2, 0.33, 0.5, 0.55, 0.61, 0.7, 0.8, 1.0] {
            let result = Detector::new(FixedClassifier::new(p)).detect(&gradient_png(24, 24));
            assert_eq!(result.is_ai_generated, result.confidence > 0.5, "p = {}", p);
        }
    }

    #[test]
    fn test_detect_is_deterministic() {
        let detector = Detector::new(FixedClassifier::new(0.6));
        let bytes = gradient_png(50, 30);
        let a = detector.detect(&bytes).details.unwrap();
        let b = detector.detect(&bytes).details.unwrap();
        assert_eq!(a.artifact_score.to_bits(), b.artifact_score.to_bits());
        assert_eq!(a.frequency_score.to_bits(), b.frequency_score.to_bits());
        assert_eq!(a.combined_raw.to_bits(), b.combined_raw.to_bits());
    }

    #[test]
    fn test_parallel_scoring_matches_sequential() {
        let bytes = gradient_png(36, 28);
        let image = CanonicalImage::from_bytes(&bytes, 1024).unwrap();
        let d = Detector::new(FixedClassifier::new(0.3)).score(&image).unwrap();

        assert_eq!(d.artifact_score.to_bits(), artifact::score(&image).unwrap().to_bits());
        assert_eq!(d.frequency_score.to_bits(), frequency::score(&image).unwrap().to_bits());
    }

    #[test]
    fn test_oversized_image_is_bounded() {
        let detector = Detector::new(FixedClassifier::new(0.2)).with_max_dimension(64);
        let result = detector.detect(&gradient_png(256, 128));
        assert_eq!(result.details.unwrap().image_size, (64, 32));
    }

    #[test]
    fn test_detect_image_accepts_decoded_input() {
        let detector = Detector::new(FixedClassifier::new(0.1));
        let gray = image::GrayImage::from_fn(20, 20, |x, _| image::Luma([(x * 10) as u8]));
        let result = detector.detect_image(DynamicImage::ImageLuma8(gray));
        assert!(result.error.is_none());
        assert_eq!(result.verdict(), Verdict::Camera);
    }

    // ==========================================================================
    // FATAL FAILURES
    // ==========================================================================
    //
    // Decode and classifier failures give: confidence 0.0, not AI, error set, no
    // details. Nothing panics and nothing escapes as an Err.
    // ==========================================================================

    #[test]
    fn test_garbage_bytes_neutral_result() {
        let classifier = FixedClassifier::new(0.99);
        let detector = Detector::new(&classifier);
        let result = detector.detect(b"\x89PNG but not really");

        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_ai_generated);
        assert!(result.details.is_none());
        assert!(!result.error.as_deref().unwrap_or("").is_empty());
        assert_eq!(result.verdict(), Verdict::Error);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0, "classifier must not run");
    }

    #[test]
    fn test_empty_input_neutral_result() {
        let result = Detector::new(FixedClassifier::new(0.5)).detect(&[]);
        assert_eq!(result.confidence, 0.0);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_classifier_error_neutral_result() {
        let result = Detector::new(BrokenClassifier).detect(&gradient_png(16, 16));

        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_ai_generated);
        assert!(result.details.is_none(), "heuristics are not reported without a classifier");
        assert!(result.error.unwrap().contains("no logits"));
        assert_eq!(result.model_name, "broken-model");
    }

    #[test]
    fn test_out_of_range_probability_is_classifier_error() {
        for bad in [1.5, -0.2, f64::NAN, f64::INFINITY] {
            let result = Detector::new(FixedClassifier::new(bad)).detect(&gradient_png(16, 16));
            assert_eq!(result.confidence, 0.0, "p = {}", bad);
            assert!(result.error.is_some());
            assert!(result.details.is_none());
        }
    }

    // ==========================================================================
    // NEUTRAL SCORE ABSORPTION
    // ==========================================================================

    #[test]
    fn test_absorb_passes_scores_through() {
        assert_eq!(absorb("artifact", Ok(0.25)), 0.25);
    }

    #[test]
    fn test_absorb_replaces_failures_with_neutral() {
        assert_eq!(absorb("artifact", Err(ScoreError::EmptyImage)), NEUTRAL_SCORE);
        assert_eq!(
            absorb("frequency", Err(ScoreError::NonFinite("spectral energy"))),
            NEUTRAL_SCORE
        );
    }

    // ==========================================================================
    // FILES
    // ==========================================================================

    #[test]
    fn test_analyze_missing_file() {
        let detection = Detector::new(FixedClassifier::new(0.5)).analyze_file("/no/such/image.png");
        assert_eq!(detection.file_name, "image.png");
        assert_eq!(detection.result.verdict(), Verdict::Error);
    }

    #[test]
    fn test_analyze_file_and_collect() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), gradient_png(20, 20)).unwrap();
        std::fs::write(dir.path().join("a.PNG"), gradient_png(10, 10)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let files = collect_image_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.PNG"));

        let detector = Detector::new(FixedClassifier::new(0.9));
        let detection = detector.analyze_file(&files[1]);
        assert_eq!(detection.file_name, "b.png");
        assert_eq!(detection.result.verdict(), Verdict::AiGenerated);
    }

    #[test]
    fn test_collect_single_file_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.jpg");
        std::fs::write(&file, b"whatever").unwrap();
        assert_eq!(collect_image_files(&file), vec![file.clone()]);
        assert!(collect_image_files(&dir.path().join("missing")).is_empty());
    }

    // ==========================================================================
    // SERIALIZATION
    // ==========================================================================

    #[test]
    fn test_success_json_omits_error() {
        let result = Detector::new(FixedClassifier::new(0.8)).detect(&gradient_png(16, 16));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["details"]["artifact_score"].is_number());
        assert_eq!(json["details"]["image_size"], serde_json::json!([16, 16]));
    }

    #[test]
    fn test_failure_json_omits_details() {
        let result = Detector::new(FixedClassifier::new(0.8)).detect(b"nope");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["is_ai_generated"], false);
        assert!(json["error"].is_string());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::AiGenerated.to_string(), "AI");
        assert_eq!(Verdict::Camera.to_string(), "REAL");
        assert_eq!(Verdict::Error.to_string(), "ERROR");
    }
}
