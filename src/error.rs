//! Error types for detection
//!
//! Only [`DetectError`] ever reaches a [`DetectionResult`](crate::DetectionResult), and only as
//! its `error` string. [`ScoreError`] is absorbed by the detector and replaced with the neutral
//! score.

use thiserror::Error;

/// Fatal, per-request failures. The detector turns these into a neutral result.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("classifier failed: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Failures of the external classifier or of its output.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("could not start classifier `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("classifier i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode image for classifier: {0}")]
    Encode(#[from] image::ImageError),

    #[error("classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("unreadable classifier output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("malformed probability output: {0}")]
    Malformed(String),
}

/// Numerical failure inside a heuristic scorer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error("non-finite {0}")]
    NonFinite(&'static str),
}

pub type DetectResult<T> = Result<T, DetectError>;
