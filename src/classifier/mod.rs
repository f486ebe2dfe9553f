//! Classifier seam
//!
//! The detector needs one number from a learned model: the probability that an image is
//! AI-generated. How a particular model arrives at that number (logits or probabilities, which
//! label index means "AI") is the adapter's business, not the fusion engine's.
//!
//! # Label Ordering
//!
//! Public detectors disagree on label order. The default [`LabelPolicy::Binary`] follows the
//! most common convention:
//!
//! ```text
//! outputs      | policy                  | AI probability
//! -------------|-------------------------|---------------------
//! [0.2, 0.8]   | Binary { ai_index: 1 }  | 0.8
//! [0.1, 0.3, …]| Binary { ai_index: 1 }  | max class (fallback)
//! [0.7, 0.3]   | Index(0)                | 0.7
//! [0.1, 0.6, …]| MaxClass                | 0.6
//! ```

pub mod command;

pub use command::CommandClassifier;

use crate::analyzer::CanonicalImage;
use crate::error::ClassifierError;
use std::sync::Arc;

/// A model that estimates how likely an image is to be AI-generated.
pub trait Classifier: Send + Sync {
    /// Identifier reported as `model_name` in results.
    fn name(&self) -> &str;

    /// Probability in [0, 1] that `image` is AI-generated.
    fn ai_probability(&self, image: &CanonicalImage) -> Result<f64, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ai_probability(&self, image: &CanonicalImage) -> Result<f64, ClassifierError> {
        (**self).ai_probability(image)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ai_probability(&self, image: &CanonicalImage) -> Result<f64, ClassifierError> {
        (**self).ai_probability(image)
    }
}

impl<C: Classifier + ?Sized> Classifier for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ai_probability(&self, image: &CanonicalImage) -> Result<f64, ClassifierError> {
        (**self).ai_probability(image)
    }
}

/// What a model's output vector contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// Already normalized class probabilities.
    #[default]
    Probabilities,
    /// Raw scores; softmax is applied (sigmoid for a single value).
    Logits,
}

/// Which entry of the class vector is the "AI-generated" class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Two-class models use `ai_index`; anything else falls back to the strongest class.
    Binary { ai_index: usize },
    /// Always this index, whatever the vector length.
    Index(usize),
    /// The strongest class, whatever it is.
    MaxClass,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        LabelPolicy::Binary { ai_index: 1 }
    }
}

impl LabelPolicy {
    fn select(&self, probabilities: &[f64]) -> Result<f64, ClassifierError> {
        let index = match *self {
            LabelPolicy::Binary { ai_index } if probabilities.len() == 2 => ai_index,
            LabelPolicy::Index(index) => index,
            LabelPolicy::Binary { .. } | LabelPolicy::MaxClass => argmax(probabilities),
        };
        probabilities.get(index).copied().ok_or_else(|| {
            ClassifierError::Malformed(format!(
                "label index {} out of range for {} classes",
                index,
                probabilities.len()
            ))
        })
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (i, &v)| {
            if v > best_value {
                (i, v)
            } else {
                (best, best_value)
            }
        })
        .0
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Reject anything that is not a finite probability.
pub fn validate_probability(p: f64) -> Result<f64, ClassifierError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ClassifierError::Malformed(format!(
            "probability {} is outside [0, 1]",
            p
        )))
    }
}

/// Reduce a model's raw output vector to the AI-class probability.
///
/// A single value is read as P(AI) directly (or through a sigmoid for logits).
pub fn ai_probability_from_outputs(
    values: &[f64],
    kind: OutputKind,
    policy: LabelPolicy,
) -> Result<f64, ClassifierError> {
    if values.is_empty() {
        return Err(ClassifierError::Malformed("empty output vector".to_string()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ClassifierError::Malformed(format!(
            "non-finite value in {:?}",
            values
        )));
    }

    let probability = match (kind, values.len()) {
        (OutputKind::Probabilities, 1) => values[0],
        (OutputKind::Logits, 1) => sigmoid(values[0]),
        (OutputKind::Probabilities, _) => {
            for &v in values {
                validate_probability(v)?;
            }
            policy.select(values)?
        }
        (OutputKind::Logits, _) => policy.select(&softmax(values))?,
    };

    validate_probability(probability)
}

/// AI-class confidence from a text classifier's logits: label 1 when there are two or more
/// classes, otherwise the only class.
pub fn text_confidence(logits: &[f64]) -> Result<f64, ClassifierError> {
    let probabilities = softmax(logits);
    let index = if probabilities.len() > 1 { 1 } else { 0 };
    let p = probabilities
        .get(index)
        .copied()
        .ok_or_else(|| ClassifierError::Malformed("empty logits".to_string()))?;
    validate_probability(p)
}
