//! Classifier backed by an external program
//!
//! Lets any model runtime act as the classifier without linking it into this crate. The
//! program is started once per image, receives the canonical image as PNG on stdin, and must
//! print its class outputs as JSON on stdout:
//!
//! ```text
//! $ my-detector < image.png
//! [0.13, 0.87]
//! ```
//!
//! A bare number (`0.87`) is accepted as P(AI). Anything on stderr is reported if the program
//! exits with a failure status.

use super::{ai_probability_from_outputs, Classifier, LabelPolicy, OutputKind};
use crate::analyzer::CanonicalImage;
use crate::error::ClassifierError;
use image::ImageFormat;
use serde::Deserialize;
use std::io::{Cursor, ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOutput {
    Single(f64),
    Vector(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    name: String,
    output_kind: OutputKind,
    label_policy: LabelPolicy,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            name: program.clone(),
            program,
            args: Vec::new(),
            output_kind: OutputKind::default(),
            label_policy: LabelPolicy::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Name reported in results (defaults to the program).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_output_kind(mut self, kind: OutputKind) -> Self {
        self.output_kind = kind;
        self
    }

    pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
        self.label_policy = policy;
        self
    }

    fn encode_png(image: &CanonicalImage) -> Result<Vec<u8>, ClassifierError> {
        let mut png = Vec::new();
        image
            .as_rgb()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, ClassifierError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ClassifierError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::new(ErrorKind::BrokenPipe, "classifier stdin closed"))?;

        // Feed stdin from another thread so a chatty child can't fill stdout and stall us
        let writer = std::thread::spawn(move || stdin.write_all(&input));
        let output = child.wait_with_output()?;

        match writer.join() {
            Ok(Ok(())) => {}
            // The program may legitimately stop reading early
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(std::io::Error::new(ErrorKind::Other, "stdin writer panicked").into())
            }
        }

        if !output.status.success() {
            return Err(ClassifierError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    fn parse(&self, stdout: &[u8]) -> Result<f64, ClassifierError> {
        let values = match serde_json::from_slice::<RawOutput>(stdout)? {
            RawOutput::Single(p) => vec![p],
            RawOutput::Vector(v) => v,
        };
        ai_probability_from_outputs(&values, self.output_kind, self.label_policy)
    }
}

impl Classifier for CommandClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn ai_probability(&self, image: &CanonicalImage) -> Result<f64, ClassifierError> {
        let png = Self::encode_png(image)?;
        debug!(program = %self.program, bytes = png.len(), "running classifier");
        let stdout = self.run(png)?;
        self.parse(&stdout)
    }
}
