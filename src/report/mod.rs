//! Report generation for detection results
//!
//! This module provides output formatters for batch results:
//!
//! - **JSON**: Machine-readable format with the full score breakdown
//! - **CSV**: Spreadsheet-compatible format for bulk review
//!
//! # Usage
//!
//! ```ignore
//! use synthscan::report;
//!
//! // Automatically picks format based on extension
//! report::generate("report.json", &results)?;  // JSON
//! report::generate("report.csv", &results)?;   // CSV
//! ```

pub mod csv;
pub mod json;

use crate::analyzer::{FileDetection, Verdict};
use serde::Serialize;
use std::io;
use std::path::Path;

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, results: &[FileDetection]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "json" => json::write(&mut file, results),
        _ => csv::write(&mut file, results),
    }
}

/// Summary statistics for a batch of results
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub ai_generated: usize,
    pub camera: usize,
    pub error: usize,
}

impl Summary {
    pub fn from_results(results: &[FileDetection]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for r in results {
            match r.result.verdict() {
                Verdict::AiGenerated => summary.ai_generated += 1,
                Verdict::Camera => summary.camera += 1,
                Verdict::Error => summary.error += 1,
            }
        }

        summary
    }
}
