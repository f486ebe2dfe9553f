//! JSON report output

use super::Summary;
use crate::analyzer::FileDetection;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct JsonReport<'a> {
    generated: String,
    summary: Summary,
    files: &'a [FileDetection],
}

pub fn write<W: Write>(writer: &mut W, results: &[FileDetection]) -> io::Result<()> {
    let report = JsonReport {
        generated: chrono::Local::now().to_rfc3339(),
        summary: Summary::from_results(results),
        files: results,
    };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)
}
