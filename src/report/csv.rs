//! CSV report output

use crate::analyzer::FileDetection;
use std::io::{self, Write};

const HEADER: &str = "verdict,confidence,classifier_probability,artifact_score,frequency_score,\
combined_raw,width,height,model_name,file_name,file_path,error";

pub fn write<W: Write>(writer: &mut W, results: &[FileDetection]) -> io::Result<()> {
    writeln!(writer, "{}", HEADER)?;

    for r in results {
        let result = &r.result;
        let scores = match result.details {
            Some(d) => format!(
                "{:.4},{:.4},{:.4},{:.4},{},{}",
                d.classifier_probability,
                d.artifact_score,
                d.frequency_score,
                d.combined_raw,
                d.image_size.0,
                d.image_size.1
            ),
            None => ",,,,,".to_string(),
        };

        writeln!(
            writer,
            "{},{:.4},{},{},{},{},{}",
            result.verdict(),
            result.confidence,
            scores,
            escape(&result.model_name),
            escape(&r.file_name),
            escape(&r.file_path),
            escape(result.error.as_deref().unwrap_or(""))
        )?;
    }

    Ok(())
}

/// Quote a field if it contains a separator, quote or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
