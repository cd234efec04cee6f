//! CSV and JSON export of analysis results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::SecondsFormat;

use crate::pipeline::AnalysisResult;
use crate::sim::ScenarioResult;

/// Column header for the shaved-series CSV export.
const SHAVED_HEADER: &str = "timestamp,original_kw,shaved_kw";

/// Exports one scenario's before/after power series to a CSV file.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_shaved_csv(scenario: &ScenarioResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_shaved_csv(scenario, buf)
}

/// Writes one scenario's before/after power series as CSV to any writer.
///
/// Writes a header row followed by one data row per interval, with RFC 3339
/// UTC timestamps. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_shaved_csv(scenario: &ScenarioResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(SHAVED_HEADER.split(','))?;
    for point in &scenario.shaved_series {
        wtr.write_record(&[
            point.instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            format!("{:.4}", point.original_kw),
            format!("{:.4}", point.shaved_kw),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports a complete analysis result as pretty-printed JSON.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or serialization fails.
pub fn export_report_json(result: &AnalysisResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_report_json(result, buf)
}

/// Writes a complete analysis result as pretty-printed JSON to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_report_json(result: &AnalysisResult, writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, result).map_err(io::Error::from)
}
