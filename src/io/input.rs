//! CSV measurement loading with tolerant header and number handling.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::normalize::RawMeasurement;
use crate::timeparse::RawTimestamp;

/// Header aliases for the timestamp column, matched case-insensitively.
const TIMESTAMP_HEADERS: &[&str] = &["timestamp", "datum", "datetime", "date", "tijdstip"];
/// Header aliases for the consumption column.
const CONSUMPTION_HEADERS: &[&str] = &["consumption_kwh", "verbruik", "consumption", "kwh"];
/// Header aliases for the optional grid export column.
const EXPORT_HEADERS: &[&str] = &["export_kwh", "teruglevering", "export"];
/// Header aliases for the optional PV generation column.
const PV_HEADERS: &[&str] = &["pv_kwh", "opwek", "pv"];

/// Input error: unreadable file, malformed CSV, or a missing required column.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column (one of: {expected})")]
    MissingColumn { expected: String },
}

/// Loads raw measurements from a CSV file.
///
/// # Errors
///
/// Returns an [`InputError`] if the file cannot be opened or parsed, or if
/// no timestamp or consumption column is present.
pub fn load_csv_file(path: &Path) -> Result<Vec<RawMeasurement>, InputError> {
    let file = File::open(path)?;
    read_csv(file)
}

/// Reads raw measurements from any CSV reader.
///
/// The header row is resolved case-insensitively against known aliases
/// (Dutch meter exports included). Timestamp cells are kept as raw text;
/// interpretation happens during normalization. Unparseable number cells
/// become `None` rather than failing the row.
///
/// # Errors
///
/// Returns an [`InputError`] if the CSV is malformed or a required column
/// is absent.
pub fn read_csv(reader: impl Read) -> Result<Vec<RawMeasurement>, InputError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let timestamp_idx = find_column(&headers, TIMESTAMP_HEADERS).ok_or_else(|| {
        InputError::MissingColumn {
            expected: TIMESTAMP_HEADERS.join(", "),
        }
    })?;
    let consumption_idx = find_column(&headers, CONSUMPTION_HEADERS).ok_or_else(|| {
        InputError::MissingColumn {
            expected: CONSUMPTION_HEADERS.join(", "),
        }
    })?;
    let export_idx = find_column(&headers, EXPORT_HEADERS);
    let pv_idx = find_column(&headers, PV_HEADERS);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let timestamp = record.get(timestamp_idx).unwrap_or("").to_string();
        rows.push(RawMeasurement {
            timestamp: RawTimestamp::Text(timestamp),
            consumption_kwh: record.get(consumption_idx).and_then(parse_energy_cell),
            export_kwh: export_idx.and_then(|i| record.get(i)).and_then(parse_energy_cell),
            pv_kwh: pv_idx.and_then(|i| record.get(i)).and_then(parse_energy_cell),
        });
    }

    debug!(rows = rows.len(), "loaded CSV measurements");
    Ok(rows)
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim().to_ascii_lowercase();
        aliases.iter().any(|alias| header == *alias)
    })
}

/// Parses a number cell, accepting a decimal comma when no dot is present.
fn parse_energy_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(value) = cell.parse::<f64>() {
        return Some(value);
    }
    if !cell.contains('.') {
        return cell.replace(',', ".").parse::<f64>().ok();
    }
    None
}
