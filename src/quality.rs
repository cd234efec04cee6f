//! Timestamp-health audit, independent of series normalization.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::normalize::NormalizedInterval;

/// Tolerance when comparing a transition to the nominal interval, in minutes.
/// Absorbs sub-second drift from floating-point timestamp sources.
pub const TRANSITION_EPSILON_MINUTES: f64 = 0.01;

/// Read-only summary of timestamp health for one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DataQualityReport {
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub duplicate_count: usize,
    pub missing_intervals_count: usize,
    /// Transitions deviating from the nominal interval by more than epsilon.
    pub non_nominal_transitions: usize,
    pub warnings: Vec<String>,
}

/// Audits the instant sequence of a dataset against a nominal interval.
///
/// Counts exact duplicate instants, transitions deviating from the nominal
/// spacing by more than [`TRANSITION_EPSILON_MINUTES`], and estimates missing
/// intervals for oversized gaps as `round(delta / nominal) - 1`. Empty input
/// yields an explicit "no rows" warning rather than failing.
pub fn build_quality_report(
    rows: &[NormalizedInterval],
    nominal_minutes: f64,
) -> DataQualityReport {
    if rows.is_empty() {
        return DataQualityReport {
            rows: 0,
            start: None,
            end: None,
            duplicate_count: 0,
            missing_intervals_count: 0,
            non_nominal_transitions: 0,
            warnings: vec!["No rows found in dataset.".to_string()],
        };
    }

    let mut instants: Vec<DateTime<Utc>> = rows.iter().map(|row| row.instant).collect();
    instants.sort();

    let mut duplicate_count = 0usize;
    let mut non_nominal_transitions = 0usize;
    let mut missing_intervals_count = 0usize;

    for pair in instants.windows(2) {
        if pair[0] == pair[1] {
            duplicate_count += 1;
        }
        let delta_minutes = (pair[1] - pair[0]).num_milliseconds() as f64 / 60_000.0;
        if (delta_minutes - nominal_minutes).abs() > TRANSITION_EPSILON_MINUTES {
            non_nominal_transitions += 1;
            if delta_minutes > nominal_minutes {
                let missing = (delta_minutes / nominal_minutes).round() as i64 - 1;
                missing_intervals_count += missing.max(0) as usize;
            }
        }
    }

    let mut warnings = Vec::new();
    if duplicate_count > 0 {
        warnings.push(format!("Detected {duplicate_count} duplicate timestamps."));
    }
    if non_nominal_transitions > 0 {
        warnings.push(format!(
            "Detected {non_nominal_transitions} non-{nominal_minutes:.0}-minute interval transitions."
        ));
    }
    if !warnings.is_empty() {
        warn!(duplicate_count, non_nominal_transitions, missing_intervals_count, "timestamp irregularities detected");
    }

    DataQualityReport {
        rows: rows.len(),
        start: instants.first().copied(),
        end: instants.last().copied(),
        duplicate_count,
        missing_intervals_count,
        non_nominal_transitions,
        warnings,
    }
}
