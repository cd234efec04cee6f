//! Consumption series normalization: raw rows in, per-interval energies out.
//!
//! Raw measurement columns are ambiguous: the value can be energy per
//! interval or a cumulative meter reading. This module classifies the
//! column (or honors an explicit interpretation), converts cumulative
//! readings to first differences, drops invalid and outlier rows, and
//! records everything it decided in a diagnostics value for the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::timeparse::{self, RawTimestamp};

/// Default metering interval length in minutes.
pub const DEFAULT_INTERVAL_MINUTES: f64 = 15.0;
/// Default implied-power threshold above which a row is an outlier (kW).
pub const DEFAULT_OUTLIER_KW_THRESHOLD: f64 = 5_000.0;
/// Default per-value energy threshold hinting at cumulative readings (kWh).
pub const DEFAULT_HUGE_KWH_THRESHOLD: f64 = 1_000.0;

/// Fraction of non-decreasing adjacent pairs above which a series looks cumulative.
const CUMULATIVE_NON_DECREASING_FRACTION: f64 = 0.98;
/// Fraction of huge values above which a series looks cumulative.
const CUMULATIVE_HUGE_FRACTION: f64 = 0.001;

/// How the consumption column should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpretationMode {
    /// Classify from the data (default).
    Auto,
    /// Values are energy per interval.
    Interval,
    /// Values are cumulative meter readings; use first differences.
    CumulativeDelta,
}

/// The interpretation actually applied after AUTO resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesKind {
    Interval,
    CumulativeDelta,
}

/// One column-mapped input row, before timestamp or value resolution.
///
/// Field values are `None` when the upstream parse failed; normalization
/// counts such rows as invalid instead of erroring.
#[derive(Debug, Clone)]
pub struct RawMeasurement {
    pub timestamp: RawTimestamp,
    pub consumption_kwh: Option<f64>,
    pub export_kwh: Option<f64>,
    pub pv_kwh: Option<f64>,
}

/// One normalized measurement: an absolute instant plus per-interval energy.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedInterval {
    pub instant: DateTime<Utc>,
    /// Energy consumed in this interval (kWh, >= 0).
    pub consumption_kwh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_kwh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_kwh: Option<f64>,
}

/// Tunables for one normalization pass. All fields have working defaults.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub interval_minutes: f64,
    pub mode: InterpretationMode,
    pub outlier_kw_threshold: f64,
    pub allow_negative_deltas: bool,
    pub huge_kwh_threshold: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            mode: InterpretationMode::Auto,
            outlier_kw_threshold: DEFAULT_OUTLIER_KW_THRESHOLD,
            allow_negative_deltas: false,
            huge_kwh_threshold: DEFAULT_HUGE_KWH_THRESHOLD,
        }
    }
}

/// Read-only record of what one normalization pass saw and decided.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationDiagnostics {
    pub interpretation_requested: InterpretationMode,
    pub interpretation_used: SeriesKind,
    pub rows_total: usize,
    pub rows_used: usize,
    pub invalid_rows: usize,
    pub outlier_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_outlier_kw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_outlier_instant: Option<DateTime<Utc>>,
    pub negative_delta_count: usize,
    /// AUTO classification statistic: fraction of non-decreasing adjacent pairs.
    pub fraction_non_decreasing: f64,
    /// AUTO classification statistic: median adjacent delta.
    pub median_delta: f64,
    /// AUTO classification statistic: fraction of values above the huge threshold.
    pub fraction_huge_values: f64,
    pub warnings: Vec<String>,
}

/// Filtered interval list plus the diagnostics describing how it was produced.
#[derive(Debug, Clone)]
pub struct NormalizeResult {
    pub rows: Vec<NormalizedInterval>,
    pub diagnostics: NormalizationDiagnostics,
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

/// AUTO classification statistics and outcome over the raw value sequence.
struct Interpretation {
    used: SeriesKind,
    fraction_non_decreasing: f64,
    median_delta: f64,
    fraction_huge_values: f64,
}

fn resolve_interpretation(
    values: &[f64],
    mode: InterpretationMode,
    huge_kwh_threshold: f64,
) -> Interpretation {
    if values.len() < 2 {
        // Too little data to classify; only an explicit request selects deltas.
        return Interpretation {
            used: if mode == InterpretationMode::CumulativeDelta {
                SeriesKind::CumulativeDelta
            } else {
                SeriesKind::Interval
            },
            fraction_non_decreasing: 0.0,
            median_delta: 0.0,
            fraction_huge_values: if values.len() == 1 && values[0] > huge_kwh_threshold {
                1.0
            } else {
                0.0
            },
        };
    }

    let mut non_decreasing = 0usize;
    let mut huge = 0usize;
    let mut deltas = Vec::with_capacity(values.len() - 1);
    for (i, value) in values.iter().enumerate() {
        if *value > huge_kwh_threshold {
            huge += 1;
        }
        if i > 0 {
            deltas.push(value - values[i - 1]);
            if *value >= values[i - 1] {
                non_decreasing += 1;
            }
        }
    }

    let fraction_non_decreasing = non_decreasing as f64 / (values.len() - 1) as f64;
    let median_delta = median(&deltas);
    let fraction_huge_values = huge as f64 / values.len() as f64;

    let used = match mode {
        InterpretationMode::Interval => SeriesKind::Interval,
        InterpretationMode::CumulativeDelta => SeriesKind::CumulativeDelta,
        InterpretationMode::Auto => {
            let looks_cumulative = (fraction_non_decreasing > CUMULATIVE_NON_DECREASING_FRACTION
                && median_delta >= 0.0)
                || fraction_huge_values > CUMULATIVE_HUGE_FRACTION;
            if looks_cumulative {
                SeriesKind::CumulativeDelta
            } else {
                SeriesKind::Interval
            }
        }
    };

    Interpretation {
        used,
        fraction_non_decreasing,
        median_delta,
        fraction_huge_values,
    }
}

/// Normalizes a raw measurement series to per-interval energies.
///
/// Rows with unresolvable timestamps or missing/non-finite consumption are
/// dropped and counted as invalid. The survivors are sorted by instant,
/// converted per the resolved interpretation (the very first cumulative
/// reading contributes zero energy; negative deltas are clamped to zero and
/// counted unless explicitly allowed), and any interval whose implied power
/// exceeds the outlier threshold is excluded and counted.
pub fn normalize_series(rows: &[RawMeasurement], options: &NormalizeOptions) -> NormalizeResult {
    let interval_hours = options.interval_minutes / 60.0;

    let mut prepared: Vec<NormalizedInterval> = Vec::with_capacity(rows.len());
    for row in rows {
        let instant = timeparse::parse_timestamp(&row.timestamp);
        let consumption = row.consumption_kwh.filter(|v| v.is_finite());
        if let (Some(instant), Some(consumption_kwh)) = (instant, consumption) {
            prepared.push(NormalizedInterval {
                instant,
                consumption_kwh,
                export_kwh: row.export_kwh,
                pv_kwh: row.pv_kwh,
            });
        }
    }
    prepared.sort_by_key(|row| row.instant);
    let invalid_rows = rows.len() - prepared.len();

    let values: Vec<f64> = prepared.iter().map(|row| row.consumption_kwh).collect();
    let interpretation = resolve_interpretation(&values, options.mode, options.huge_kwh_threshold);
    debug!(
        mode = ?options.mode,
        used = ?interpretation.used,
        fraction_non_decreasing = interpretation.fraction_non_decreasing,
        fraction_huge = interpretation.fraction_huge_values,
        "resolved series interpretation"
    );

    let mut negative_delta_count = 0usize;
    let mut outlier_count = 0usize;
    let mut max_outlier_kw: Option<f64> = None;
    let mut first_outlier_instant: Option<DateTime<Utc>> = None;
    let mut normalized: Vec<NormalizedInterval> = Vec::with_capacity(prepared.len());

    for i in 0..prepared.len() {
        let row = &prepared[i];
        let interval_kwh = match interpretation.used {
            SeriesKind::Interval => row.consumption_kwh,
            SeriesKind::CumulativeDelta => {
                if i == 0 {
                    // No prior baseline for the first meter reading.
                    0.0
                } else {
                    let delta = row.consumption_kwh - prepared[i - 1].consumption_kwh;
                    if delta < 0.0 && !options.allow_negative_deltas {
                        negative_delta_count += 1;
                        0.0
                    } else {
                        delta
                    }
                }
            }
        };

        if interval_kwh < 0.0 {
            continue;
        }

        let implied_kw = interval_kwh / interval_hours;
        if implied_kw > options.outlier_kw_threshold {
            outlier_count += 1;
            max_outlier_kw = Some(max_outlier_kw.map_or(implied_kw, |m| m.max(implied_kw)));
            first_outlier_instant = first_outlier_instant.or(Some(row.instant));
            continue;
        }

        normalized.push(NormalizedInterval {
            consumption_kwh: interval_kwh,
            ..row.clone()
        });
    }

    let mut warnings = Vec::new();
    if negative_delta_count > 0 {
        warnings.push(format!(
            "{negative_delta_count} negative delta(s) clamped to 0."
        ));
        warn!(negative_delta_count, "cumulative series contained negative deltas");
    }
    if outlier_count > 0 {
        warnings.push(format!(
            "{outlier_count} outlier(s) above {} kW excluded.",
            options.outlier_kw_threshold
        ));
        warn!(
            outlier_count,
            threshold_kw = options.outlier_kw_threshold,
            "excluded outlier intervals"
        );
    }

    let diagnostics = NormalizationDiagnostics {
        interpretation_requested: options.mode,
        interpretation_used: interpretation.used,
        rows_total: rows.len(),
        rows_used: normalized.len(),
        invalid_rows,
        outlier_count,
        max_outlier_kw,
        first_outlier_instant,
        negative_delta_count,
        fraction_non_decreasing: interpretation.fraction_non_decreasing,
        median_delta: interpretation.median_delta,
        fraction_huge_values: interpretation.fraction_huge_values,
        warnings,
    };

    NormalizeResult {
        rows: normalized,
        diagnostics,
    }
}
