//! End-to-end analysis pipeline: normalize, audit, size, price, simulate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::analysis::days::DayIndex;
use crate::analysis::events::{PeakEvent, group_peak_events};
use crate::analysis::intervals::{
    ExceededInterval, MaxObservation, ProcessedInterval, find_max_observed, process_intervals,
    top_exceeded_for_day,
};
use crate::analysis::sizing::{SizingRequirement, compute_requirement};
use crate::catalog::{CostSelection, select_minimum_cost_options};
use crate::normalize::{NormalizationDiagnostics, RawMeasurement, normalize_series};
use crate::quality::{DataQualityReport, build_quality_report};
use crate::settings::AnalysisSettings;
use crate::sim::{ScenarioResult, simulate_all_scenarios};
use crate::timeparse;

/// Failure modes of a full analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("dataset contains no rows")]
    EmptyDataset,
    #[error("no usable rows after normalization ({invalid} of {total} rows invalid)")]
    NoUsableRows { invalid: usize, total: usize },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("no catalog configuration reaches {required_kwh:.1} kWh")]
    NoFeasibleProduct { required_kwh: f64 },
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub diagnostics: NormalizationDiagnostics,
    pub quality: DataQualityReport,
    pub intervals: Vec<ProcessedInterval>,
    pub events: Vec<PeakEvent>,
    pub max_observed: MaxObservation,
    pub day_count: usize,
    /// Local day with the most excess energy, absent for a quiet series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_day: Option<String>,
    /// Highest exceedances of the worst day, largest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub worst_day_top: Vec<ExceededInterval>,
    pub requirement: SizingRequirement,
    /// Absent when the series never exceeds the contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<CostSelection>,
    pub scenarios: Vec<ScenarioResult>,
}

impl AnalysisResult {
    /// Count of intervals above the contracted power.
    pub fn exceedance_count(&self) -> usize {
        self.intervals.iter().filter(|i| i.excess_kw > 0.0).count()
    }

    /// Total excess energy above the contracted power (kWh).
    pub fn total_excess_kwh(&self) -> f64 {
        self.intervals.iter().map(|i| i.excess_kwh).sum()
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Peak-shaving Analysis ---")?;
        writeln!(f, "Intervals analyzed:    {}", self.intervals.len())?;
        writeln!(f, "Calendar days:         {}", self.day_count)?;
        match self.max_observed.max_observed_at {
            Some(at) => writeln!(
                f,
                "Max observed power:    {:.2} kW at {}",
                self.max_observed.max_observed_kw,
                timeparse::format_local(at)
            )?,
            None => writeln!(
                f,
                "Max observed power:    {:.2} kW",
                self.max_observed.max_observed_kw
            )?,
        }
        writeln!(f, "Exceedance intervals:  {}", self.exceedance_count())?;
        writeln!(f, "Peak events:           {}", self.events.len())?;
        writeln!(f, "Total excess energy:   {:.2} kWh", self.total_excess_kwh())?;
        if let Some(day) = &self.worst_day {
            writeln!(f, "Worst day:             {day}")?;
            for exceeded in &self.worst_day_top {
                writeln!(
                    f,
                    "    {}  {:.1} kW ({:+.1} kW)",
                    timeparse::local_time_label(exceeded.instant),
                    exceeded.power_kw,
                    exceeded.excess_kw
                )?;
            }
        }
        writeln!(
            f,
            "Required capacity:     {:.1} kWh ({:.1} kW)",
            self.requirement.energy_kwh, self.requirement.power_kw
        )?;
        match &self.selection {
            Some(selection) => {
                writeln!(
                    f,
                    "Recommended:           {} at EUR {:.2}",
                    selection.recommended.label, selection.recommended.total_price_eur
                )?;
                if let Some(alternative) = &selection.alternative {
                    writeln!(
                        f,
                        "Alternative:           {} at EUR {:.2}",
                        alternative.label, alternative.total_price_eur
                    )?;
                }
            }
            None => writeln!(f, "Recommended:           none (no exceedance)")?,
        }
        write!(f, "Scenarios simulated:   {}", self.scenarios.len())
    }
}

/// Runs the full pipeline on raw measurements.
///
/// Stages run in a fixed order: settings validation, series normalization,
/// timestamp quality audit, interval processing against the contract, peak
/// event grouping, requirement derivation, catalog pricing, scenario
/// simulation. A series that never exceeds the contract yields a zero
/// requirement, no selection, and no scenarios rather than an error.
///
/// # Errors
///
/// Returns an [`AnalysisError`] for invalid settings, an empty or fully
/// unparseable dataset, or a requirement no catalog configuration reaches.
pub fn run_analysis(
    rows: &[RawMeasurement],
    settings: &AnalysisSettings,
) -> Result<AnalysisResult, AnalysisError> {
    let settings_errors = settings.validate();
    if !settings_errors.is_empty() {
        let joined = settings_errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AnalysisError::InvalidSettings(joined));
    }
    if rows.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    let normalized = normalize_series(rows, &settings.normalize_options());
    if normalized.rows.is_empty() {
        return Err(AnalysisError::NoUsableRows {
            invalid: normalized.diagnostics.invalid_rows,
            total: normalized.diagnostics.rows_total,
        });
    }

    let quality = build_quality_report(&normalized.rows, settings.normalization.interval_minutes);

    let contracted_kw = settings.contract.contracted_power_kw;
    let intervals = process_intervals(&normalized.rows, contracted_kw);
    let events = group_peak_events(&intervals);
    let day_index = DayIndex::build(&intervals);
    let max_observed = find_max_observed(&intervals);

    let worst_day = day_index
        .highest_excess_day(&intervals)
        .map(|(day, _)| day.to_string());
    let worst_day_top = worst_day
        .as_deref()
        .map(|day| top_exceeded_for_day(&intervals, day, 5))
        .unwrap_or_default();

    let requirement = compute_requirement(&intervals, &events, &day_index, &settings.sizing_params());

    let (selection, scenarios) = if requirement.energy_kwh > 0.0 {
        let selection = select_minimum_cost_options(requirement.energy_kwh).ok_or(
            AnalysisError::NoFeasibleProduct {
                required_kwh: requirement.energy_kwh,
            },
        )?;
        let scenarios = simulate_all_scenarios(
            &intervals,
            contracted_kw,
            requirement.power_kw,
            requirement.energy_kwh,
            &settings.simulation_config(),
        );
        (Some(selection), scenarios)
    } else {
        (None, Vec::new())
    };

    info!(
        intervals = intervals.len(),
        events = events.len(),
        required_kwh = requirement.energy_kwh,
        scenarios = scenarios.len(),
        "analysis complete"
    );

    Ok(AnalysisResult {
        diagnostics: normalized.diagnostics,
        quality,
        intervals,
        events,
        max_observed,
        day_count: day_index.day_count(),
        worst_day,
        worst_day_top,
        requirement,
        selection,
        scenarios,
    })
}
