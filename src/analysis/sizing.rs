//! Storage sizing: statistical capacity/power requirement derivation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::days::DayIndex;
use crate::analysis::events::PeakEvent;
use crate::analysis::intervals::ProcessedInterval;

/// Minimum event count for a stable 95th-percentile estimate; below this,
/// P95 falls back to MAX_PEAK.
pub const P95_MIN_EVENTS: usize = 20;

/// Statistical method for deriving the storage requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingMethod {
    /// Size for the single event with the greatest total excess energy.
    MaxPeak,
    /// Size for the 95th percentile over event energies and powers.
    P95,
    /// Size for the worst local calendar day in full.
    FullCoverage,
}

/// Scaling parameters applied to the raw statistical requirement.
#[derive(Debug, Clone, Copy)]
pub struct SizingParams {
    pub method: SizingMethod,
    /// Target fraction of exceedance energy to shave (user intent).
    pub compliance: f64,
    /// Design margin multiplier.
    pub safety_factor: f64,
    /// Round-trip efficiency of the storage system.
    pub efficiency: f64,
}

/// Raw and scaled energy/power requirement for one sizing configuration.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SizingRequirement {
    pub raw_energy_kwh: f64,
    pub raw_power_kw: f64,
    /// Scaled capacity requirement fed to the cost optimizer (kWh).
    pub energy_kwh: f64,
    /// Scaled power requirement for cross-checking discharge limits (kW).
    pub power_kw: f64,
}

/// Ceiling-rank percentile: `index = ceil(p/100 * n) - 1`, clamped.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[index.saturating_sub(1).min(sorted.len() - 1)]
}

/// The event with the greatest total excess energy, if any.
fn highest_energy_event(events: &[PeakEvent]) -> Option<&PeakEvent> {
    events
        .iter()
        .max_by(|a, b| a.total_excess_kwh.total_cmp(&b.total_excess_kwh))
}

/// Derives the raw requirement per the configured method, then applies
/// compliance, efficiency, and safety scaling in that order.
///
/// The three factors stay separate so each intermediate value remains
/// auditable: compliance scales the raw figures, efficiency inflates the
/// energy requirement for round-trip losses, the safety factor is a final
/// design margin on both.
pub fn compute_requirement(
    intervals: &[ProcessedInterval],
    events: &[PeakEvent],
    day_index: &DayIndex,
    params: &SizingParams,
) -> SizingRequirement {
    let (mut raw_energy_kwh, mut raw_power_kw) = match params.method {
        SizingMethod::MaxPeak => max_peak_requirement(events),
        SizingMethod::P95 => {
            if events.len() < P95_MIN_EVENTS {
                debug!(
                    events = events.len(),
                    "fewer than {P95_MIN_EVENTS} events, P95 falls back to MAX_PEAK"
                );
                max_peak_requirement(events)
            } else {
                let energies: Vec<f64> = events.iter().map(|e| e.total_excess_kwh).collect();
                let powers: Vec<f64> = events.iter().map(|e| e.max_excess_kw).collect();
                (percentile(&energies, 95.0), percentile(&powers, 95.0))
            }
        }
        SizingMethod::FullCoverage => day_index
            .highest_excess_day(intervals)
            .map(|(day, energy)| (energy, day_index.day_peak_excess_kw(day, intervals)))
            .unwrap_or((0.0, 0.0)),
    };

    raw_energy_kwh *= params.compliance;
    raw_power_kw *= params.compliance;

    SizingRequirement {
        raw_energy_kwh,
        raw_power_kw,
        energy_kwh: (raw_energy_kwh / params.efficiency) * params.safety_factor,
        power_kw: raw_power_kw * params.safety_factor,
    }
}

fn max_peak_requirement(events: &[PeakEvent]) -> (f64, f64) {
    highest_energy_event(events)
        .map(|event| (event.total_excess_kwh, event.max_excess_kw))
        .unwrap_or((0.0, 0.0))
}
