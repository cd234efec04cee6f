//! Per-interval power computation against the contracted limit.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::normalize::NormalizedInterval;
use crate::timeparse;

/// Fixed metering interval duration in hours (15 minutes).
pub const INTERVAL_HOURS: f64 = 0.25;

/// A normalized interval with derived power and excess figures.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedInterval {
    pub instant: DateTime<Utc>,
    /// Energy consumed in this interval (kWh).
    pub consumption_kwh: f64,
    /// Instantaneous power implied by the interval energy (kW).
    pub power_kw: f64,
    /// Power above the contracted limit (kW, >= 0).
    pub excess_kw: f64,
    /// Energy above the contracted limit (kWh, >= 0).
    pub excess_kwh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_kwh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_kwh: Option<f64>,
}

/// Converts normalized intervals to processed intervals.
///
/// Pure, stateless, order-preserving: `power_kw = consumption_kwh / 0.25`,
/// `excess_kw = max(0, power_kw - contracted_power_kw)`,
/// `excess_kwh = excess_kw * 0.25`.
pub fn process_intervals(
    rows: &[NormalizedInterval],
    contracted_power_kw: f64,
) -> Vec<ProcessedInterval> {
    rows.iter()
        .map(|row| {
            let power_kw = row.consumption_kwh / INTERVAL_HOURS;
            let excess_kw = (power_kw - contracted_power_kw).max(0.0);
            ProcessedInterval {
                instant: row.instant,
                consumption_kwh: row.consumption_kwh,
                power_kw,
                excess_kw,
                excess_kwh: excess_kw * INTERVAL_HOURS,
                export_kwh: row.export_kwh,
                pv_kwh: row.pv_kwh,
            }
        })
        .collect()
}

/// Dataset-wide maximum observed power and the instant it occurred.
#[derive(Debug, Clone, Serialize)]
pub struct MaxObservation {
    pub max_observed_kw: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_observed_at: Option<DateTime<Utc>>,
}

/// Finds the maximum observed power, preferring the earliest instant on ties.
pub fn find_max_observed(intervals: &[ProcessedInterval]) -> MaxObservation {
    let Some(first) = intervals.first() else {
        return MaxObservation {
            max_observed_kw: 0.0,
            max_observed_at: None,
        };
    };

    let mut max = first;
    for interval in intervals {
        if interval.power_kw > max.power_kw
            || (interval.power_kw == max.power_kw && interval.instant < max.instant)
        {
            max = interval;
        }
    }
    MaxObservation {
        max_observed_kw: max.power_kw,
        max_observed_at: Some(max.instant),
    }
}

/// One exceeded interval in a top-N selection.
#[derive(Debug, Clone, Serialize)]
pub struct ExceededInterval {
    pub instant: DateTime<Utc>,
    pub power_kw: f64,
    pub excess_kw: f64,
}

/// Selects the top `limit` exceeded intervals of one local calendar day,
/// ordered by excess descending, then by instant ascending on ties.
pub fn top_exceeded_for_day(
    intervals: &[ProcessedInterval],
    day: &str,
    limit: usize,
) -> Vec<ExceededInterval> {
    let mut exceeded: Vec<&ProcessedInterval> = intervals
        .iter()
        .filter(|i| i.excess_kw > 0.0 && timeparse::local_day(i.instant) == day)
        .collect();
    exceeded.sort_by(|a, b| {
        b.excess_kw
            .total_cmp(&a.excess_kw)
            .then_with(|| a.instant.cmp(&b.instant))
    });
    exceeded
        .into_iter()
        .take(limit)
        .map(|i| ExceededInterval {
            instant: i.instant,
            power_kw: i.power_kw,
            excess_kw: i.excess_kw,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn normalized(minute_offset: i64, kwh: f64) -> NormalizedInterval {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        NormalizedInterval {
            instant: base + chrono::Duration::minutes(minute_offset),
            consumption_kwh: kwh,
            export_kwh: None,
            pv_kwh: None,
        }
    }

    #[test]
    fn power_and_excess_derivation() {
        let rows = vec![normalized(0, 100.0), normalized(15, 200.0)];
        let processed = process_intervals(&rows, 500.0);

        assert_eq!(processed[0].power_kw, 400.0);
        assert_eq!(processed[0].excess_kw, 0.0);
        assert_eq!(processed[0].excess_kwh, 0.0);

        assert_eq!(processed[1].power_kw, 800.0);
        assert_eq!(processed[1].excess_kw, 300.0);
        assert_eq!(processed[1].excess_kwh, 75.0);
    }

    #[test]
    fn excess_is_zero_iff_power_within_contract() {
        let rows: Vec<_> = [50.0, 125.0, 125.1, 200.0]
            .iter()
            .enumerate()
            .map(|(i, &kwh)| normalized(i as i64 * 15, kwh))
            .collect();
        for interval in process_intervals(&rows, 500.0) {
            assert!(interval.excess_kw >= 0.0);
            assert_eq!(interval.excess_kw == 0.0, interval.power_kw <= 500.0);
        }
    }

    #[test]
    fn max_observation_prefers_earliest_on_tie() {
        let rows = vec![normalized(0, 200.0), normalized(15, 200.0), normalized(30, 100.0)];
        let observation = find_max_observed(&process_intervals(&rows, 500.0));
        assert_eq!(observation.max_observed_kw, 800.0);
        assert_eq!(
            observation.max_observed_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn max_observation_of_empty_series_is_zero() {
        let observation = find_max_observed(&[]);
        assert_eq!(observation.max_observed_kw, 0.0);
        assert!(observation.max_observed_at.is_none());
    }

    #[test]
    fn top_exceeded_sorts_by_excess_then_instant() {
        // 25 intervals on one local day with rising power; two equal values.
        let mut rows: Vec<_> = (0..25)
            .map(|i| normalized(i * 15, (510.0 + i as f64) * INTERVAL_HOURS))
            .collect();
        rows[20].consumption_kwh = rows[21].consumption_kwh;

        let processed = process_intervals(&rows, 500.0);
        let day = timeparse::local_day(processed[0].instant);
        let top = top_exceeded_for_day(&processed, &day, 20);

        assert_eq!(top.len(), 20);
        for pair in top.windows(2) {
            assert!(pair[0].excess_kw >= pair[1].excess_kw);
            if pair[0].excess_kw == pair[1].excess_kw {
                assert!(pair[0].instant < pair[1].instant);
            }
        }
    }

    #[test]
    fn top_exceeded_ignores_other_days() {
        let rows = vec![normalized(0, 200.0)];
        let processed = process_intervals(&rows, 500.0);
        assert!(top_exceeded_for_day(&processed, "1999-01-01", 20).is_empty());
    }
}
