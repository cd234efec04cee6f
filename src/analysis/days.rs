//! Per-run index of interval positions by local calendar day.
//!
//! Built once per analysis and shared read-only by sizing and simulation,
//! instead of each stage regrouping the series ad hoc.

use std::collections::BTreeMap;

use crate::analysis::intervals::ProcessedInterval;
use crate::timeparse;

/// Ordered grouping of processed-interval indices by `YYYY-MM-DD` local day
/// under the reference zone.
#[derive(Debug, Clone, Default)]
pub struct DayIndex {
    days: BTreeMap<String, Vec<usize>>,
}

impl DayIndex {
    /// Builds the index in one pass over a chronologically sorted series.
    pub fn build(intervals: &[ProcessedInterval]) -> Self {
        let mut days: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, interval) in intervals.iter().enumerate() {
            days.entry(timeparse::local_day(interval.instant))
                .or_default()
                .push(index);
        }
        Self { days }
    }

    /// Iterates days in calendar order with their member interval indices.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.days
            .iter()
            .map(|(day, indices)| (day.as_str(), indices.as_slice()))
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// The day carrying the greatest total excess energy, with that total.
    ///
    /// Returns `None` when the series is empty or never exceeds the contract.
    pub fn highest_excess_day<'a>(
        &'a self,
        intervals: &[ProcessedInterval],
    ) -> Option<(&'a str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (day, indices) in self.iter() {
            let energy: f64 = indices.iter().map(|&i| intervals[i].excess_kwh).sum();
            if energy > 0.0 && best.map_or(true, |(_, max)| energy > max) {
                best = Some((day, energy));
            }
        }
        best
    }

    /// The single largest excess power observed during one day.
    pub fn day_peak_excess_kw(&self, day: &str, intervals: &[ProcessedInterval]) -> f64 {
        self.days
            .get(day)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| intervals[i].excess_kw)
                    .fold(0.0, f64::max)
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::intervals::process_intervals;
    use crate::normalize::NormalizedInterval;
    use chrono::TimeZone;
    use chrono::Utc;

    fn two_day_series() -> Vec<ProcessedInterval> {
        // Day one: mild exceedance; day two: one tall spike.
        let mut rows = Vec::new();
        for (day, energies) in [(1, vec![150.0, 150.0]), (2, vec![100.0, 300.0])] {
            for (i, kwh) in energies.iter().enumerate() {
                rows.push(NormalizedInterval {
                    instant: Utc
                        .with_ymd_and_hms(2024, 1, day, 10, i as u32 * 15, 0)
                        .unwrap(),
                    consumption_kwh: *kwh,
                    export_kwh: None,
                    pv_kwh: None,
                });
            }
        }
        process_intervals(&rows, 500.0)
    }

    #[test]
    fn groups_by_amsterdam_calendar_day() {
        let intervals = two_day_series();
        let index = DayIndex::build(&intervals);
        assert_eq!(index.day_count(), 2);
        let days: Vec<&str> = index.iter().map(|(d, _)| d).collect();
        assert_eq!(days, vec!["2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn highest_excess_day_compares_total_energy() {
        let intervals = two_day_series();
        let index = DayIndex::build(&intervals);
        // Day one: 2 * 100 kW excess * 0.25 h = 50 kWh.
        // Day two: 700 kW excess * 0.25 h = 175 kWh.
        let (day, energy) = index.highest_excess_day(&intervals).expect("has exceedance");
        assert_eq!(day, "2024-01-02");
        assert!((energy - 175.0).abs() < 1e-9);
    }

    #[test]
    fn day_peak_excess_is_the_largest_single_interval() {
        let intervals = two_day_series();
        let index = DayIndex::build(&intervals);
        assert!((index.day_peak_excess_kw("2024-01-02", &intervals) - 700.0).abs() < 1e-9);
        assert_eq!(index.day_peak_excess_kw("2024-01-05", &intervals), 0.0);
    }

    #[test]
    fn no_exceedance_means_no_highest_day() {
        let rows = vec![NormalizedInterval {
            instant: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            consumption_kwh: 50.0,
            export_kwh: None,
            pv_kwh: None,
        }];
        let intervals = process_intervals(&rows, 500.0);
        let index = DayIndex::build(&intervals);
        assert!(index.highest_excess_day(&intervals).is_none());
    }
}
