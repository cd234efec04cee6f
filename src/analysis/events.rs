//! Grouping of processed intervals into contiguous peak events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::intervals::ProcessedInterval;

/// A maximal contiguous run of intervals with positive excess.
///
/// Events are non-overlapping and chronologically ordered across the series;
/// every interval with `excess_kw > 0` belongs to exactly one event.
#[derive(Debug, Clone, Serialize)]
pub struct PeakEvent {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Instant of the maximum excess within the run (earliest on ties).
    pub peak_instant: DateTime<Utc>,
    pub duration_intervals: usize,
    pub max_excess_kw: f64,
    pub total_excess_kwh: f64,
    /// Indices into the processed-interval series for the member intervals.
    pub interval_indexes: Vec<usize>,
}

/// Partitions a chronologically sorted interval series into peak events.
///
/// A run accumulates while `excess_kw > 0` and closes on the first
/// non-exceeding interval or at end of stream; a single non-exceeding
/// interval always closes the run (no grace-interval merging).
pub fn group_peak_events(intervals: &[ProcessedInterval]) -> Vec<PeakEvent> {
    let mut events = Vec::new();
    let mut current: Option<PeakEvent> = None;

    for (index, interval) in intervals.iter().enumerate() {
        if interval.excess_kw > 0.0 {
            let event = current.get_or_insert_with(|| PeakEvent {
                start: interval.instant,
                end: interval.instant,
                peak_instant: interval.instant,
                duration_intervals: 0,
                max_excess_kw: 0.0,
                total_excess_kwh: 0.0,
                interval_indexes: Vec::new(),
            });
            event.end = interval.instant;
            event.duration_intervals += 1;
            // Input is chronological, so a later equal excess never displaces
            // the first peak instant.
            if interval.excess_kw > event.max_excess_kw {
                event.max_excess_kw = interval.excess_kw;
                event.peak_instant = interval.instant;
            }
            event.total_excess_kwh += interval.excess_kwh;
            event.interval_indexes.push(index);
        } else if let Some(event) = current.take() {
            events.push(event);
        }
    }

    if let Some(event) = current {
        events.push(event);
    }
    events
}
