//! Timestamp normalization for heterogeneous metering exports.
//!
//! Metering files arrive with timestamps in three encodings: already-parsed
//! instants, spreadsheet serial day counts, and text in either ISO form or
//! the Dutch local format `dd-mm-yyyy hh:mm[:ss]` (optionally followed by
//! `" tot hh:mm"`, of which only the start is used). Serial values and
//! zone-less text are wall-clock time in the fixed reference zone
//! (Europe/Amsterdam), never in the host's own time zone.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Amsterdam;
use chrono_tz::Tz;

/// Fixed reference time zone for all local-calendar projections.
pub const REFERENCE_ZONE: Tz = Amsterdam;

/// Quarter-hour snap granularity for spreadsheet serial values, in seconds.
const SNAP_SECONDS: f64 = 900.0;

/// Seconds per serial day.
const DAY_SECONDS: f64 = 86_400.0;

/// A timestamp as it arrives from the column-mapped input, before resolution.
///
/// Produced by the input boundary; consumed once by [`parse_timestamp`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// Already resolved to an absolute instant by the caller.
    Instant(DateTime<Utc>),
    /// Whole-and-fractional days since 1899-12-30, local wall-clock time.
    Serial(f64),
    /// Unparsed text in ISO or Dutch local form.
    Text(String),
}

/// Spreadsheet serial epoch: 1899-12-30 00:00 naive local.
fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Resolves a naive wall-clock time in the reference zone to an absolute instant.
///
/// Ambiguous times at the DST fall-back transition resolve to the earliest
/// offset. Times inside the spring-forward gap are shifted forward across it,
/// matching what a wall clock skipping the gap would have read.
fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match REFERENCE_ZONE.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => REFERENCE_ZONE
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Converts a spreadsheet serial day count to an absolute instant.
///
/// The value is snapped to the nearest 15-minute boundary before zone
/// resolution, so a source cell encoding `16:00` as `15:59:59.99994` still
/// lands on a round quarter-hour.
fn serial_to_instant(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = serial * DAY_SECONDS;
    let snapped = (seconds / SNAP_SECONDS).round() * SNAP_SECONDS;
    if snapped > i64::MAX as f64 {
        return None;
    }
    let naive = serial_epoch() + Duration::seconds(snapped as i64);
    resolve_local(naive)
}

/// Returns true for text of the form `123` or `123.456` (a serial candidate).
fn is_plain_number(s: &str) -> bool {
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in s.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot && seen_digit => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

/// Parses a text timestamp: serial number, ISO with offset, or wall-clock
/// text (ISO without offset, or `dd-mm-yyyy hh:mm[:ss]` with an optional
/// `" tot hh:mm"` range suffix).
fn parse_text(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_plain_number(trimmed) {
        return trimmed.parse::<f64>().ok().and_then(serial_to_instant);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    // Only the start of a "16:00 tot 16:15" range is meaningful.
    let start = trimmed.split(" tot ").next().unwrap_or(trimmed);
    const WALL_CLOCK_FORMATS: &[&str] = &[
        "%d-%m-%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in WALL_CLOCK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(start, fmt) {
            return resolve_local(naive);
        }
    }
    None
}

/// Resolves a raw timestamp to an absolute instant.
///
/// Returns `None` for unparseable or unrecognized input; callers must check
/// validity before using the result — rows with invalid instants are dropped
/// and counted by the series normalizer, never raised as errors.
pub fn parse_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Instant(dt) => Some(*dt),
        RawTimestamp::Serial(serial) => serial_to_instant(*serial),
        RawTimestamp::Text(s) => parse_text(s),
    }
}

/// Local calendar day (`YYYY-MM-DD`) of an instant under the reference zone.
///
/// Uses a reference-zone calendar computation, not the instant's UTC fields:
/// a UTC-midnight instant can fall on either the same or a different
/// Amsterdam calendar day depending on season.
pub fn local_day(instant: DateTime<Utc>) -> String {
    local_day_in(instant, REFERENCE_ZONE)
}

/// Local calendar day of an instant under an explicit zone.
pub fn local_day_in(instant: DateTime<Utc>, zone: Tz) -> String {
    instant.with_timezone(&zone).format("%Y-%m-%d").to_string()
}

/// `HH:MM` label of an instant under the reference zone.
pub fn local_time_label(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&REFERENCE_ZONE)
        .format("%H:%M")
        .to_string()
}

/// `dd-mm-yyyy HH:MM` label under the reference zone, for report output.
pub fn format_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&REFERENCE_ZONE)
        .format("%d-%m-%Y %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial_for_local(naive: NaiveDateTime) -> f64 {
        (naive - serial_epoch()).num_seconds() as f64 / DAY_SECONDS
    }

    fn local_naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid test date")
    }

    #[test]
    fn serial_resolves_as_amsterdam_wall_clock() {
        // 2025-05-04 00:00 Amsterdam is UTC+2 (summer).
        let serial = serial_for_local(local_naive(2025, 5, 4, 0, 0));
        let parsed = parse_timestamp(&RawTimestamp::Serial(serial)).expect("valid serial");
        assert_eq!(parsed.to_rfc3339(), "2025-05-03T22:00:00+00:00");
    }

    #[test]
    fn serial_with_float_drift_snaps_to_quarter_hour() {
        // 16:00 Amsterdam winter = 15:00 UTC; drift of 1e-12 days must vanish.
        let serial = serial_for_local(local_naive(2024, 1, 1, 16, 0)) - 1e-12;
        let parsed = parse_timestamp(&RawTimestamp::Serial(serial)).expect("valid serial");
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(local_time_label(parsed), "16:00");
    }

    #[test]
    fn dutch_local_format_parses_in_reference_zone() {
        let parsed = parse_timestamp(&RawTimestamp::Text("01-07-2024 16:00".into()))
            .expect("valid local text");
        // Summer: UTC+2.
        let expected = Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn tot_range_suffix_uses_only_the_start() {
        let with_range =
            parse_timestamp(&RawTimestamp::Text("01-07-2024 16:00 tot 16:15".into()));
        let without = parse_timestamp(&RawTimestamp::Text("01-07-2024 16:00".into()));
        assert_eq!(with_range, without);
        assert!(with_range.is_some());
    }

    #[test]
    fn iso_with_offset_parses() {
        let parsed = parse_timestamp(&RawTimestamp::Text("2024-01-01T12:30:00.000Z".into()))
            .expect("valid ISO");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn numeric_text_is_treated_as_serial() {
        let serial = serial_for_local(local_naive(2025, 5, 4, 0, 0));
        let as_text = parse_timestamp(&RawTimestamp::Text(format!("{serial}")));
        let as_serial = parse_timestamp(&RawTimestamp::Serial(serial));
        assert_eq!(as_text, as_serial);
    }

    #[test]
    fn garbage_and_empty_yield_none() {
        assert!(parse_timestamp(&RawTimestamp::Text("not a date".into())).is_none());
        assert!(parse_timestamp(&RawTimestamp::Text("   ".into())).is_none());
        assert!(parse_timestamp(&RawTimestamp::Serial(f64::NAN)).is_none());
        assert!(parse_timestamp(&RawTimestamp::Serial(-1.0)).is_none());
    }

    #[test]
    fn local_day_follows_amsterdam_calendar_across_utc_midnight() {
        // 22:00 UTC in September is already the next Amsterdam day (UTC+2).
        let instant = Utc.with_ymd_and_hms(2024, 9, 12, 22, 0, 0).unwrap();
        assert_eq!(local_day(instant), "2024-09-13");
        // In winter (UTC+1), 22:00 UTC is still 23:00 the same local day.
        let winter = Utc.with_ymd_and_hms(2024, 1, 12, 22, 0, 0).unwrap();
        assert_eq!(local_day(winter), "2024-01-12");
    }

    #[test]
    fn ambiguous_fall_back_time_resolves_to_earliest_offset() {
        // 2024-10-27 02:30 Amsterdam occurs twice; earliest is UTC+2.
        let parsed = parse_timestamp(&RawTimestamp::Text("27-10-2024 02:30".into()))
            .expect("ambiguous time must still resolve");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 27, 0, 30, 0).unwrap());
    }

    #[test]
    fn spring_forward_gap_time_shifts_across_the_gap() {
        // 2024-03-31 02:30 Amsterdam does not exist; the clock read 03:30.
        let parsed = parse_timestamp(&RawTimestamp::Text("31-03-2024 02:30".into()))
            .expect("gap time must still resolve");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap());
    }

    #[test]
    fn format_local_renders_dutch_report_form() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap();
        assert_eq!(format_local(instant), "01-01-2024 16:00");
    }

    #[test]
    fn local_time_label_uses_reference_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap();
        assert_eq!(local_time_label(instant), "16:00");
    }
}
