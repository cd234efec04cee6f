//! Shared test fixtures for integration tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use peakshave::normalize::RawMeasurement;
use peakshave::settings::AnalysisSettings;
use peakshave::timeparse::RawTimestamp;

/// First instant of the default fixture series (a Monday 10:00 UTC in June).
pub fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
}

/// A 15-minute consumption series starting at [`base_instant`].
pub fn series(energies_kwh: &[f64]) -> Vec<RawMeasurement> {
    series_from(base_instant(), energies_kwh)
}

/// A 15-minute consumption series starting at a given instant.
pub fn series_from(start: DateTime<Utc>, energies_kwh: &[f64]) -> Vec<RawMeasurement> {
    energies_kwh
        .iter()
        .enumerate()
        .map(|(i, &kwh)| RawMeasurement {
            timestamp: RawTimestamp::Instant(start + Duration::minutes(i as i64 * 15)),
            consumption_kwh: Some(kwh),
            export_kwh: None,
            pv_kwh: None,
        })
        .collect()
}

/// Default settings with a 500 kW contract (everything else stock).
pub fn default_settings() -> AnalysisSettings {
    let mut settings = AnalysisSettings::default();
    settings.contract.contracted_power_kw = 500.0;
    settings
}
