//! Integration tests for CSV input, scenario simulation, and result export.

mod common;

use peakshave::io::export::{write_report_json, write_shaved_csv};
use peakshave::io::input::read_csv;
use peakshave::pipeline::run_analysis;

#[test]
fn csv_input_runs_through_the_full_pipeline() {
    let csv = "timestamp,consumption_kwh\n\
               2024-06-03 12:00,100\n\
               2024-06-03 12:15,160\n\
               2024-06-03 12:30,160\n\
               2024-06-03 12:45,100\n";
    let rows = read_csv(csv.as_bytes()).expect("CSV parses");
    let result = run_analysis(&rows, &common::default_settings()).expect("analysis succeeds");

    assert_eq!(result.intervals.len(), 4);
    assert_eq!(result.events.len(), 1);
    assert!(result.selection.is_some());
}

#[test]
fn scenarios_cover_a_capacity_ladder() {
    let result = run_analysis(
        &common::series(&[100.0, 160.0, 160.0, 160.0, 100.0]),
        &common::default_settings(),
    )
    .expect("analysis succeeds");

    assert!(!result.scenarios.is_empty());
    // Options arrive sorted by capacity, smallest first.
    for pair in result.scenarios.windows(2) {
        assert!(pair[0].capacity_kwh < pair[1].capacity_kwh);
    }
    // Compliance is a valid fraction everywhere.
    for scenario in &result.scenarios {
        assert!((0.0..=1.0).contains(&scenario.achieved_compliance_dataset));
        assert!((0.0..=1.0).contains(&scenario.achieved_compliance_daily_average));
        assert_eq!(scenario.shaved_series.len(), result.intervals.len());
    }
}

#[test]
fn shaved_series_never_exceeds_the_original() {
    let result = run_analysis(
        &common::series(&[100.0, 160.0, 160.0, 160.0, 100.0]),
        &common::default_settings(),
    )
    .expect("analysis succeeds");

    for scenario in &result.scenarios {
        for point in &scenario.shaved_series {
            assert!(point.shaved_kw <= point.original_kw + 1e-9);
        }
    }
}

#[test]
fn json_report_round_trips_through_serde() {
    let result = run_analysis(&common::series(&[100.0, 160.0, 100.0]), &common::default_settings())
        .expect("analysis succeeds");

    let mut buf = Vec::new();
    write_report_json(&result, &mut buf).expect("JSON writes");
    let value: serde_json::Value = serde_json::from_slice(&buf).expect("JSON parses");

    assert_eq!(value["intervals"].as_array().map(Vec::len), Some(3));
    assert!(value["requirement"]["energy_kwh"].is_number());
    assert!(value["selection"]["recommended"]["total_price_eur"].is_number());
}

#[test]
fn quiet_series_serializes_without_a_selection() {
    let result = run_analysis(&common::series(&[100.0, 100.0]), &common::default_settings())
        .expect("analysis succeeds");

    let mut buf = Vec::new();
    write_report_json(&result, &mut buf).expect("JSON writes");
    let value: serde_json::Value = serde_json::from_slice(&buf).expect("JSON parses");

    assert!(value.get("selection").is_none() || value["selection"].is_null());
    assert_eq!(value["scenarios"].as_array().map(Vec::len), Some(0));
}

#[test]
fn shaved_csv_has_one_row_per_interval() {
    let result = run_analysis(
        &common::series(&[100.0, 160.0, 160.0, 100.0]),
        &common::default_settings(),
    )
    .expect("analysis succeeds");
    let scenario = result.scenarios.first().expect("at least one scenario");

    let mut buf = Vec::new();
    write_shaved_csv(scenario, &mut buf).expect("CSV writes");
    let output = String::from_utf8(buf).expect("valid UTF-8");
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines[0], "timestamp,original_kw,shaved_kw");
    assert_eq!(lines.len(), 1 + result.intervals.len());
}
