//! Peak-shaving analyzer entry point: CLI wiring around the pipeline.

use std::path::Path;
use std::process;

use tracing_subscriber::EnvFilter;

use peakshave::io::export::{export_report_json, export_shaved_csv};
use peakshave::io::input::load_csv_file;
use peakshave::pipeline::run_analysis;
use peakshave::settings::AnalysisSettings;

/// Parsed CLI arguments.
struct CliArgs {
    input_path: Option<String>,
    settings_path: Option<String>,
    contract_override_kw: Option<f64>,
    json_out: Option<String>,
    csv_out: Option<String>,
}

fn print_help() {
    eprintln!("peakshave — battery sizing for grid contract peak shaving");
    eprintln!();
    eprintln!("Usage: peakshave --input <path> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --input <path>       Consumption CSV (timestamp + kWh columns)");
    eprintln!("  --settings <path>    Analysis settings TOML file");
    eprintln!("  --contract <kw>      Override the contracted power (kW)");
    eprintln!("  --json-out <path>    Write the full analysis report as JSON");
    eprintln!("  --csv-out <path>     Write the recommended scenario's shaved series as CSV");
    eprintln!("  --help               Show this help message");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        input_path: None,
        settings_path: None,
        contract_override_kw: None,
        json_out: None,
        csv_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--input" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --input requires a path argument");
                    process::exit(1);
                }
                cli.input_path = Some(args[i].clone());
            }
            "--settings" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --settings requires a path argument");
                    process::exit(1);
                }
                cli.settings_path = Some(args[i].clone());
            }
            "--contract" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --contract requires a kW argument");
                    process::exit(1);
                }
                if let Ok(kw) = args[i].parse::<f64>() {
                    cli.contract_override_kw = Some(kw);
                } else {
                    eprintln!("error: --contract value \"{}\" is not a valid number", args[i]);
                    process::exit(1);
                }
            }
            "--json-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --json-out requires a path argument");
                    process::exit(1);
                }
                cli.json_out = Some(args[i].clone());
            }
            "--csv-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --csv-out requires a path argument");
                    process::exit(1);
                }
                cli.csv_out = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();

    let Some(ref input_path) = cli.input_path else {
        eprintln!("error: --input is required");
        print_help();
        process::exit(1);
    };

    let mut settings = if let Some(ref path) = cli.settings_path {
        match AnalysisSettings::from_toml_file(Path::new(path)) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        AnalysisSettings::default()
    };

    if let Some(kw) = cli.contract_override_kw {
        settings.contract.contracted_power_kw = kw;
    }

    let errors = settings.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let rows = match load_csv_file(Path::new(input_path)) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let result = match run_analysis(&rows, &settings) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for warning in &result.diagnostics.warnings {
        eprintln!("warning: {warning}");
    }
    for warning in &result.quality.warnings {
        eprintln!("warning: {warning}");
    }

    println!("{result}");

    if let Some(ref path) = cli.json_out {
        if let Err(e) = export_report_json(&result, Path::new(path)) {
            eprintln!("error: failed to write JSON report: {e}");
            process::exit(1);
        }
        eprintln!("Report written to {path}");
    }

    if let Some(ref path) = cli.csv_out {
        // Export the scenario matching the recommendation, else the first.
        let scenario = result
            .selection
            .as_ref()
            .and_then(|selection| {
                result
                    .scenarios
                    .iter()
                    .find(|s| s.capacity_kwh == selection.recommended.capacity_kwh)
            })
            .or_else(|| result.scenarios.first());
        match scenario {
            Some(scenario) => {
                if let Err(e) = export_shaved_csv(scenario, Path::new(path)) {
                    eprintln!("error: failed to write CSV: {e}");
                    process::exit(1);
                }
                eprintln!("Shaved series written to {path}");
            }
            None => eprintln!("warning: no scenarios simulated, skipping --csv-out"),
        }
    }
}
