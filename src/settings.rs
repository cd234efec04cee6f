//! TOML-based analysis settings.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::analysis::sizing::{SizingMethod, SizingParams};
use crate::normalize::{InterpretationMode, NormalizeOptions};
use crate::sim::SimulationConfig;

/// Top-level analysis settings parsed from TOML.
///
/// All fields except the contracted power have working defaults. Load from
/// TOML with [`AnalysisSettings::from_toml_file`] and check the result with
/// [`AnalysisSettings::validate`] before running an analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    /// Grid connection contract parameters.
    pub contract: ContractSettings,
    /// Series normalization tunables.
    pub normalization: NormalizationSettings,
    /// Storage sizing method and scaling factors.
    pub sizing: SizingSettings,
    /// Scenario simulation tunables.
    pub simulation: SimulationSettings,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            contract: ContractSettings::default(),
            normalization: NormalizationSettings::default(),
            sizing: SizingSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

/// Grid connection contract parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractSettings {
    /// Contracted power threshold (kW, must be > 0). No default makes sense
    /// here; 0 forces the caller to set it.
    pub contracted_power_kw: f64,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            contracted_power_kw: 0.0,
        }
    }
}

/// Series normalization tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationSettings {
    /// Nominal measurement interval (minutes, must be > 0).
    pub interval_minutes: f64,
    /// Column interpretation: `"AUTO"`, `"INTERVAL"`, or `"CUMULATIVE_DELTA"`.
    pub interpretation: InterpretationMode,
    /// Implied-power outlier threshold (kW, must be > 0).
    pub outlier_kw_threshold: f64,
    /// Keep negative cumulative deltas instead of clamping them to zero.
    pub allow_negative_deltas: bool,
    /// Per-row energy above which AUTO suspects a cumulative meter (kWh).
    pub huge_kwh_threshold: f64,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        let defaults = NormalizeOptions::default();
        Self {
            interval_minutes: defaults.interval_minutes,
            interpretation: defaults.mode,
            outlier_kw_threshold: defaults.outlier_kw_threshold,
            allow_negative_deltas: defaults.allow_negative_deltas,
            huge_kwh_threshold: defaults.huge_kwh_threshold,
        }
    }
}

/// Storage sizing method and scaling factors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingSettings {
    /// Sizing method: `"MAX_PEAK"`, `"P95"`, or `"FULL_COVERAGE"`.
    pub method: SizingMethod,
    /// Target fraction of exceedance energy to shave ([0.7, 1.0]).
    pub compliance: f64,
    /// Design margin multiplier (must be > 0).
    pub safety_factor: f64,
    /// Assumed round-trip efficiency (0.0-1.0].
    pub efficiency: f64,
}

impl Default for SizingSettings {
    fn default() -> Self {
        Self {
            method: SizingMethod::MaxPeak,
            compliance: 1.0,
            safety_factor: 1.2,
            efficiency: 0.9,
        }
    }
}

/// Scenario simulation tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Discharge power cap override (kW). Derived from the sizing result
    /// when absent.
    pub power_cap_kw: Option<f64>,
    /// Initial state of charge as a fraction of usable capacity (0.0-1.0).
    pub initial_soc_ratio: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let defaults = SimulationConfig::default();
        Self {
            power_cap_kw: defaults.power_cap_kw,
            initial_soc_ratio: defaults.initial_soc_ratio,
        }
    }
}

/// Settings error with field path and constraint description.
#[derive(Debug, Error)]
#[error("settings error: {field}: {message}")]
pub struct SettingsError {
    /// Dotted field path (e.g., `"sizing.safety_factor"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl AnalysisSettings {
    /// Parses settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|e| SettingsError {
            field: "settings".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        toml::from_str(s).map_err(|e| SettingsError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the settings are valid.
    pub fn validate(&self) -> Vec<SettingsError> {
        let mut errors = Vec::new();

        if self.contract.contracted_power_kw <= 0.0 {
            errors.push(SettingsError {
                field: "contract.contracted_power_kw".into(),
                message: "must be > 0".into(),
            });
        }

        let n = &self.normalization;
        if n.interval_minutes <= 0.0 {
            errors.push(SettingsError {
                field: "normalization.interval_minutes".into(),
                message: "must be > 0".into(),
            });
        }
        if n.outlier_kw_threshold <= 0.0 {
            errors.push(SettingsError {
                field: "normalization.outlier_kw_threshold".into(),
                message: "must be > 0".into(),
            });
        }
        if n.huge_kwh_threshold <= 0.0 {
            errors.push(SettingsError {
                field: "normalization.huge_kwh_threshold".into(),
                message: "must be > 0".into(),
            });
        }

        let s = &self.sizing;
        if !(0.7..=1.0).contains(&s.compliance) {
            errors.push(SettingsError {
                field: "sizing.compliance".into(),
                message: "must be in [0.7, 1.0]".into(),
            });
        }
        if s.safety_factor <= 0.0 {
            errors.push(SettingsError {
                field: "sizing.safety_factor".into(),
                message: "must be > 0".into(),
            });
        }
        if !(s.efficiency > 0.0 && s.efficiency <= 1.0) {
            errors.push(SettingsError {
                field: "sizing.efficiency".into(),
                message: "must be in (0.0, 1.0]".into(),
            });
        }

        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.initial_soc_ratio) {
            errors.push(SettingsError {
                field: "simulation.initial_soc_ratio".into(),
                message: "must be in [0.0, 1.0]".into(),
            });
        }
        if let Some(cap) = sim.power_cap_kw
            && cap <= 0.0
        {
            errors.push(SettingsError {
                field: "simulation.power_cap_kw".into(),
                message: "must be > 0 when set".into(),
            });
        }

        errors
    }

    /// Normalization tunables in the form the normalizer takes.
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            interval_minutes: self.normalization.interval_minutes,
            mode: self.normalization.interpretation,
            outlier_kw_threshold: self.normalization.outlier_kw_threshold,
            allow_negative_deltas: self.normalization.allow_negative_deltas,
            huge_kwh_threshold: self.normalization.huge_kwh_threshold,
        }
    }

    /// Sizing parameters in the form the requirement derivation takes.
    pub fn sizing_params(&self) -> SizingParams {
        SizingParams {
            method: self.sizing.method,
            compliance: self.sizing.compliance,
            safety_factor: self.sizing.safety_factor,
            efficiency: self.sizing.efficiency,
        }
    }

    /// Simulation tunables in the form the scenario engine takes.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            power_cap_kw: self.simulation.power_cap_kw,
            initial_soc_ratio: self.simulation.initial_soc_ratio,
        }
    }
}
