pub mod engine;
/// Candidate battery option generation around a sizing target.
pub mod options;

pub use engine::{
    ScenarioResult, ShavedPoint, SimulationConfig, simulate_all_scenarios, simulate_scenario,
};
pub use options::{DEFAULT_MAX_OPTIONS, ScenarioOption, generate_scenario_options};
