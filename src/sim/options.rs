//! Generation of a compact set of battery capacities worth simulating.

use serde::Serialize;

use crate::catalog::{CATALOG, CatalogProduct};

/// Default cap on the generated option count.
pub const DEFAULT_MAX_OPTIONS: usize = 12;

/// One candidate battery configuration for scenario simulation.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOption {
    pub label: String,
    /// Nominal capacity (kWh); the simulator maps this to power specs.
    pub capacity_kwh: f64,
}

fn modular_option(product: &CatalogProduct, units: usize) -> ScenarioOption {
    let capacity = units as f64 * product.nominal_capacity_kwh;
    ScenarioOption {
        label: format!(
            "{units}x{base} ({capacity} kWh)",
            base = product.nominal_capacity_kwh
        ),
        capacity_kwh: capacity,
    }
}

/// Builds a deduplicated, capacity-ordered option set around a sizing target.
///
/// For each modular base the unit counts bracketing the target are included;
/// both fixed containers are always present as larger jumps. Options are
/// deduplicated by capacity and capped at `max_total_options`.
pub fn generate_scenario_options(target_kwh: f64, max_total_options: usize) -> Vec<ScenarioOption> {
    let mut options: Vec<ScenarioOption> = Vec::new();
    let mut push_unique = |option: ScenarioOption| {
        if !options
            .iter()
            .any(|existing| existing.capacity_kwh == option.capacity_kwh)
        {
            options.push(option);
        }
    };

    for product in CATALOG {
        if product.modular {
            let needed = (target_kwh / product.nominal_capacity_kwh).ceil().max(1.0) as usize;
            for units in needed.saturating_sub(1)..=needed + 1 {
                if units >= 1 {
                    push_unique(modular_option(product, units));
                }
            }
        } else {
            push_unique(ScenarioOption {
                label: product.label.to_string(),
                capacity_kwh: product.nominal_capacity_kwh,
            });
        }
    }

    options.sort_by(|a, b| a.capacity_kwh.total_cmp(&b.capacity_kwh));
    options.truncate(max_total_options);
    options
}
