//! Battery product catalog, minimum-cost configuration search, and the
//! capacity-to-spec mapping used by the scenario simulator.
//!
//! The catalog is immutable process-wide constant data. Composite (multi-unit)
//! products are synthesized on demand by the optimizer and never written back.

use serde::Serialize;
use tracing::debug;

/// Power and efficiency specification of a realized storage capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatterySpec {
    pub capacity_kwh: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub round_trip_efficiency: f64,
}

/// One catalog entry: a stackable cabinet or an indivisible container.
#[derive(Debug, Clone, Copy)]
pub struct CatalogProduct {
    pub label: &'static str,
    /// Nominal capacity used for sizing and labels (kWh).
    pub nominal_capacity_kwh: f64,
    /// Usable capacity from the product brochure (kWh).
    pub usable_capacity_kwh: f64,
    pub unit_price_eur: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub round_trip_efficiency: f64,
    /// Whether N identical units may be stacked.
    pub modular: bool,
}

/// Brochure catalog, smallest first. Loaded once; never mutated at runtime.
pub const CATALOG: &[CatalogProduct] = &[
    CatalogProduct {
        label: "WattsNext ESS Cabinet 64 kWh",
        nominal_capacity_kwh: 64.0,
        usable_capacity_kwh: 64.3,
        unit_price_eur: 16_063.43,
        max_charge_kw: 32.0,
        max_discharge_kw: 30.0,
        round_trip_efficiency: 0.9,
        modular: true,
    },
    CatalogProduct {
        label: "WattsNext ESS Cabinet 96 kWh",
        nominal_capacity_kwh: 96.0,
        usable_capacity_kwh: 96.46,
        unit_price_eur: 22_225.98,
        max_charge_kw: 48.0,
        max_discharge_kw: 48.0,
        round_trip_efficiency: 0.9,
        modular: true,
    },
    CatalogProduct {
        label: "ESS All-in-one Cabinet 261 kWh",
        nominal_capacity_kwh: 261.0,
        usable_capacity_kwh: 261.24,
        unit_price_eur: 43_995.96,
        max_charge_kw: 125.0,
        max_discharge_kw: 125.0,
        round_trip_efficiency: 0.9,
        modular: true,
    },
    CatalogProduct {
        label: "WattsNext All-in-one Container 2.09 MWh",
        nominal_capacity_kwh: 2_090.0,
        usable_capacity_kwh: 2_090.0,
        unit_price_eur: 318_658.06,
        max_charge_kw: 1_000.0,
        max_discharge_kw: 1_000.0,
        round_trip_efficiency: 0.9,
        modular: false,
    },
    CatalogProduct {
        label: "WattsNext All-in-one Container 5.015 MWh",
        nominal_capacity_kwh: 5_015.0,
        usable_capacity_kwh: 5_015.88,
        unit_price_eur: 727_302.60,
        max_charge_kw: 2_580.0,
        max_discharge_kw: 2_580.0,
        round_trip_efficiency: 0.88,
        modular: false,
    },
];

/// Upper bound on stacked units per modular base; beyond this a requirement
/// is reported infeasible instead of quoting an open-ended stack.
pub const MAX_MODULAR_UNITS: usize = 40;

/// Tolerance for matching a capacity to a fixed or single-cabinet product (kWh).
const FIXED_CAPACITY_TOLERANCE_KWH: f64 = 1.0;
/// Tolerance for recognizing an integer multiple of a modular unit size.
const MODULAR_TOLERANCE: f64 = 1e-6;

/// Modular base sizes in capacity-to-spec match order.
const MODULAR_MATCH_ORDER: &[f64] = &[261.0, 64.0, 96.0];

/// A feasible, priced battery configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CostedOption {
    pub label: String,
    /// Realized nominal capacity (kWh): `units * unit_capacity` for stacks.
    pub capacity_kwh: f64,
    pub units: usize,
    pub unit_capacity_kwh: f64,
    pub total_price_eur: f64,
}

/// Recommended and runner-up configurations for one capacity requirement.
#[derive(Debug, Clone, Serialize)]
pub struct CostSelection {
    pub recommended: CostedOption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<CostedOption>,
}

/// Searches the catalog for the minimum-cost configurations meeting a
/// capacity requirement.
///
/// For every modular base the smallest sufficient unit count (capped at
/// [`MAX_MODULAR_UNITS`]) is a candidate; fixed products qualify on capacity
/// alone. Candidates rank by total price ascending, then smallest capacity
/// overshoot, then smallest capacity. Undersized products are never
/// substituted: `None` means no configuration reaches the requirement.
pub fn select_minimum_cost_options(required_kwh: f64) -> Option<CostSelection> {
    let mut candidates: Vec<CostedOption> = Vec::new();

    for product in CATALOG {
        if product.modular {
            let units = (required_kwh / product.nominal_capacity_kwh).ceil().max(1.0) as usize;
            if units > MAX_MODULAR_UNITS {
                continue;
            }
            let capacity = units as f64 * product.nominal_capacity_kwh;
            if capacity < required_kwh {
                continue;
            }
            candidates.push(CostedOption {
                label: format!(
                    "{units}x {capacity} kWh (modulair)",
                    capacity = product.nominal_capacity_kwh
                ),
                capacity_kwh: capacity,
                units,
                unit_capacity_kwh: product.nominal_capacity_kwh,
                total_price_eur: units as f64 * product.unit_price_eur,
            });
        } else if product.nominal_capacity_kwh >= required_kwh {
            candidates.push(CostedOption {
                label: product.label.to_string(),
                capacity_kwh: product.nominal_capacity_kwh,
                units: 1,
                unit_capacity_kwh: product.nominal_capacity_kwh,
                total_price_eur: product.unit_price_eur,
            });
        }
    }

    candidates.sort_by(|a, b| {
        a.total_price_eur
            .total_cmp(&b.total_price_eur)
            .then_with(|| {
                (a.capacity_kwh - required_kwh).total_cmp(&(b.capacity_kwh - required_kwh))
            })
            .then_with(|| a.capacity_kwh.total_cmp(&b.capacity_kwh))
    });

    let mut iter = candidates.into_iter();
    let recommended = iter.next()?;
    debug!(
        required_kwh,
        recommended = %recommended.label,
        price_eur = recommended.total_price_eur,
        "selected minimum-cost configuration"
    );
    Some(CostSelection {
        recommended,
        alternative: iter.next(),
    })
}

fn is_near(value: f64, target: f64, tolerance: f64) -> bool {
    (value - target).abs() <= tolerance
}

fn find_product(nominal: f64) -> Option<&'static CatalogProduct> {
    CATALOG.iter().find(|p| p.nominal_capacity_kwh == nominal)
}

fn spec_of(product: &CatalogProduct) -> BatterySpec {
    BatterySpec {
        capacity_kwh: product.usable_capacity_kwh,
        max_charge_kw: product.max_charge_kw,
        max_discharge_kw: product.max_discharge_kw,
        round_trip_efficiency: product.round_trip_efficiency,
    }
}

/// Maps an arbitrary realized capacity back to power/efficiency specs.
///
/// Match order: fixed containers within 1 kWh, single cabinets within 1 kWh,
/// then integer multiples of a modular unit (power limits scaled linearly,
/// efficiency kept). Anything else falls back to a generic battery with a
/// half-capacity charge/discharge rate and 0.9 round-trip efficiency.
pub fn spec_for_capacity(capacity_kwh: f64) -> BatterySpec {
    if !capacity_kwh.is_finite() || capacity_kwh <= 0.0 {
        return BatterySpec {
            capacity_kwh: 0.0,
            max_charge_kw: 0.0,
            max_discharge_kw: 0.0,
            round_trip_efficiency: 0.9,
        };
    }

    for product in CATALOG.iter().filter(|p| !p.modular) {
        if is_near(capacity_kwh, product.nominal_capacity_kwh, FIXED_CAPACITY_TOLERANCE_KWH)
            || is_near(capacity_kwh, product.usable_capacity_kwh, FIXED_CAPACITY_TOLERANCE_KWH)
        {
            return spec_of(product);
        }
    }

    for product in CATALOG.iter().filter(|p| p.modular) {
        if is_near(capacity_kwh, product.nominal_capacity_kwh, FIXED_CAPACITY_TOLERANCE_KWH)
            || is_near(capacity_kwh, product.usable_capacity_kwh, FIXED_CAPACITY_TOLERANCE_KWH)
        {
            return spec_of(product);
        }
    }

    for base in MODULAR_MATCH_ORDER {
        let count_raw = capacity_kwh / base;
        let count = count_raw.round();
        if count >= 1.0 && is_near(count_raw, count, MODULAR_TOLERANCE) {
            if let Some(product) = find_product(*base) {
                return BatterySpec {
                    capacity_kwh,
                    max_charge_kw: product.max_charge_kw * count,
                    max_discharge_kw: product.max_discharge_kw * count,
                    round_trip_efficiency: product.round_trip_efficiency,
                };
            }
        }
    }

    BatterySpec {
        capacity_kwh,
        max_charge_kw: capacity_kwh / 2.0,
        max_discharge_kw: capacity_kwh / 2.0,
        round_trip_efficiency: 0.9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chooses_two_261_cabinets_for_500_kwh() {
        let selection = select_minimum_cost_options(500.0).expect("feasible");
        assert_eq!(selection.recommended.label, "2x 261 kWh (modulair)");
        assert_eq!(selection.recommended.capacity_kwh, 522.0);
        assert!((selection.recommended.total_price_eur - 87_991.92).abs() < 0.005);
    }

    #[test]
    fn chooses_the_small_container_for_2000_kwh() {
        let selection = select_minimum_cost_options(2000.0).expect("feasible");
        assert_eq!(
            selection.recommended.label,
            "WattsNext All-in-one Container 2.09 MWh"
        );
        assert_eq!(selection.recommended.capacity_kwh, 2090.0);
        assert!((selection.recommended.total_price_eur - 318_658.06).abs() < 0.005);
    }

    #[test]
    fn modular_stack_beats_the_large_container_at_2600_kwh() {
        let selection = select_minimum_cost_options(2600.0).expect("feasible");
        assert_eq!(selection.recommended.label, "10x 261 kWh (modulair)");
        assert_eq!(selection.recommended.capacity_kwh, 2610.0);
        assert!((selection.recommended.total_price_eur - 439_959.60).abs() < 0.005);
    }

    #[test]
    fn one_96_beats_two_64_at_70_kwh() {
        let selection = select_minimum_cost_options(70.0).expect("feasible");
        assert_eq!(selection.recommended.label, "1x 96 kWh (modulair)");
        assert_eq!(selection.recommended.capacity_kwh, 96.0);
        assert!((selection.recommended.total_price_eur - 22_225.98).abs() < 0.005);
    }

    #[test]
    fn never_recommends_below_the_requirement() {
        for required in [1.0, 70.0, 500.0, 2000.0, 2600.0, 5000.0] {
            let selection = select_minimum_cost_options(required).expect("feasible");
            assert!(selection.recommended.capacity_kwh >= required);
            if let Some(alternative) = &selection.alternative {
                assert!(alternative.capacity_kwh >= required);
            }
        }
    }

    #[test]
    fn infeasible_requirement_is_reported_not_substituted() {
        // Above every fixed product and every capped modular stack.
        assert!(select_minimum_cost_options(20_000.0).is_none());
    }

    #[test]
    fn alternative_is_the_second_cheapest_feasible_option() {
        let selection = select_minimum_cost_options(500.0).expect("feasible");
        let alternative = selection.alternative.expect("second candidate exists");
        assert!(alternative.total_price_eur >= selection.recommended.total_price_eur);
        // 8x 64 kWh at 128 507.44 is the runner-up behind 2x 261 kWh.
        assert_eq!(alternative.label, "8x 64 kWh (modulair)");
    }

    #[test]
    fn spec_for_single_cabinets_matches_the_brochure() {
        let spec = spec_for_capacity(64.0);
        assert_eq!(spec.max_charge_kw, 32.0);
        assert_eq!(spec.max_discharge_kw, 30.0);
        assert_eq!(spec.round_trip_efficiency, 0.9);
    }

    #[test]
    fn spec_scales_modular_multiples_linearly() {
        let spec128 = spec_for_capacity(128.0);
        assert_eq!(spec128.max_charge_kw, 64.0);
        assert_eq!(spec128.max_discharge_kw, 60.0);
        assert_eq!(spec128.round_trip_efficiency, 0.9);

        let spec522 = spec_for_capacity(522.0);
        assert_eq!(spec522.max_charge_kw, 250.0);
        assert_eq!(spec522.max_discharge_kw, 250.0);
    }

    #[test]
    fn spec_for_fixed_containers_matches_usable_capacity() {
        let spec = spec_for_capacity(5_015.88);
        assert_eq!(spec.max_charge_kw, 2_580.0);
        assert_eq!(spec.round_trip_efficiency, 0.88);
        let near = spec_for_capacity(2_090.4);
        assert_eq!(near.max_discharge_kw, 1_000.0);
    }

    #[test]
    fn unknown_capacity_falls_back_to_generic_spec() {
        let spec = spec_for_capacity(300.0);
        assert_eq!(spec.capacity_kwh, 300.0);
        assert_eq!(spec.max_charge_kw, 150.0);
        assert_eq!(spec.max_discharge_kw, 150.0);
        assert_eq!(spec.round_trip_efficiency, 0.9);
    }

    #[test]
    fn degenerate_capacity_yields_zero_spec() {
        let spec = spec_for_capacity(0.0);
        assert_eq!(spec.capacity_kwh, 0.0);
        assert_eq!(spec.max_charge_kw, 0.0);
        let nan = spec_for_capacity(f64::NAN);
        assert_eq!(nan.capacity_kwh, 0.0);
    }
}
