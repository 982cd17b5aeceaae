//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
//! Cooling-chain sizing that produces the consumers the balancer works on.
//!
//! Every stage sizes `required + spare` identical units: each unit is rated
//! for its share of the stage power across the required count and runs at
//! its share across the total count.

use dcpower_common::config::{PlantConfig, MAX_WHITESPACES};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{EngineError, Result},
    model::{Consumer, ConsumerCategory},
    redundancy::{parse_redundancy, Redundancy},
};

const RHO_AIR: f64 = 1.2;
const CP_AIR: f64 = 1005.0;
const RHO_WATER: f64 = 1000.0;
const CP_WATER: f64 = 4180.0;
const GRAVITY: f64 = 9.81;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Whitespace {
    pub id: u32,
    pub it_load_kw: f64,
    pub row_ids: Vec<String>,
}

/// Units of one cooling stage plus the heat it hands to the next stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StageSizing {
    pub units: Vec<Consumer>,
    pub heat_out_kw: f64,
    pub power_kw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThermalCascade {
    pub fan_power_kw: f64,
    pub pump_power_kw: f64,
    pub chiller_power_kw: f64,
    /// Heat leaving the CRAH stage into the chilled-water loop.
    pub crah_heat_out_kw: f64,
    /// Heat arriving at the chillers after pump work.
    pub pump_heat_out_kw: f64,
    pub condenser_heat_kw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantSizing {
    pub whitespaces: Vec<Whitespace>,
    /// IT rows, CRAH units, pumps, then chillers.
    pub consumers: Vec<Consumer>,
    pub thermal: ThermalCascade,
}

fn label(category: ConsumerCategory, number: usize) -> String {
    format!("{}{}", category.label_prefix(), number)
}

/// Builds `redundancy.total()` identical units sharing `stage_power_kw`.
fn stage_units(
    category: ConsumerCategory,
    stage_power_kw: f64,
    redundancy: Redundancy,
    first_number: usize,
) -> Vec<Consumer> {
    let capacity_kw = stage_power_kw / redundancy.live as f64;
    let load_kw = stage_power_kw / redundancy.total() as f64;
    (0..redundancy.total())
        .map(|i| Consumer::new(label(category, first_number + i), category, load_kw, capacity_kw))
        .collect()
}

/// Splits the IT load evenly over whitespaces and then over rows.
pub fn distribute_it_load(
    it_load_kw: f64,
    whitespaces: u32,
    rows: Redundancy,
) -> (Vec<Whitespace>, Vec<Consumer>) {
    let whitespaces = whitespaces.max(1);
    let per_whitespace = it_load_kw.max(0.0) / whitespaces as f64;

    let mut spaces = Vec::with_capacity(whitespaces as usize);
    let mut units = Vec::with_capacity(whitespaces as usize * rows.total());
    for ws_id in 1..=whitespaces {
        let first = units.len() + 1;
        let ws_rows: Vec<Consumer> =
            stage_units(ConsumerCategory::ItRow, per_whitespace, rows, first)
                .into_iter()
                .map(|row| row.with_whitespace(ws_id))
                .collect();
        spaces.push(Whitespace {
            id: ws_id,
            it_load_kw: per_whitespace,
            row_ids: ws_rows.iter().map(|r| r.id.clone()).collect(),
        });
        units.extend(ws_rows);
    }
    (spaces, units)
}

fn fan_power_kw(
    it_load_kw: f64,
    dt_air_k: f64,
    static_pressure_pa: f64,
    eta_fan: f64,
    eta_motor: f64,
) -> f64 {
    let mass_flow = it_load_kw * 1000.0 / (CP_AIR * dt_air_k.max(1e-6));
    let volume_flow = mass_flow / RHO_AIR;
    let eta = (eta_fan * eta_motor).max(1e-3);
    volume_flow * static_pressure_pa / eta / 1000.0
}

/// Sizes CRAH units per whitespace, numbering them across the whole plant.
pub fn size_crah(
    whitespaces: &[Whitespace],
    dt_air_k: f64,
    static_pressure_pa: f64,
    eta_fan: f64,
    eta_motor: f64,
    redundancy: Redundancy,
) -> StageSizing {
    let mut stage = StageSizing::default();
    for ws in whitespaces.iter().filter(|ws| ws.it_load_kw > 0.0) {
        let fan_kw = fan_power_kw(ws.it_load_kw, dt_air_k, static_pressure_pa, eta_fan, eta_motor);
        let first = stage.units.len() + 1;
        stage.units.extend(
            stage_units(ConsumerCategory::Crah, fan_kw, redundancy, first)
                .into_iter()
                .map(|unit| unit.with_whitespace(ws.id)),
        );
        stage.power_kw += fan_kw;
        stage.heat_out_kw += ws.it_load_kw + fan_kw;
    }
    stage
}

pub fn size_pumps(
    heat_in_kw: f64,
    dt_water_k: f64,
    head_m: f64,
    eta_pump: f64,
    eta_motor: f64,
    redundancy: Redundancy,
) -> StageSizing {
    if heat_in_kw <= 0.0 {
        return StageSizing {
            heat_out_kw: heat_in_kw,
            ..StageSizing::default()
        };
    }
    let mass_flow = if dt_water_k > 0.0 {
        heat_in_kw * 1000.0 / (CP_WATER * dt_water_k)
    } else {
        0.0
    };
    let volume_flow = mass_flow / RHO_WATER;
    let head_m = head_m.max(0.0);
    let hydraulic_kw = RHO_WATER * GRAVITY * head_m * volume_flow / 1000.0;
    let eta = (eta_pump * eta_motor).max(1e-3);
    let power_kw = if head_m > 0.0 && mass_flow > 0.0 {
        hydraulic_kw / eta
    } else {
        0.0
    };

    StageSizing {
        units: stage_units(ConsumerCategory::Pump, power_kw, redundancy, 1),
        heat_out_kw: heat_in_kw + power_kw,
        power_kw,
    }
}

pub fn size_chillers(heat_in_kw: f64, cop: f64, redundancy: Redundancy) -> StageSizing {
    if heat_in_kw <= 0.0 || cop <= 0.0 {
        return StageSizing {
            heat_out_kw: heat_in_kw,
            ..StageSizing::default()
        };
    }
    let power_kw = heat_in_kw / cop;
    StageSizing {
        units: stage_units(ConsumerCategory::Chiller, power_kw, redundancy, 1),
        heat_out_kw: heat_in_kw + power_kw,
        power_kw,
    }
}

/// Runs the full IT -> CRAH -> pump -> chiller chain for a plant.
pub fn size_plant(plant: &PlantConfig) -> Result<PlantSizing> {
    let rows = parse_redundancy(&plant.row_redundancy)?;
    let crah = parse_redundancy(&plant.crah_redundancy)?;
    let pumps = parse_redundancy(&plant.pump_redundancy)?;
    let chillers = parse_redundancy(&plant.chiller_redundancy)?;
    if plant.whitespaces == 0 || plant.whitespaces > MAX_WHITESPACES {
        return Err(EngineError::InvalidPlant(format!(
            "whitespace count {} is outside 1..={}",
            plant.whitespaces, MAX_WHITESPACES
        )));
    }

    let (whitespaces, it_rows) = distribute_it_load(plant.it_load_kw, plant.whitespaces, rows);
    let crah_stage = size_crah(
        &whitespaces,
        plant.dt_air_k,
        plant.static_pressure_pa,
        plant.eta_fan,
        plant.eta_motor,
        crah,
    );
    let pump_stage = size_pumps(
        crah_stage.heat_out_kw,
        plant.dt_water_k,
        plant.pump_head_m,
        plant.eta_pump,
        plant.eta_pump_motor,
        pumps,
    );
    let chiller_stage = size_chillers(pump_stage.heat_out_kw, plant.cop_chiller, chillers);

    let thermal = ThermalCascade {
        fan_power_kw: crah_stage.power_kw,
        pump_power_kw: pump_stage.power_kw,
        chiller_power_kw: chiller_stage.power_kw,
        crah_heat_out_kw: crah_stage.heat_out_kw,
        pump_heat_out_kw: pump_stage.heat_out_kw,
        condenser_heat_kw: chiller_stage.heat_out_kw,
    };

    let mut consumers = it_rows;
    consumers.extend(crah_stage.units);
    consumers.extend(pump_stage.units);
    consumers.extend(chiller_stage.units);

    info!(
        it_load_kw = plant.it_load_kw,
        consumers = consumers.len(),
        condenser_heat_kw = thermal.condenser_heat_kw,
        "plant sized"
    );

    Ok(PlantSizing {
        whitespaces,
        consumers,
        thermal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn it_rows_are_numbered_across_whitespaces() {
        let rows = Redundancy { live: 2, standby: 1 };
        let (spaces, units) = distribute_it_load(300.0, 2, rows);
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces[1].row_ids, ["ITR4", "ITR5", "ITR6"]);
        assert!(close(spaces[0].it_load_kw, 150.0));
        assert!(units.iter().all(|u| close(u.load_kw, 50.0) && close(u.capacity_kw, 75.0)));
        assert_eq!(units[3].whitespace, Some(2));
    }

    #[test]
    fn crah_fan_power_follows_air_side_balance() {
        let (spaces, _) = distribute_it_load(100.0, 1, Redundancy { live: 1, standby: 0 });
        let stage = size_crah(&spaces, 10.0, 300.0, 0.6, 0.95, Redundancy { live: 3, standby: 1 });
        // 100 kW over 10 K: 9.950 kg/s, 8.292 m3/s, 300 Pa at 57% -> 4.364 kW
        let expected = 100_000.0 / (1005.0 * 10.0) / 1.2 * 300.0 / (0.6 * 0.95) / 1000.0;
        assert!(close(stage.power_kw, expected));
        assert_eq!(stage.units.len(), 4);
        assert!(close(stage.units[0].capacity_kw, expected / 3.0));
        assert!(close(stage.units[0].load_kw, expected / 4.0));
        assert!(close(stage.heat_out_kw, 100.0 + expected));
        assert_eq!(stage.units[3].id, "CRAH4");
    }

    #[test]
    fn pumps_without_head_draw_nothing_but_still_exist() {
        let stage = size_pumps(500.0, 6.0, 0.0, 0.75, 0.95, Redundancy { live: 2, standby: 1 });
        assert_eq!(stage.units.len(), 3);
        assert!(stage.units.iter().all(|u| u.load_kw == 0.0));
        assert!(close(stage.heat_out_kw, 500.0));
    }

    #[test]
    fn chillers_skip_when_no_heat_or_cop() {
        let redundancy = Redundancy { live: 3, standby: 1 };
        assert!(size_chillers(0.0, 5.0, redundancy).units.is_empty());
        assert!(size_chillers(100.0, 0.0, redundancy).units.is_empty());
        let stage = size_chillers(500.0, 5.0, redundancy);
        assert!(close(stage.power_kw, 100.0));
        assert!(close(stage.heat_out_kw, 600.0));
        assert_eq!(stage.units[0].id, "CHLR1");
    }

    #[test]
    fn default_plant_produces_full_consumer_chain() {
        let sizing = size_plant(&PlantConfig::default()).unwrap();
        // 2 whitespaces x 8 rows, 2 x 4 CRAH, 4 pumps, 4 chillers
        assert_eq!(sizing.consumers.len(), 16 + 8 + 4 + 4);
        let it_load: f64 = sizing
            .consumers
            .iter()
            .filter(|c| c.category == ConsumerCategory::ItRow)
            .map(|c| c.load_kw)
            .sum();
        assert!(close(it_load, 400.0));
        assert!(sizing.thermal.crah_heat_out_kw > 400.0);
        assert!(sizing.thermal.pump_heat_out_kw > sizing.thermal.crah_heat_out_kw);
        assert!(sizing.thermal.condenser_heat_kw > sizing.thermal.pump_heat_out_kw);
        assert!(sizing.consumers.iter().all(|c| c.capacity_kw >= c.load_kw));
    }

    #[test]
    fn whitespace_count_is_bounded() {
        for whitespaces in [0, MAX_WHITESPACES + 1, u32::MAX] {
            let plant = PlantConfig {
                whitespaces,
                ..PlantConfig::default()
            };
            let err = size_plant(&plant).unwrap_err();
            assert!(matches!(err, EngineError::InvalidPlant(_)), "{whitespaces} gave {err:?}");
            assert!(plant.validate().is_err());
        }
        let oversized_rows = PlantConfig {
            row_redundancy: "100000000000+0".into(),
            ..PlantConfig::default()
        };
        assert!(matches!(
            size_plant(&oversized_rows),
            Err(EngineError::InvalidRedundancy { .. })
        ));
    }

    #[test]
    fn malformed_stage_redundancy_is_a_configuration_error() {
        let plant = PlantConfig {
            pump_redundancy: "three".into(),
            ..PlantConfig::default()
        };
        let err = size_plant(&plant).unwrap_err();
        assert!(err.is_configuration());
    }
}
