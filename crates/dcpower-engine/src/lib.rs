//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
pub mod api;
pub mod balancer;
pub mod errors;
pub mod failure;
pub mod io;
pub mod model;
pub mod redundancy;
pub mod reports;
pub mod sizing;

use dcpower_common::config::PlantConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    balancer::balance_strings,
    failure::{simulate_all_failures, simulate_failure, FailureImpact},
    model::{Consumer, PowerStringAggregate, StringId},
    redundancy::{parse_redundancy, Redundancy},
    reports::{build_report, PowerStringReport, ReportExporter},
    sizing::{size_plant, PlantSizing},
};

pub use errors::{EngineError, Result};

/// Balancing, failure scenarios and the report built from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringStudy {
    pub aggregate: PowerStringAggregate,
    pub impacts: Vec<FailureImpact>,
    pub report: PowerStringReport,
}

impl StringStudy {
    pub fn exporter(&self) -> ReportExporter<'_> {
        self.report.exporter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantStudy {
    pub sizing: PlantSizing,
    pub study: StringStudy,
}

impl PlantStudy {
    pub fn exporter(&self) -> ReportExporter<'_> {
        self.study.report.exporter().with_sizing(&self.sizing)
    }
}

/// Balances `consumers` and simulates either the named failure or every
/// live string in turn.
pub fn analyze_consumers(
    consumers: &[Consumer],
    redundancy: Redundancy,
    failed: Option<StringId>,
) -> Result<StringStudy> {
    let aggregate = balance_strings(consumers, redundancy)?;
    let impacts = match failed {
        Some(id) => vec![simulate_failure(&aggregate, id)?],
        None => simulate_all_failures(&aggregate),
    };
    let report = build_report(&aggregate, &impacts);
    info!(
        run_id = %report.run_id,
        scenarios = impacts.len(),
        "power string study complete"
    );
    Ok(StringStudy {
        aggregate,
        impacts,
        report,
    })
}

/// Sizes the cooling chain and runs the string study on its consumers.
pub fn analyze_plant(plant: &PlantConfig) -> Result<PlantStudy> {
    let redundancy = parse_redundancy(&plant.string_redundancy)?;
    let sizing = size_plant(plant)?;
    let study = analyze_consumers(
        &sizing.consumers,
        redundancy,
        plant.failed_string.map(StringId),
    )?;
    Ok(PlantStudy { sizing, study })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConsumerCategory;

    fn consumers() -> Vec<Consumer> {
        vec![
            Consumer::new("A", ConsumerCategory::ItRow, 100.0, 120.0),
            Consumer::new("B", ConsumerCategory::Crah, 80.0, 100.0),
            Consumer::new("C", ConsumerCategory::Pump, 60.0, 75.0),
            Consumer::new("D", ConsumerCategory::Chiller, 40.0, 50.0),
        ]
    }

    #[test]
    fn sweep_produces_one_scenario_per_live_string() {
        let study = analyze_consumers(&consumers(), Redundancy { live: 2, standby: 1 }, None).unwrap();
        assert_eq!(study.impacts.len(), 2);
        assert_eq!(study.report.scenarios.len(), 2);
        assert_eq!(study.report.strings.len(), 3);
    }

    #[test]
    fn named_failure_limits_scenarios() {
        let study = analyze_consumers(
            &consumers(),
            Redundancy { live: 2, standby: 1 },
            Some(StringId(3)),
        )
        .unwrap();
        assert_eq!(study.impacts.len(), 1);
        assert_eq!(study.impacts[0].failed, StringId(3));
        assert!(study.impacts[0].displaced.is_empty());
    }

    #[test]
    fn unknown_failed_string_is_rejected() {
        let err = analyze_consumers(
            &consumers(),
            Redundancy { live: 2, standby: 0 },
            Some(StringId(5)),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownString(StringId(5))));
        assert!(err.is_configuration());
    }

    #[test]
    fn plant_study_balances_every_sized_consumer() {
        let plant = PlantConfig::default();
        let study = analyze_plant(&plant).unwrap();
        let assigned: usize = study
            .study
            .aggregate
            .live_strings()
            .map(|s| s.consumers.len())
            .sum();
        assert_eq!(assigned, study.sizing.consumers.len());
        assert_eq!(study.study.aggregate.redundancy.to_string(), plant.string_redundancy);
    }
}
