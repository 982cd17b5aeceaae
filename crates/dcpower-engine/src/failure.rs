//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    balancer::least_loaded,
    errors::{EngineError, Result},
    model::{ConsumerCategory, PowerStringAggregate, StringId, StringStatus},
};

/// Where a displaced consumer ends up when its primary string is lost.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RerouteOutcome {
    /// The consumer's secondary feed survived and takes the load.
    SecondaryFeed { destination: StringId },
    /// No usable secondary; the least-loaded survivor at that point takes it.
    LeastLoadedSurvivor { destination: StringId },
    /// Nothing survived to carry the load.
    Unserved,
}

impl RerouteOutcome {
    pub fn destination(&self) -> Option<StringId> {
        match self {
            RerouteOutcome::SecondaryFeed { destination }
            | RerouteOutcome::LeastLoadedSurvivor { destination } => Some(*destination),
            RerouteOutcome::Unserved => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reroute {
    pub consumer_id: String,
    pub category: ConsumerCategory,
    pub load_kw: f64,
    pub outcome: RerouteOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurvivorLoad {
    pub string: StringId,
    pub status: StringStatus,
    pub baseline_load_kw: f64,
    pub rerouted_load_kw: f64,
    pub load_kw: f64,
    pub capacity_kw: f64,
    pub overloaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureWarning {
    NoSurvivingLiveString,
    Overload {
        string: StringId,
        load_kw: f64,
        capacity_kw: f64,
    },
    UnservedLoad {
        consumers: usize,
        load_kw: f64,
    },
}

impl fmt::Display for FailureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureWarning::NoSurvivingLiveString => write!(f, "no surviving live string"),
            FailureWarning::Overload {
                string,
                load_kw,
                capacity_kw,
            } => write!(
                f,
                "{} overloaded: {:.1} kW against {:.1} kW capacity",
                string, load_kw, capacity_kw
            ),
            FailureWarning::UnservedLoad { consumers, load_kw } => write!(
                f,
                "{} consumer(s) without a surviving feed, {:.1} kW unserved",
                consumers, load_kw
            ),
        }
    }
}

/// Result of removing one string from the topology.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureImpact {
    pub failed: StringId,
    pub failed_status: StringStatus,
    /// Load the failed string carried before the failure.
    pub failed_load_kw: f64,
    /// Displaced consumers in balancing order.
    pub displaced: Vec<Reroute>,
    /// Every string other than the failed one, in string order.
    pub survivors: Vec<SurvivorLoad>,
    pub surviving_live_strings: usize,
    pub unserved_load_kw: f64,
    pub design_capacity_per_string_kw: f64,
    pub warnings: Vec<FailureWarning>,
}

impl FailureImpact {
    pub fn rerouted_load_kw(&self) -> f64 {
        self.displaced
            .iter()
            .filter(|r| r.outcome.destination().is_some())
            .map(|r| r.load_kw)
            .sum()
    }

    pub fn no_surviving_live_string(&self) -> bool {
        self.surviving_live_strings == 0
    }

    pub fn overloaded_strings(&self) -> Vec<StringId> {
        self.survivors
            .iter()
            .filter(|s| s.overloaded)
            .map(|s| s.string)
            .collect()
    }

    pub fn survivor(&self, id: StringId) -> Option<&SurvivorLoad> {
        self.survivors.iter().find(|s| s.string == id)
    }
}

/// Simulates the loss of every live string in turn.
pub fn simulate_all_failures(aggregate: &PowerStringAggregate) -> Vec<FailureImpact> {
    aggregate
        .live_strings()
        .map(|s| reroute_after_failure(aggregate, s.id.index()))
        .collect()
}

/// Simulates the loss of a single string, live or standby.
pub fn simulate_failure(
    aggregate: &PowerStringAggregate,
    failed: StringId,
) -> Result<FailureImpact> {
    if failed.0 == 0 || failed.0 > aggregate.strings.len() {
        return Err(EngineError::UnknownString(failed));
    }
    Ok(reroute_after_failure(aggregate, failed.index()))
}

fn reroute_after_failure(aggregate: &PowerStringAggregate, failed_idx: usize) -> FailureImpact {
    let failed = &aggregate.strings[failed_idx];
    let index = aggregate.consumer_index();

    let survivor_indices: Vec<usize> = (0..aggregate.strings.len())
        .filter(|&idx| idx != failed_idx)
        .collect();
    let mut running: Vec<f64> = aggregate.strings.iter().map(|s| s.load_kw).collect();
    let mut rerouted = vec![0.0f64; aggregate.strings.len()];

    let mut displaced = Vec::with_capacity(failed.consumers.len());
    let mut unserved_load_kw = 0.0;
    let mut unserved_count = 0usize;

    // Strings list their consumers in balancing order, so reroutes are
    // applied in that order and each one sees the totals left by the last.
    for consumer_id in &failed.consumers {
        let Some(&consumer_idx) = index.get(consumer_id.as_str()) else {
            warn!(consumer = %consumer_id, string = %failed.id, "string references unknown consumer");
            continue;
        };
        let consumer = &aggregate.consumers[consumer_idx];
        let secondary = aggregate.assignments[consumer_idx]
            .secondary
            .filter(|s| s.0 > 0)
            .map(|s| s.index())
            .filter(|&idx| idx != failed_idx && idx < aggregate.strings.len());

        let outcome = match secondary {
            Some(idx) => {
                running[idx] += consumer.load_kw;
                rerouted[idx] += consumer.load_kw;
                RerouteOutcome::SecondaryFeed {
                    destination: StringId::from_index(idx),
                }
            }
            None => match least_loaded(survivor_indices.iter().copied(), |i| running[i]) {
                Some(idx) => {
                    running[idx] += consumer.load_kw;
                    rerouted[idx] += consumer.load_kw;
                    RerouteOutcome::LeastLoadedSurvivor {
                        destination: StringId::from_index(idx),
                    }
                }
                None => {
                    unserved_load_kw += consumer.load_kw;
                    unserved_count += 1;
                    RerouteOutcome::Unserved
                }
            },
        };

        debug!(failed = %failed.id, consumer = %consumer.id, ?outcome, "rerouted consumer");
        displaced.push(Reroute {
            consumer_id: consumer.id.clone(),
            category: consumer.category,
            load_kw: consumer.load_kw,
            outcome,
        });
    }

    let survivors: Vec<SurvivorLoad> = survivor_indices
        .iter()
        .map(|&idx| {
            let string = &aggregate.strings[idx];
            SurvivorLoad {
                string: string.id,
                status: string.status,
                baseline_load_kw: string.load_kw,
                rerouted_load_kw: rerouted[idx],
                load_kw: running[idx],
                capacity_kw: string.capacity_kw,
                overloaded: running[idx] > string.capacity_kw,
            }
        })
        .collect();

    let surviving_live_strings = survivors
        .iter()
        .filter(|s| matches!(s.status, StringStatus::Live))
        .count();
    let required = aggregate.redundancy.live.min(survivors.len()).max(1);
    let design_capacity_per_string_kw = aggregate.total_capacity_kw / required as f64;

    let mut warnings = Vec::new();
    if surviving_live_strings == 0 && matches!(failed.status, StringStatus::Live) {
        warn!(failed = %failed.id, "no surviving live string");
        warnings.push(FailureWarning::NoSurvivingLiveString);
    }
    for survivor in survivors.iter().filter(|s| s.overloaded) {
        warn!(failed = %failed.id, string = %survivor.string, load_kw = survivor.load_kw, capacity_kw = survivor.capacity_kw, "survivor overloaded after failure");
        warnings.push(FailureWarning::Overload {
            string: survivor.string,
            load_kw: survivor.load_kw,
            capacity_kw: survivor.capacity_kw,
        });
    }
    if unserved_count > 0 {
        warnings.push(FailureWarning::UnservedLoad {
            consumers: unserved_count,
            load_kw: unserved_load_kw,
        });
    }

    info!(
        failed = %failed.id,
        displaced = displaced.len(),
        failed_load_kw = failed.load_kw,
        warnings = warnings.len(),
        "string failure simulated"
    );

    FailureImpact {
        failed: failed.id,
        failed_status: failed.status,
        failed_load_kw: failed.load_kw,
        displaced,
        survivors,
        surviving_live_strings,
        unserved_load_kw,
        design_capacity_per_string_kw,
        warnings,
    }
}
