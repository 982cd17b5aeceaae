//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    errors::{EngineError, Result},
    model::{
        Consumer, FeedAssignment, PowerString, PowerStringAggregate, StringId, StringStatus,
    },
    redundancy::{parse_redundancy, Redundancy},
};

/// Balances `consumers` across the strings described by `spec` (`"N+M"`).
pub fn balance_strings_spec(consumers: &[Consumer], spec: &str) -> Result<PowerStringAggregate> {
    let redundancy = parse_redundancy(spec)?;
    balance_strings(consumers, redundancy)
}

/// Assigns every consumer a primary live string using greedy longest-first
/// balancing and, when standby strings exist, a secondary feed on the
/// standby string with the least secondary load.
///
/// Pinned feeds on a consumer are honoured before any greedy placement, so
/// the heuristic balances the remaining consumers around them. An unpinned
/// primary never lands on the consumer's pinned secondary.
///
/// Ties between equal loads go to the consumer listed first; ties between
/// equally loaded strings go to the lowest string number.
pub fn balance_strings(
    consumers: &[Consumer],
    redundancy: Redundancy,
) -> Result<PowerStringAggregate> {
    redundancy.validate()?;
    validate_consumers(consumers, redundancy)?;

    let mut strings: Vec<PowerString> = (0..redundancy.total())
        .map(|idx| {
            let status = if idx < redundancy.live {
                StringStatus::Live
            } else {
                StringStatus::Standby
            };
            PowerString::new(StringId::from_index(idx), status)
        })
        .collect();

    // Loads are validated finite, so only signed zeros compare unequal under
    // `total_cmp`; `partial_cmp` keeps them in input order.
    let mut balance_order: Vec<usize> = (0..consumers.len()).collect();
    balance_order.sort_by(|&a, &b| {
        consumers[b]
            .load_kw
            .partial_cmp(&consumers[a].load_kw)
            .unwrap_or(Ordering::Equal)
    });

    let mut primaries: Vec<Option<usize>> = consumers
        .iter()
        .map(|c| c.primary.map(|id| id.index()))
        .collect();
    let mut secondaries: Vec<Option<usize>> = consumers
        .iter()
        .map(|c| c.secondary.map(|id| id.index()))
        .collect();

    for &idx in &balance_order {
        let consumer = &consumers[idx];
        if let Some(primary) = primaries[idx] {
            strings[primary].load_kw += consumer.load_kw;
            strings[primary].capacity_kw += consumer.capacity_kw;
        }
        if let Some(secondary) = secondaries[idx] {
            strings[secondary].secondary_load_kw += consumer.load_kw;
        }
    }

    let live = 0..redundancy.live;
    let standby = redundancy.live..redundancy.total();

    for &idx in &balance_order {
        let consumer = &consumers[idx];

        if primaries[idx].is_none() {
            let avoid = secondaries[idx];
            let primary = least_loaded(
                live.clone().filter(|&i| Some(i) != avoid),
                |i| strings[i].load_kw,
            )
            .ok_or_else(|| EngineError::InvalidConsumer {
                id: consumer.id.clone(),
                reason: "secondary feed leaves no live string for the primary".into(),
            })?;
            strings[primary].load_kw += consumer.load_kw;
            strings[primary].capacity_kw += consumer.capacity_kw;
            primaries[idx] = Some(primary);
        }

        if secondaries[idx].is_none() {
            let secondary = least_loaded(standby.clone(), |i| strings[i].secondary_load_kw);
            if let Some(secondary) = secondary {
                strings[secondary].secondary_load_kw += consumer.load_kw;
            }
            secondaries[idx] = secondary;
        }
    }

    let mut assignments = Vec::with_capacity(consumers.len());
    for (idx, consumer) in consumers.iter().enumerate() {
        let primary = primaries[idx].ok_or(EngineError::NoLiveStrings)?;
        assignments.push(FeedAssignment {
            consumer_id: consumer.id.clone(),
            primary: StringId::from_index(primary),
            secondary: secondaries[idx].map(StringId::from_index),
        });
    }
    for &idx in &balance_order {
        let assignment = &assignments[idx];
        strings[assignment.primary.index()]
            .consumers
            .push(consumers[idx].id.clone());
        debug!(
            consumer = %assignment.consumer_id,
            load_kw = consumers[idx].load_kw,
            primary = %assignment.primary,
            secondary = ?assignment.secondary,
            pinned = consumers[idx].primary.is_some(),
            "assigned consumer feed"
        );
    }

    let total_load_kw: f64 = consumers.iter().map(|c| c.load_kw).sum();
    let total_capacity_kw: f64 = consumers.iter().map(|c| c.capacity_kw).sum();
    let design_capacity_per_string_kw = total_capacity_kw / redundancy.live as f64;

    for string in strings.iter_mut().filter(|s| !s.is_live()) {
        string.capacity_kw = design_capacity_per_string_kw;
    }

    let aggregate = PowerStringAggregate {
        redundancy,
        strings,
        consumers: consumers.to_vec(),
        assignments,
        balance_order,
        total_load_kw,
        total_capacity_kw,
        design_capacity_per_string_kw,
    };

    for warning in aggregate.capacity_warnings() {
        warn!(
            string = %warning.string,
            load_kw = warning.load_kw,
            capacity_kw = warning.capacity_kw,
            "string load exceeds assigned capacity"
        );
    }
    info!(
        redundancy = %redundancy,
        consumers = consumers.len(),
        total_load_kw,
        total_capacity_kw,
        "power strings balanced"
    );

    Ok(aggregate)
}

/// Index of the lowest key in `candidates`, first index winning ties.
pub(crate) fn least_loaded(
    candidates: impl IntoIterator<Item = usize>,
    load: impl Fn(usize) -> f64,
) -> Option<usize> {
    candidates.into_iter().fold(None, |best, idx| match best {
        Some(current) if load(current) <= load(idx) => Some(current),
        _ => Some(idx),
    })
}

fn validate_consumers(consumers: &[Consumer], redundancy: Redundancy) -> Result<()> {
    let mut seen = HashSet::with_capacity(consumers.len());
    for consumer in consumers {
        consumer.validate()?;
        for pinned in [consumer.primary, consumer.secondary].into_iter().flatten() {
            if pinned.0 == 0 || pinned.0 > redundancy.total() {
                return Err(EngineError::UnknownString(pinned));
            }
        }
        if let Some(primary) = consumer.primary {
            if primary.index() >= redundancy.live {
                return Err(EngineError::InvalidConsumer {
                    id: consumer.id.clone(),
                    reason: format!("primary feed {primary} is a standby string"),
                });
            }
        }
        if !seen.insert(consumer.id.as_str()) {
            return Err(EngineError::DuplicateConsumer(consumer.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConsumerCategory;

    fn consumer(id: &str, load: f64) -> Consumer {
        Consumer::new(id, ConsumerCategory::ItRow, load, load * 1.25)
    }

    fn abcd() -> Vec<Consumer> {
        vec![
            consumer("A", 100.0),
            consumer("B", 80.0),
            consumer("C", 60.0),
            consumer("D", 40.0),
        ]
    }

    #[test]
    fn greedy_longest_first_balances_two_live_strings() {
        let aggregate = balance_strings_spec(&abcd(), "2+0").unwrap();

        let primary = |id: &str| aggregate.assignment(id).unwrap().primary;
        assert_eq!(primary("A"), StringId(1));
        assert_eq!(primary("B"), StringId(2));
        assert_eq!(primary("C"), StringId(2));
        assert_eq!(primary("D"), StringId(1));
        assert_eq!(aggregate.strings[0].load_kw, 140.0);
        assert_eq!(aggregate.strings[1].load_kw, 140.0);
        assert_eq!(aggregate.strings[0].consumers, ["A", "D"]);
        assert_eq!(aggregate.strings[1].consumers, ["B", "C"]);
        assert!(aggregate.assignments.iter().all(|a| a.secondary.is_none()));
    }

    #[test]
    fn equal_loads_keep_input_order_and_lowest_string() {
        let consumers = vec![consumer("x", 10.0), consumer("y", 10.0), consumer("z", 10.0)];
        let aggregate = balance_strings_spec(&consumers, "2+0").unwrap();
        assert_eq!(aggregate.balance_order, [0, 1, 2]);
        assert_eq!(aggregate.assignment("x").unwrap().primary, StringId(1));
        assert_eq!(aggregate.assignment("y").unwrap().primary, StringId(2));
        assert_eq!(aggregate.assignment("z").unwrap().primary, StringId(1));
    }

    #[test]
    fn standby_strings_receive_evenly_spread_secondaries() {
        let aggregate = balance_strings_spec(&abcd(), "2+2").unwrap();

        let secondary = |id: &str| aggregate.assignment(id).unwrap().secondary;
        assert_eq!(secondary("A"), Some(StringId(3)));
        assert_eq!(secondary("B"), Some(StringId(4)));
        assert_eq!(secondary("C"), Some(StringId(4)));
        assert_eq!(secondary("D"), Some(StringId(3)));

        let standby: Vec<_> = aggregate.standby_strings().collect();
        assert_eq!(standby.len(), 2);
        assert!(standby.iter().all(|s| s.consumers.is_empty() && s.load_kw == 0.0));
        assert_eq!(standby[0].secondary_load_kw, 140.0);
        assert_eq!(standby[1].secondary_load_kw, 140.0);
    }

    #[test]
    fn capacities_are_derived_from_assignments() {
        let aggregate = balance_strings_spec(&abcd(), "2+1").unwrap();
        assert_eq!(aggregate.strings[0].capacity_kw, 175.0);
        assert_eq!(aggregate.strings[1].capacity_kw, 175.0);
        assert_eq!(aggregate.total_capacity_kw, 350.0);
        assert_eq!(aggregate.design_capacity_per_string_kw, 175.0);
        assert_eq!(aggregate.strings[2].capacity_kw, 175.0);
        assert_eq!(aggregate.total_load_kw, 280.0);
        assert_eq!(aggregate.live_load_kw(), 280.0);
    }

    #[test]
    fn empty_consumer_list_yields_idle_strings() {
        let aggregate = balance_strings_spec(&[], "3+1").unwrap();
        assert_eq!(aggregate.strings.len(), 4);
        assert!(aggregate.strings.iter().all(|s| s.load_kw == 0.0));
        assert_eq!(aggregate.total_load_kw, 0.0);
        assert!(aggregate.capacity_warnings().is_empty());
    }

    #[test]
    fn overloaded_baseline_is_reported_not_rejected() {
        let consumers = vec![Consumer::new("hot", ConsumerCategory::Chiller, 120.0, 100.0)];
        let aggregate = balance_strings_spec(&consumers, "1+0").unwrap();
        let warnings = aggregate.capacity_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].string, StringId(1));
    }

    #[test]
    fn configuration_errors_abort_before_balancing() {
        assert!(matches!(
            balance_strings(&abcd(), Redundancy { live: 0, standby: 2 }),
            Err(EngineError::NoLiveStrings)
        ));
        let duplicate = vec![consumer("A", 1.0), consumer("A", 2.0)];
        assert!(matches!(
            balance_strings_spec(&duplicate, "2+0"),
            Err(EngineError::DuplicateConsumer(id)) if id == "A"
        ));
        let negative = vec![consumer("neg", -3.0)];
        assert!(matches!(
            balance_strings_spec(&negative, "2+0"),
            Err(EngineError::InvalidConsumer { .. })
        ));
    }

    #[test]
    fn signed_zero_loads_keep_input_order() {
        let consumers = vec![consumer("first", -0.0), consumer("second", 0.0)];
        let aggregate = balance_strings_spec(&consumers, "2+0").unwrap();
        assert_eq!(aggregate.balance_order, [0, 1]);
        assert_eq!(aggregate.assignment("first").unwrap().primary, StringId(1));
    }

    #[test]
    fn pinned_primary_is_placed_before_greedy_balancing() {
        // D pinned to S2 first, so A then B land on S1 and S2 by running load.
        let mut consumers = abcd();
        consumers[3] = consumers[3].clone().with_primary(StringId(2));
        let aggregate = balance_strings_spec(&consumers, "2+0").unwrap();

        let primary = |id: &str| aggregate.assignment(id).unwrap().primary;
        assert_eq!(primary("D"), StringId(2));
        assert_eq!(primary("A"), StringId(1));
        assert_eq!(primary("B"), StringId(2));
        assert_eq!(primary("C"), StringId(1));
        assert_eq!(aggregate.strings[0].load_kw, 160.0);
        assert_eq!(aggregate.strings[1].load_kw, 120.0);
        // Consumer lists stay in balancing order.
        assert_eq!(aggregate.strings[1].consumers, ["B", "D"]);
    }

    #[test]
    fn pinned_secondary_is_kept_and_avoided_by_the_primary() {
        let mut consumers = abcd();
        consumers[0] = consumers[0].clone().with_secondary(StringId(1));
        let aggregate = balance_strings_spec(&consumers, "2+1").unwrap();

        let a = aggregate.assignment("A").unwrap();
        assert_eq!(a.primary, StringId(2));
        assert_eq!(a.secondary, Some(StringId(1)));
        assert_eq!(aggregate.strings[0].secondary_load_kw, 100.0);
        // Everyone else still dual-feeds from the standby string.
        assert_eq!(aggregate.strings[2].secondary_load_kw, 180.0);
    }

    #[test]
    fn invalid_pins_are_configuration_errors() {
        let pinned = |primary: Option<usize>, secondary: Option<usize>| {
            let mut consumer = consumer("P", 10.0);
            consumer.primary = primary.map(StringId);
            consumer.secondary = secondary.map(StringId);
            balance_strings_spec(&[consumer], "2+1")
        };
        assert!(matches!(pinned(Some(4), None), Err(EngineError::UnknownString(StringId(4)))));
        assert!(matches!(pinned(Some(0), None), Err(EngineError::UnknownString(StringId(0)))));
        assert!(matches!(pinned(None, Some(9)), Err(EngineError::UnknownString(StringId(9)))));
        assert!(matches!(pinned(Some(3), None), Err(EngineError::InvalidConsumer { .. })));
        assert!(matches!(pinned(Some(2), Some(2)), Err(EngineError::InvalidConsumer { .. })));

        let lone = consumer("L", 1.0).with_secondary(StringId(1));
        assert!(matches!(
            balance_strings_spec(&[lone], "1+1"),
            Err(EngineError::InvalidConsumer { .. })
        ));
    }

    #[test]
    fn oversized_topologies_fail_before_allocating() {
        let consumers = vec![consumer("A", 1.0)];
        assert!(matches!(
            balance_strings_spec(&consumers, "18446744073709551615+1"),
            Err(EngineError::InvalidRedundancy { .. })
        ));
        assert!(matches!(
            balance_strings(&consumers, Redundancy { live: usize::MAX, standby: 1 }),
            Err(EngineError::InvalidRedundancy { .. })
        ));
        assert!(matches!(
            balance_strings(&consumers, Redundancy { live: 100_000_000_000, standby: 0 }),
            Err(EngineError::InvalidRedundancy { .. })
        ));
    }

    #[test]
    fn least_loaded_prefers_lowest_index_on_ties() {
        let loads = [5.0, 3.0, 3.0];
        assert_eq!(least_loaded(0..3, |i| loads[i]), Some(1));
        assert_eq!(least_loaded(0..0, |i| loads[i]), None);
    }
}
