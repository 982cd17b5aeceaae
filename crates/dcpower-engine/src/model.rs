//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    errors::{EngineError, Result},
    redundancy::Redundancy,
};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum ConsumerCategory {
    #[strum(serialize = "it-row", to_string = "IT row")]
    ItRow,
    #[strum(serialize = "crah", to_string = "CRAH")]
    Crah,
    #[strum(serialize = "pump", to_string = "pump")]
    Pump,
    #[strum(serialize = "chiller", to_string = "chiller")]
    Chiller,
}

impl ConsumerCategory {
    /// Prefix used when labelling sized units (`ITR3`, `CRAH1`, ...).
    pub fn label_prefix(&self) -> &'static str {
        match self {
            ConsumerCategory::ItRow => "ITR",
            ConsumerCategory::Crah => "CRAH",
            ConsumerCategory::Pump => "PUMP",
            ConsumerCategory::Chiller => "CHLR",
        }
    }
}

/// One load-bearing unit. The engine only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consumer {
    pub id: String,
    pub category: ConsumerCategory,
    pub load_kw: f64,
    pub capacity_kw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitespace: Option<u32>,
    /// Pinned primary feed. Must be a live string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<StringId>,
    /// Pinned secondary feed, live or standby, never the primary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<StringId>,
}

impl Consumer {
    pub fn new(
        id: impl Into<String>,
        category: ConsumerCategory,
        load_kw: f64,
        capacity_kw: f64,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            load_kw,
            capacity_kw,
            whitespace: None,
            primary: None,
            secondary: None,
        }
    }

    pub fn with_whitespace(mut self, whitespace: u32) -> Self {
        self.whitespace = Some(whitespace);
        self
    }

    pub fn with_primary(mut self, primary: StringId) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_secondary(mut self, secondary: StringId) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| EngineError::InvalidConsumer {
            id: self.id.clone(),
            reason,
        };
        if self.id.trim().is_empty() {
            return Err(invalid("identifier is empty".into()));
        }
        if !self.load_kw.is_finite() || self.load_kw < 0.0 {
            return Err(invalid(format!("load {} kW is not a non-negative number", self.load_kw)));
        }
        if !self.capacity_kw.is_finite() || self.capacity_kw < 0.0 {
            return Err(invalid(format!(
                "capacity {} kW is not a non-negative number",
                self.capacity_kw
            )));
        }
        if let (Some(primary), Some(secondary)) = (self.primary, self.secondary) {
            if primary == secondary {
                return Err(invalid(format!("secondary feed {secondary} equals the primary feed")));
            }
        }
        Ok(())
    }
}

/// One-based string number, live strings first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct StringId(pub usize);

impl StringId {
    pub fn index(&self) -> usize {
        self.0.saturating_sub(1)
    }

    pub fn from_index(index: usize) -> Self {
        StringId(index + 1)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StringStatus {
    Live,
    Standby,
}

/// One electrical feed path and the consumers it carries as primary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerString {
    pub id: StringId,
    pub status: StringStatus,
    /// Consumer ids in assignment order.
    pub consumers: Vec<String>,
    pub load_kw: f64,
    pub capacity_kw: f64,
    /// Load that would fall back onto this string as a secondary feed.
    pub secondary_load_kw: f64,
}

impl PowerString {
    pub fn new(id: StringId, status: StringStatus) -> Self {
        Self {
            id,
            status,
            consumers: Vec::new(),
            load_kw: 0.0,
            capacity_kw: 0.0,
            secondary_load_kw: 0.0,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, StringStatus::Live)
    }

    pub fn is_overloaded(&self) -> bool {
        self.load_kw > self.capacity_kw
    }

    pub fn utilization(&self) -> Option<f64> {
        utilization(self.load_kw, self.capacity_kw)
    }
}

/// Load over capacity, `None` when capacity is zero.
pub fn utilization(load_kw: f64, capacity_kw: f64) -> Option<f64> {
    (capacity_kw > 0.0).then(|| load_kw / capacity_kw)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedAssignment {
    pub consumer_id: String,
    pub primary: StringId,
    #[serde(default)]
    pub secondary: Option<StringId>,
}

/// Baseline condition where a live string carries more than it is rated for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapacityWarning {
    pub string: StringId,
    pub load_kw: f64,
    pub capacity_kw: f64,
}

impl fmt::Display for CapacityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} carries {:.1} kW against {:.1} kW capacity",
            self.string, self.load_kw, self.capacity_kw
        )
    }
}

/// Output of one balancing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerStringAggregate {
    pub redundancy: Redundancy,
    /// Live strings first, then standby.
    pub strings: Vec<PowerString>,
    /// Consumers in input order.
    pub consumers: Vec<Consumer>,
    /// Feed assignments parallel to `consumers`.
    pub assignments: Vec<FeedAssignment>,
    /// Indices into `consumers` in the order they were balanced.
    pub balance_order: Vec<usize>,
    pub total_load_kw: f64,
    pub total_capacity_kw: f64,
    pub design_capacity_per_string_kw: f64,
}

impl PowerStringAggregate {
    pub fn string(&self, id: StringId) -> Option<&PowerString> {
        self.strings.iter().find(|s| s.id == id)
    }

    pub fn live_strings(&self) -> impl Iterator<Item = &PowerString> {
        self.strings.iter().filter(|s| s.is_live())
    }

    pub fn standby_strings(&self) -> impl Iterator<Item = &PowerString> {
        self.strings.iter().filter(|s| !s.is_live())
    }

    pub fn assignment(&self, consumer_id: &str) -> Option<&FeedAssignment> {
        self.assignments.iter().find(|a| a.consumer_id == consumer_id)
    }

    pub fn consumer_index(&self) -> HashMap<&str, usize> {
        self.consumers
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.id.as_str(), idx))
            .collect()
    }

    /// Sum of primary load carried by live strings.
    pub fn live_load_kw(&self) -> f64 {
        self.live_strings().map(|s| s.load_kw).sum()
    }

    pub fn capacity_warnings(&self) -> Vec<CapacityWarning> {
        self.live_strings()
            .filter(|s| s.is_overloaded())
            .map(|s| CapacityWarning {
                string: s.id,
                load_kw: s.load_kw,
                capacity_kw: s.capacity_kw,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("CRAH".parse::<ConsumerCategory>().unwrap(), ConsumerCategory::Crah);
        assert_eq!("It-Row".parse::<ConsumerCategory>().unwrap(), ConsumerCategory::ItRow);
        assert_eq!(ConsumerCategory::ItRow.to_string(), "IT row");
        let prefixes: Vec<_> = ConsumerCategory::iter().map(|c| c.label_prefix()).collect();
        assert_eq!(prefixes, ["ITR", "CRAH", "PUMP", "CHLR"]);
    }

    #[test]
    fn consumer_serde_uses_kebab_case_categories() {
        let consumer: Consumer = serde_json::from_str(
            r#"{"id":"ITR1","category":"it-row","load_kw":50.0,"capacity_kw":66.7,"whitespace":1}"#,
        )
        .unwrap();
        assert_eq!(consumer.category, ConsumerCategory::ItRow);
        assert_eq!(consumer.whitespace, Some(1));
    }

    #[test]
    fn pinned_feeds_deserialize_and_must_differ() {
        let consumer: Consumer = serde_json::from_str(
            r#"{"id":"P1","category":"pump","load_kw":4.0,"capacity_kw":5.0,"primary":2,"secondary":4}"#,
        )
        .unwrap();
        assert_eq!(consumer.primary, Some(StringId(2)));
        assert_eq!(consumer.secondary, Some(StringId(4)));
        assert!(consumer.validate().is_ok());

        let same = Consumer::new("P2", ConsumerCategory::Pump, 4.0, 5.0)
            .with_primary(StringId(1))
            .with_secondary(StringId(1));
        assert!(matches!(same.validate(), Err(EngineError::InvalidConsumer { .. })));
    }

    #[test]
    fn validate_rejects_negative_and_nan_figures() {
        assert!(Consumer::new("A", ConsumerCategory::Pump, -1.0, 5.0).validate().is_err());
        assert!(Consumer::new("A", ConsumerCategory::Pump, 1.0, f64::NAN).validate().is_err());
        assert!(Consumer::new(" ", ConsumerCategory::Pump, 1.0, 1.0).validate().is_err());
        assert!(Consumer::new("A", ConsumerCategory::Pump, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn utilization_is_undefined_without_capacity() {
        assert_eq!(utilization(50.0, 100.0), Some(0.5));
        assert_eq!(utilization(50.0, 0.0), None);
        assert_eq!(StringId(3).to_string(), "S3");
        assert_eq!(StringId(3).index(), 2);
    }
}
