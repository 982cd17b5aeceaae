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
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// Largest `live + standby` count accepted for any redundancy group.
///
/// Strings and sized units are materialised one entry per count, so the
/// bound keeps a single request from exhausting memory.
pub const MAX_UNITS: usize = 512;

/// Live/standby count pair parsed from an `N+M` spec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Redundancy {
    pub live: usize,
    pub standby: usize,
}

impl Redundancy {
    pub fn new(live: usize, standby: usize) -> Result<Self> {
        let redundancy = Self { live, standby };
        redundancy.validate()?;
        Ok(redundancy)
    }

    /// Rejects zero live units and totals above [`MAX_UNITS`].
    pub fn validate(&self) -> Result<()> {
        if self.live == 0 {
            return Err(EngineError::NoLiveStrings);
        }
        match self.live.checked_add(self.standby) {
            Some(total) if total <= MAX_UNITS => Ok(()),
            _ => Err(EngineError::InvalidRedundancy {
                spec: self.to_string(),
                reason: format!("at most {MAX_UNITS} units are supported"),
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.live.saturating_add(self.standby)
    }
}

impl fmt::Display for Redundancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.live, self.standby)
    }
}

impl FromStr for Redundancy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        parse_redundancy(s)
    }
}

/// Parse a `"<live>+<standby>"` spec.
///
/// Whitespace is accepted around the `+` and around the whole spec. Signs,
/// decimals, missing halves and a zero live count are rejected.
pub fn parse_redundancy(spec: &str) -> Result<Redundancy> {
    let invalid = |reason: &str| EngineError::InvalidRedundancy {
        spec: spec.to_owned(),
        reason: reason.to_owned(),
    };

    let (live, standby) = spec
        .split_once('+')
        .ok_or_else(|| invalid("expected '<live>+<standby>'"))?;
    let live = parse_count(live.trim())
        .ok_or_else(|| invalid("live count is not a non-negative integer"))?;
    let standby = parse_count(standby.trim())
        .ok_or_else(|| invalid("standby count is not a non-negative integer"))?;

    if live == 0 {
        return Err(invalid("at least one live string is required"));
    }
    match live.checked_add(standby) {
        Some(total) if total <= MAX_UNITS => Ok(Redundancy { live, standby }),
        _ => Err(invalid(&format!("at most {MAX_UNITS} units are supported"))),
    }
}

fn parse_count(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
