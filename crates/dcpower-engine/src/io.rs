//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::{
    errors::Result,
    model::{Consumer, ConsumerCategory, StringId},
};

/// Consumer body when the file is keyed by id.
#[derive(Debug, Deserialize)]
struct KeyedConsumer {
    category: ConsumerCategory,
    load_kw: f64,
    capacity_kw: f64,
    #[serde(default)]
    whitespace: Option<u32>,
    #[serde(default)]
    primary: Option<StringId>,
    #[serde(default)]
    secondary: Option<StringId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConsumerDocument {
    List(Vec<Consumer>),
    Keyed(IndexMap<String, KeyedConsumer>),
}

impl ConsumerDocument {
    fn into_consumers(self) -> Vec<Consumer> {
        match self {
            ConsumerDocument::List(list) => list,
            ConsumerDocument::Keyed(map) => map
                .into_iter()
                .map(|(id, body)| Consumer {
                    id,
                    category: body.category,
                    load_kw: body.load_kw,
                    capacity_kw: body.capacity_kw,
                    whitespace: body.whitespace,
                    primary: body.primary,
                    secondary: body.secondary,
                })
                .collect(),
        }
    }
}

/// Reads consumers from JSON or YAML, either as a list or as a map keyed by
/// consumer id. File order is preserved in both shapes.
pub fn load_consumers_from_file(path: impl AsRef<Path>) -> Result<Vec<Consumer>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let consumers = parse_consumers(&data)?;
    debug!(path = %path.display(), consumers = consumers.len(), "consumer file loaded");
    Ok(consumers)
}

pub fn parse_consumers(data: &str) -> Result<Vec<Consumer>> {
    let trimmed = data.trim_start();
    let document: ConsumerDocument = if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(data)?
    } else {
        serde_yaml::from_str(data)?
    };
    Ok(document.into_consumers())
}
