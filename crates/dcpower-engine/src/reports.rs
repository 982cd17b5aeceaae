//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::{fmt, fs, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    errors::Result,
    failure::{FailureImpact, FailureWarning, RerouteOutcome, SurvivorLoad},
    model::{
        utilization, CapacityWarning, ConsumerCategory, PowerStringAggregate, StringId,
        StringStatus,
    },
    redundancy::Redundancy,
    sizing::PlantSizing,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumerRow {
    pub id: String,
    pub category: ConsumerCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitespace: Option<u32>,
    pub load_kw: f64,
    pub capacity_kw: f64,
    pub utilization: Option<f64>,
    pub secondary: Option<StringId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StringTable {
    pub string: StringId,
    pub status: StringStatus,
    pub rows: Vec<ConsumerRow>,
    pub load_kw: f64,
    pub capacity_kw: f64,
    pub utilization: Option<f64>,
    pub secondary_load_kw: f64,
    pub overloaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSummary {
    pub failed: StringId,
    pub headline: String,
    pub lines: Vec<String>,
    pub overloaded: Vec<StringId>,
    pub no_surviving_live_string: bool,
    pub unserved_load_kw: f64,
    pub survivors: Vec<SurvivorLoad>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerStringReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub redundancy: Redundancy,
    pub total_load_kw: f64,
    pub total_capacity_kw: f64,
    pub design_capacity_per_string_kw: f64,
    pub strings: Vec<StringTable>,
    pub baseline_warnings: Vec<CapacityWarning>,
    pub scenarios: Vec<ScenarioSummary>,
}

impl PowerStringReport {
    pub fn table(&self, id: StringId) -> Option<&StringTable> {
        self.strings.iter().find(|t| t.string == id)
    }

    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }
}

/// Turns balancing and failure output into per-string tables and scenario summaries.
pub fn build_report(
    aggregate: &PowerStringAggregate,
    impacts: &[FailureImpact],
) -> PowerStringReport {
    let index = aggregate.consumer_index();

    let strings = aggregate
        .strings
        .iter()
        .map(|string| {
            let rows = string
                .consumers
                .iter()
                .filter_map(|id| index.get(id.as_str()).copied())
                .map(|idx| {
                    let consumer = &aggregate.consumers[idx];
                    ConsumerRow {
                        id: consumer.id.clone(),
                        category: consumer.category,
                        whitespace: consumer.whitespace,
                        load_kw: consumer.load_kw,
                        capacity_kw: consumer.capacity_kw,
                        utilization: utilization(consumer.load_kw, consumer.capacity_kw),
                        secondary: aggregate.assignments[idx].secondary,
                    }
                })
                .collect();
            StringTable {
                string: string.id,
                status: string.status,
                rows,
                load_kw: string.load_kw,
                capacity_kw: string.capacity_kw,
                utilization: string.utilization(),
                secondary_load_kw: string.secondary_load_kw,
                overloaded: string.is_overloaded(),
            }
        })
        .collect();

    PowerStringReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        redundancy: aggregate.redundancy,
        total_load_kw: aggregate.total_load_kw,
        total_capacity_kw: aggregate.total_capacity_kw,
        design_capacity_per_string_kw: aggregate.design_capacity_per_string_kw,
        strings,
        baseline_warnings: aggregate.capacity_warnings(),
        scenarios: impacts.iter().map(summarize_impact).collect(),
    }
}

fn summarize_impact(impact: &FailureImpact) -> ScenarioSummary {
    let headline = format!(
        "{} failure: {} consumer(s) displaced ({:.1} kW)",
        impact.failed,
        impact.displaced.len(),
        impact.failed_load_kw
    );

    let mut lines: Vec<String> = impact
        .displaced
        .iter()
        .map(|reroute| {
            let route = match reroute.outcome {
                RerouteOutcome::SecondaryFeed { destination } => {
                    format!("-> {} via secondary feed", destination)
                }
                RerouteOutcome::LeastLoadedSurvivor { destination } => {
                    format!("-> {} as least-loaded survivor", destination)
                }
                RerouteOutcome::Unserved => "unserved".to_owned(),
            };
            format!(
                "{} ({}, {:.1} kW) {}",
                reroute.consumer_id, reroute.category, reroute.load_kw, route
            )
        })
        .collect();
    lines.extend(impact.warnings.iter().map(|w| match w {
        FailureWarning::NoSurvivingLiveString => "WARNING: no surviving live string".to_owned(),
        other => format!("WARNING: {}", other),
    }));

    ScenarioSummary {
        failed: impact.failed,
        headline,
        lines,
        overloaded: impact.overloaded_strings(),
        no_surviving_live_string: impact.no_surviving_live_string(),
        unserved_load_kw: impact.unserved_load_kw,
        survivors: impact.survivors.clone(),
    }
}

fn format_utilization(load_kw: f64, utilization: Option<f64>) -> String {
    match utilization {
        Some(ratio) => format!("{:.1}%", ratio * 100.0),
        None if load_kw > 0.0 => "inf".to_owned(),
        None => "n/a".to_owned(),
    }
}

impl fmt::Display for PowerStringReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Power strings {} | total load {:.1} kW | total capacity {:.1} kW | design capacity per string {:.1} kW",
            self.redundancy, self.total_load_kw, self.total_capacity_kw, self.design_capacity_per_string_kw
        )?;
        for table in &self.strings {
            writeln!(f)?;
            writeln!(
                f,
                "{} [{}] load {:.1} kW / capacity {:.1} kW ({}){}",
                table.string,
                table.status,
                table.load_kw,
                table.capacity_kw,
                format_utilization(table.load_kw, table.utilization),
                if table.overloaded { " OVERLOADED" } else { "" }
            )?;
            if table.secondary_load_kw > 0.0 {
                writeln!(f, "  secondary feed for {:.1} kW", table.secondary_load_kw)?;
            }
            if table.rows.is_empty() {
                continue;
            }
            writeln!(
                f,
                "  {:<12} {:<8} {:>4} {:>10} {:>10} {:>8} {:>6}",
                "consumer", "category", "ws", "load kW", "cap kW", "util", "alt"
            )?;
            for row in &table.rows {
                writeln!(
                    f,
                    "  {:<12} {:<8} {:>4} {:>10.1} {:>10.1} {:>8} {:>6}",
                    row.id,
                    row.category.to_string(),
                    row.whitespace.map(|w| w.to_string()).unwrap_or_else(|| "-".into()),
                    row.load_kw,
                    row.capacity_kw,
                    format_utilization(row.load_kw, row.utilization),
                    row.secondary.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
                )?;
            }
        }
        for warning in &self.baseline_warnings {
            writeln!(f, "WARNING: {}", warning)?;
        }
        if !self.scenarios.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failure scenarios")?;
            for scenario in &self.scenarios {
                writeln!(f, "  {}", scenario.headline)?;
                for line in &scenario.lines {
                    writeln!(f, "    {}", line)?;
                }
                for survivor in &scenario.survivors {
                    writeln!(
                        f,
                        "    {} [{}] {:.1} kW -> {:.1} kW of {:.1} kW{}",
                        survivor.string,
                        survivor.status,
                        survivor.baseline_load_kw,
                        survivor.load_kw,
                        survivor.capacity_kw,
                        if survivor.overloaded { " OVERLOADED" } else { "" }
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ReportExporter<'a> {
    report: &'a PowerStringReport,
    sizing: Option<&'a PlantSizing>,
}

impl<'a> ReportExporter<'a> {
    pub fn new(report: &'a PowerStringReport) -> Self {
        Self {
            report,
            sizing: None,
        }
    }

    pub fn with_sizing(mut self, sizing: &'a PlantSizing) -> Self {
        self.sizing = Some(sizing);
        self
    }

    pub fn export_all(&self, output_dir: &Path) -> Result<()> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let timestamp = self.report.generated_at.to_rfc3339();
        let envelope = ReportEnvelope::new(
            &timestamp,
            self.report.run_id,
            power_string_schema(),
            self.report,
        );
        write_json(output_dir.join("power_strings.json"), &envelope)?;

        if let Some(sizing) = self.sizing {
            let envelope =
                ReportEnvelope::new(&timestamp, self.report.run_id, plant_sizing_schema(), sizing);
            write_json(output_dir.join("plant_sizing.json"), &envelope)?;
        }

        info!("Reports exported to {}", output_dir.display());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: &'a str,
    run_id: Uuid,
    schema: serde_json::Value,
    data: &'a T,
}

impl<'a, T: Serialize> ReportEnvelope<'a, T> {
    fn new(timestamp: &'a str, run_id: Uuid, schema: serde_json::Value, data: &'a T) -> Self {
        Self {
            timestamp,
            run_id,
            schema,
            data,
        }
    }
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn power_string_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "PowerStringReport",
        "type": "object",
        "properties": {
            "redundancy": {
                "type": "object",
                "properties": {
                    "live": {"type": "integer", "minimum": 1},
                    "standby": {"type": "integer", "minimum": 0}
                },
                "required": ["live", "standby"]
            },
            "total_load_kw": {"type": "number"},
            "total_capacity_kw": {"type": "number"},
            "strings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "string": {"type": "integer"},
                        "status": {"enum": ["live", "standby"]},
                        "load_kw": {"type": "number"},
                        "capacity_kw": {"type": "number"},
                        "utilization": {"type": ["number", "null"]},
                        "overloaded": {"type": "boolean"},
                        "rows": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "id": {"type": "string"},
                                    "whitespace": {"type": "integer", "minimum": 1},
                                    "secondary": {"type": ["integer", "null"]}
                                },
                                "required": ["id", "category", "load_kw", "capacity_kw"]
                            }
                        }
                    },
                    "required": ["string", "status", "load_kw", "capacity_kw", "rows"]
                }
            },
            "scenarios": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "failed": {"type": "integer"},
                        "headline": {"type": "string"},
                        "lines": {"type": "array", "items": {"type": "string"}},
                        "overloaded": {"type": "array", "items": {"type": "integer"}},
                        "no_surviving_live_string": {"type": "boolean"}
                    },
                    "required": ["failed", "headline", "lines", "overloaded"]
                }
            }
        },
        "required": ["redundancy", "total_load_kw", "total_capacity_kw", "strings", "scenarios"]
    })
}

fn plant_sizing_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "PlantSizing",
        "type": "object",
        "properties": {
            "whitespaces": {"type": "array"},
            "consumers": {"type": "array"},
            "thermal": {
                "type": "object",
                "properties": {
                    "crah_heat_out_kw": {"type": "number"},
                    "pump_heat_out_kw": {"type": "number"},
                    "condenser_heat_kw": {"type": "number"}
                }
            }
        },
        "required": ["whitespaces", "consumers", "thermal"]
    })
}
