//! ---
//! dcp_section: "05-networking-external-interfaces"
//! dcp_subsection: "binary"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Command line front end for power string studies."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dcpower_common::{config::ReportFormat, AppConfig};
use dcpower_engine::{
    analyze_consumers, io::load_consumers_from_file, model::StringId,
    redundancy::parse_redundancy,
};

use crate::{export, OutputArgs};

#[derive(Debug, Args)]
pub struct BalanceCommand {
    /// Consumer list (JSON or YAML).
    #[arg(long = "consumers", value_name = "FILE")]
    consumers: PathBuf,

    /// String topology as `N+M` (defaults to `plant.string_redundancy`).
    #[arg(long = "strings", value_name = "SPEC")]
    strings: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

pub fn run(command: BalanceCommand, config: &AppConfig) -> Result<()> {
    let consumers = load_consumers_from_file(&command.consumers).with_context(|| {
        format!("failed to load consumers from {}", command.consumers.display())
    })?;
    let spec = command
        .strings
        .as_deref()
        .unwrap_or(&config.plant.string_redundancy);
    let redundancy = parse_redundancy(spec)?;

    let study = analyze_consumers(&consumers, redundancy, command.output.fail.map(StringId))?;
    match command.output.format(config) {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&study)?),
        ReportFormat::Text => print!("{}", study.report),
    }

    export(study.exporter(), command.output.export_dir(config))
}
