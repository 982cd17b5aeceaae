//! ---
//! dcp_section: "05-networking-external-interfaces"
//! dcp_subsection: "binary"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Command line front end for power string studies."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use anyhow::Result;
use clap::Args;
use dcpower_common::{config::ReportFormat, AppConfig};
use dcpower_engine::{analyze_plant, sizing::ThermalCascade};

use crate::{export, OutputArgs};

#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Override `plant.it_load_kw`.
    #[arg(long = "it-load", value_name = "KW")]
    it_load_kw: Option<f64>,

    /// Override `plant.string_redundancy` (`N+M`).
    #[arg(long = "strings", value_name = "SPEC")]
    strings: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

pub fn run(command: PlanCommand, config: &AppConfig) -> Result<()> {
    let mut plant = config.plant.clone();
    if let Some(it_load_kw) = command.it_load_kw {
        plant.it_load_kw = it_load_kw;
    }
    if let Some(strings) = command.strings {
        plant.string_redundancy = strings;
    }
    if command.output.fail.is_some() {
        plant.failed_string = command.output.fail;
    }
    plant.validate()?;

    let study = analyze_plant(&plant)?;
    match command.output.format(config) {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&study)?),
        ReportFormat::Text => {
            print!("{}", render_thermal(&study.sizing.thermal));
            print!("{}", study.study.report);
        }
    }

    export(study.exporter(), command.output.export_dir(config))
}

fn render_thermal(thermal: &ThermalCascade) -> String {
    format!(
        "Cooling chain\n  fan power      {:>10.1} kW\n  pump power     {:>10.1} kW\n  chiller power  {:>10.1} kW\n  condenser heat {:>10.1} kW\n\n",
        thermal.fan_power_kw,
        thermal.pump_power_kw,
        thermal.chiller_power_kw,
        thermal.condenser_heat_kw
    )
}
