//! ---
//! dcp_section: "05-networking-external-interfaces"
//! dcp_subsection: "binary"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Command line front end for power string studies."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use dcpower_common::{config::ReportFormat, init_console, init_tracing, AppConfig};
use dcpower_engine::reports::ReportExporter;
use tracing::info;

mod balance;
mod plan;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Data-center power string planner",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to DCPOWER_CONFIG, dcpower.toml, configs/dcpower.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write a rolling log file to the configured logging directory.
    #[arg(long = "log-file", global = true, action = ArgAction::SetTrue)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Size the cooling chain from the plant configuration and study its strings.
    Plan(plan::PlanCommand),
    /// Balance consumers read from a JSON or YAML file.
    Balance(balance::BalanceCommand),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

/// Output switches shared by every study command.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// One-based string to fail instead of sweeping every live string.
    #[arg(long = "fail", value_name = "STRING")]
    pub fail: Option<usize>,

    /// Rendering on stdout (overrides `report.format`).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Write JSON reports after the run (also enabled by `report.export`).
    #[arg(long, action = ArgAction::SetTrue)]
    export: bool,

    /// Export directory (overrides `report.output_dir`).
    #[arg(long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

impl OutputArgs {
    pub fn format(&self, config: &AppConfig) -> ReportFormat {
        self.format.map(Into::into).unwrap_or(config.report.format)
    }

    /// Export directory, if this run should export at all.
    pub fn export_dir(&self, config: &AppConfig) -> Option<PathBuf> {
        (self.export || config.report.export).then(|| {
            self.output_dir
                .clone()
                .unwrap_or_else(|| config.report.output_dir.clone())
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    if cli.log_file {
        init_tracing("dcpowerctl", &config.logging)?;
    } else {
        init_console();
    }

    match cli.command {
        Commands::Plan(cmd) => plan::run(cmd, &config),
        Commands::Balance(cmd) => balance::run(cmd, &config),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::from_path(path.to_path_buf());
    }
    let candidates = [
        PathBuf::from("dcpower.toml"),
        PathBuf::from("configs/dcpower.toml"),
    ];
    let env_override = std::env::var(AppConfig::ENV_CONFIG_PATH)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    if env_override || candidates.iter().any(|c| c.exists()) {
        AppConfig::load(&candidates)
    } else {
        Ok(AppConfig::default())
    }
}

pub(crate) fn export(exporter: ReportExporter<'_>, dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = dir {
        exporter
            .export_all(&dir)
            .with_context(|| format!("failed to export reports to {}", dir.display()))?;
        info!(dir = %dir.display(), "reports exported");
        eprintln!("reports written to {}", dir.display());
    }
    Ok(())
}
