//! ---
//! dcp_section: "01-core-functionality"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Shared primitives and utilities for the planner."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_report_directory() -> PathBuf {
    PathBuf::from("reports")
}

fn default_it_load_kw() -> f64 {
    400.0
}

fn default_whitespaces() -> u32 {
    2
}

fn default_row_redundancy() -> String {
    "6+2".to_owned()
}

fn default_unit_redundancy() -> String {
    "3+1".to_owned()
}

fn default_dt_air_k() -> f64 {
    10.0
}

fn default_static_pressure_pa() -> f64 {
    300.0
}

fn default_eta_fan() -> f64 {
    0.6
}

fn default_eta_motor() -> f64 {
    0.95
}

fn default_dt_water_k() -> f64 {
    6.0
}

fn default_pump_head_m() -> f64 {
    30.0
}

fn default_eta_pump() -> f64 {
    0.75
}

fn default_cop_chiller() -> f64 {
    5.0
}

/// Primary configuration object for the planner tooling.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub plant: PlantConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "DCPOWER_CONFIG";

    /// Load configuration from disk, respecting the `DCPOWER_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse and validate a single configuration file.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    ///
    /// Redundancy specs are only checked for presence here; their grammar is
    /// enforced by the engine before any balancing starts.
    pub fn validate(&self) -> Result<()> {
        self.plant.validate()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Output format for rendered power string reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_directory")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub format: ReportFormat,
    /// Write the JSON envelope to `output_dir` after every run.
    #[serde(default)]
    pub export: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_report_directory(),
            format: ReportFormat::default(),
            export: false,
        }
    }
}

/// Largest number of whitespaces a plant may be split into.
pub const MAX_WHITESPACES: u32 = 64;

/// Plant inputs for the sizing chain feeding the string balancer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantConfig {
    #[serde(default = "default_it_load_kw")]
    pub it_load_kw: f64,
    #[serde(default = "default_whitespaces")]
    pub whitespaces: u32,
    #[serde(default = "default_row_redundancy")]
    pub row_redundancy: String,
    #[serde(default = "default_unit_redundancy")]
    pub crah_redundancy: String,
    #[serde(default = "default_unit_redundancy")]
    pub pump_redundancy: String,
    #[serde(default = "default_unit_redundancy")]
    pub chiller_redundancy: String,
    #[serde(default = "default_unit_redundancy")]
    pub string_redundancy: String,
    #[serde(default = "default_dt_air_k")]
    pub dt_air_k: f64,
    #[serde(default = "default_static_pressure_pa")]
    pub static_pressure_pa: f64,
    #[serde(default = "default_eta_fan")]
    pub eta_fan: f64,
    #[serde(default = "default_eta_motor")]
    pub eta_motor: f64,
    #[serde(default = "default_dt_water_k")]
    pub dt_water_k: f64,
    #[serde(default = "default_pump_head_m")]
    pub pump_head_m: f64,
    #[serde(default = "default_eta_pump")]
    pub eta_pump: f64,
    #[serde(default = "default_eta_motor")]
    pub eta_pump_motor: f64,
    #[serde(default = "default_cop_chiller")]
    pub cop_chiller: f64,
    /// One-based string number to simulate instead of sweeping every live string.
    #[serde(default)]
    pub failed_string: Option<usize>,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            it_load_kw: default_it_load_kw(),
            whitespaces: default_whitespaces(),
            row_redundancy: default_row_redundancy(),
            crah_redundancy: default_unit_redundancy(),
            pump_redundancy: default_unit_redundancy(),
            chiller_redundancy: default_unit_redundancy(),
            string_redundancy: default_unit_redundancy(),
            dt_air_k: default_dt_air_k(),
            static_pressure_pa: default_static_pressure_pa(),
            eta_fan: default_eta_fan(),
            eta_motor: default_eta_motor(),
            dt_water_k: default_dt_water_k(),
            pump_head_m: default_pump_head_m(),
            eta_pump: default_eta_pump(),
            eta_pump_motor: default_eta_motor(),
            cop_chiller: default_cop_chiller(),
            failed_string: None,
        }
    }
}

impl PlantConfig {
    pub fn validate(&self) -> Result<()> {
        let numeric = [
            ("it_load_kw", self.it_load_kw),
            ("dt_air_k", self.dt_air_k),
            ("static_pressure_pa", self.static_pressure_pa),
            ("eta_fan", self.eta_fan),
            ("eta_motor", self.eta_motor),
            ("dt_water_k", self.dt_water_k),
            ("pump_head_m", self.pump_head_m),
            ("eta_pump", self.eta_pump),
            ("eta_pump_motor", self.eta_pump_motor),
            ("cop_chiller", self.cop_chiller),
        ];
        for (name, value) in numeric {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!(
                    "plant.{} must be a finite non-negative number (got {})",
                    name,
                    value
                ));
            }
        }
        if self.whitespaces == 0 || self.whitespaces > MAX_WHITESPACES {
            return Err(anyhow!(
                "plant.whitespaces must be between 1 and {} (got {})",
                MAX_WHITESPACES,
                self.whitespaces
            ));
        }
        let specs = [
            ("row_redundancy", &self.row_redundancy),
            ("crah_redundancy", &self.crah_redundancy),
            ("pump_redundancy", &self.pump_redundancy),
            ("chiller_redundancy", &self.chiller_redundancy),
            ("string_redundancy", &self.string_redundancy),
        ];
        for (name, spec) in specs {
            if spec.trim().is_empty() {
                return Err(anyhow!("plant.{} must not be empty", name));
            }
        }
        if self.failed_string == Some(0) {
            return Err(anyhow!("plant.failed_string is one-based"));
        }
        Ok(())
    }
}
