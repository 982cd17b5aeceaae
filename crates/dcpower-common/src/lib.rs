//! ---
//! dcp_section: "01-core-functionality"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Shared primitives and utilities for the planner."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
//! Shared primitives for the dcpower workspace.
//! This crate exposes configuration loading and the logging bootstrap
//! consumed by the engine and the command-line tooling.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, PlantConfig, ReportConfig, ReportFormat,
};
pub use logging::{init_console, init_tracing, LogFormat};
