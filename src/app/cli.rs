//! Command-line argument definitions (clap).

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::config::types::ExporterConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "power-metrics-exporter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prometheus exporter for powertop and Raspberry Pi power telemetry", long_about = None)]
pub struct Args {
    /// Address to listen on [default: 0.0.0.0:8887]
    #[arg(long, help_heading = "Server")]
    pub address: Option<String>,

    /// Path under which to expose metrics [default: /metrics]
    #[arg(long = "metrics-path", help_heading = "Server")]
    pub metrics_path: Option<String>,

    /// On a Raspberry Pi, also run powertop and expose its metrics
    #[arg(long = "enable-comparison", help_heading = "Server")]
    pub enable_comparison: bool,

    /// JSON config file; built-in defaults are used when omitted
    #[arg(long, help_heading = "Config & Logging")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level", help_heading = "Config & Logging")]
    pub log_level: Option<String>,
}

impl Args {
    /// Overlay flags onto the loaded config. Flags win over file values.
    pub fn apply(&self, config: &mut ExporterConfig) -> Result<()> {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(path) = &self.metrics_path {
            config.server.metrics_path = path.clone();
        }
        if self.enable_comparison {
            config.server.enable_comparison = true;
        }

        let path = &config.server.metrics_path;
        if !path.starts_with('/') || path == "/" {
            bail!("Invalid metrics path {:?}: must start with '/' and must not be '/'", path);
        }
        Ok(())
    }
}
