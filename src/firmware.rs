//! On-device firmware telemetry (Raspberry Pi `vcgencmd`).
//!
//! [`FirmwareQuery`] is the seam to the firmware command; [`collector`] turns its
//! `key=value` answers into the `rpi_*` metric families at scrape time.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::types::FirmwareSettings;
use crate::system::executor;

pub mod collector;
pub mod decode;
pub mod power_model;
pub mod types;

pub use collector::FirmwareCollector;

/// Runs one firmware query and returns its raw single-line output.
#[async_trait]
pub trait FirmwareQuery: Send + Sync {
    async fn query(&self, args: &[&str]) -> Result<String>;
}

pub struct Vcgencmd {
    path: PathBuf,
    timeout: Duration,
}

impl Vcgencmd {
    pub fn new(settings: &FirmwareSettings) -> Self {
        Self {
            path: settings.vcgencmd_path.clone(),
            timeout: settings.command_timeout(),
        }
    }
}

#[async_trait]
impl FirmwareQuery for Vcgencmd {
    async fn query(&self, args: &[&str]) -> Result<String> {
        let output = executor::run_command(&self.path, args, self.timeout).await?;
        Ok(output.trim().to_string())
    }
}
