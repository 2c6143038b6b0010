//! Exporter configuration structs and defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub server: ServerSettings,
    pub sampler: SamplerSettings,
    pub firmware: FirmwareSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
    pub metrics_path: String,
    pub enable_comparison: bool,
}

/// Settings for the periodic powertop sampling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    pub interval_secs: f64,
    /// Passed to powertop as `--time`
    pub report_duration_secs: u32,
    pub powertop_path: PathBuf,
    /// Directory for the per-cycle CSV report files
    pub scratch_dir: PathBuf,
    pub command_timeout_secs: f64,
}

/// Settings for the on-device firmware collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareSettings {
    pub vcgencmd_path: PathBuf,
    pub command_timeout_secs: f64,
    pub device_model_path: PathBuf,
    /// Use the accessory power ceiling (e.g. NVMe HAT) when the model table has one
    pub accessory_attached: bool,
}

impl SamplerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs.max(0.1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.command_timeout_secs.max(0.1))
    }
}

impl FirmwareSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.command_timeout_secs.max(0.1))
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            sampler: SamplerSettings::default(),
            firmware: FirmwareSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8887".to_string(),
            metrics_path: "/metrics".to_string(),
            enable_comparison: false,
        }
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 2.0,
            report_duration_secs: 1,
            powertop_path: PathBuf::from("powertop"),
            scratch_dir: PathBuf::from("/var/tmp"),
            command_timeout_secs: 30.0,
        }
    }
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            vcgencmd_path: PathBuf::from("vcgencmd"),
            command_timeout_secs: 5.0,
            device_model_path: PathBuf::from("/proc/device-tree/model"),
            accessory_attached: false,
        }
    }
}
