//! Firmware readings and the collector's cached snapshot.

use std::collections::BTreeMap;

use super::decode::ThrottleState;

/// SDRAM voltage rails, by `measure_volts sdram_<code>` code.
pub const SDRAM_RAILS: [&str; 3] = ["c", "i", "p"];

/// Clock domains reported under `rpi_clock_frequency_hz{component}`.
pub const CLOCK_DOMAINS: [&str; 7] = ["core", "arm", "v3d", "uart", "emmc", "pixel", "hdmi"];

/// Memory split halves queried with `get_mem`.
pub const MEMORY_TYPES: [&str; 2] = ["gpu", "arm"];

/// Values obtained in one collection pass. Items whose command failed are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirmwareReadings {
    pub core_voltage: Option<f64>,
    pub sdram_voltages: BTreeMap<&'static str, f64>,
    pub cpu_frequency_mhz: Option<f64>,
    pub cpu_temperature_celsius: Option<f64>,
    pub clock_frequencies_hz: BTreeMap<&'static str, f64>,
    pub throttle: Option<ThrottleState>,
    pub memory_split_mb: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerEstimate {
    pub watts: f64,
    pub kilowatts: f64,
    pub kwh_per_day: f64,
    pub kwh_per_month: f64,
}

impl PowerEstimate {
    pub fn from_watts(watts: f64) -> Self {
        let kilowatts = watts / 1000.0;
        Self {
            watts,
            kilowatts,
            kwh_per_day: kilowatts * 24.0,
            kwh_per_month: kilowatts * 24.0 * 30.0,
        }
    }
}

/// Most recent complete pass, refreshed in place under the collector lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorSnapshot {
    pub readings: FirmwareReadings,
    pub power: PowerEstimate,
    pub passes: u64,
}
