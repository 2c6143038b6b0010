//! Coarse power estimation.
//!
//! Known boards use their table entry; anything else falls back to
//! `V² × (MHz / 1000)`. Neither is calibrated.

use tracing::info;

pub const DEFAULT_CORE_VOLTAGE: f64 = 1.0;
pub const DEFAULT_CPU_FREQUENCY_MHZ: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerModelEntry {
    pub idle_power_watts: f64,
    pub max_power_watts: f64,
    pub max_power_with_accessory_watts: Option<f64>,
}

/// Matched by prefix against the device-tree model string.
pub static POWER_MODEL_TABLE: [(&str, PowerModelEntry); 2] = [
    (
        "Raspberry Pi 5 Model B",
        PowerModelEntry {
            idle_power_watts: 2.7,
            max_power_watts: 7.5,
            max_power_with_accessory_watts: Some(15.0),
        },
    ),
    (
        "Raspberry Pi 4 Model B",
        PowerModelEntry {
            idle_power_watts: 3.0,
            max_power_watts: 6.0,
            max_power_with_accessory_watts: None,
        },
    ),
];

fn find_model(identifier: &str) -> Option<&'static (&'static str, PowerModelEntry)> {
    let identifier = identifier.trim();
    POWER_MODEL_TABLE
        .iter()
        .find(|(model, _)| identifier.starts_with(model))
}

pub fn analytic_watts(core_voltage: f64, cpu_frequency_mhz: f64) -> f64 {
    core_voltage * core_voltage * (cpu_frequency_mhz / 1000.0)
}

pub trait PowerModel: Send + Sync {
    fn estimate_watts(&self, core_voltage: f64, cpu_frequency_mhz: f64) -> f64;

    fn describe(&self) -> String;
}

/// A board from [`POWER_MODEL_TABLE`]: the analytic figure clamped to the
/// board's idle..max range.
pub struct KnownModel {
    name: &'static str,
    entry: PowerModelEntry,
    accessory_attached: bool,
}

impl KnownModel {
    pub fn ceiling_watts(&self) -> f64 {
        match (self.accessory_attached, self.entry.max_power_with_accessory_watts) {
            (true, Some(ceiling)) => ceiling,
            _ => self.entry.max_power_watts,
        }
    }
}

impl PowerModel for KnownModel {
    fn estimate_watts(&self, core_voltage: f64, cpu_frequency_mhz: f64) -> f64 {
        analytic_watts(core_voltage, cpu_frequency_mhz).clamp(self.entry.idle_power_watts, self.ceiling_watts())
    }

    fn describe(&self) -> String {
        format!(
            "{} (idle {}W, max {}W)",
            self.name,
            self.entry.idle_power_watts,
            self.ceiling_watts()
        )
    }
}

pub struct AnalyticModel;

impl PowerModel for AnalyticModel {
    fn estimate_watts(&self, core_voltage: f64, cpu_frequency_mhz: f64) -> f64 {
        analytic_watts(core_voltage, cpu_frequency_mhz)
    }

    fn describe(&self) -> String {
        "analytic V²·f fallback".to_string()
    }
}

/// Table entry when the identifier is known, analytic formula otherwise.
pub fn select_model(identifier: Option<&str>, accessory_attached: bool) -> Box<dyn PowerModel> {
    let model: Box<dyn PowerModel> = match identifier.and_then(find_model) {
        Some(&(name, entry)) => Box::new(KnownModel {
            name,
            entry,
            accessory_attached,
        }),
        None => Box::new(AnalyticModel),
    };

    info!("Power model: {}", model.describe());
    model
}
