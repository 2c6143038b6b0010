//! Decoders for `vcgencmd` output lines.
//!
//! Every command answers with one `key=value` line:
//!   measure_volts core  -> "volt=0.8600V"
//!   measure_temp        -> "temp=47.2'C"
//!   measure_clock arm   -> "frequency(48)=1500000000"
//!   get_mem gpu         -> "gpu=76M"
//!   get_throttled       -> "throttled=0x50005"

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("no '=' separator in {0:?}")]
    MissingSeparator(String),
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

/// Bit position and name of each throttle flag reported by `get_throttled`.
pub const THROTTLE_FLAGS: [(u32, &str); 8] = [
    (0, "under_voltage_detected"),
    (1, "freq_capped"),
    (2, "throttling_active"),
    (3, "soft_temp_limit"),
    (16, "under_voltage_occurred"),
    (17, "freq_capped_occurred"),
    (18, "throttling_occurred"),
    (19, "soft_temp_limit_occurred"),
];

/// The eight named flags decoded from one throttle bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    flags: [(&'static str, bool); 8],
}

impl ThrottleState {
    pub fn decode(mask: u32) -> Self {
        let mut flags = [("", false); 8];
        for (slot, (bit, name)) in flags.iter_mut().zip(THROTTLE_FLAGS) {
            *slot = (name, mask & (1 << bit) != 0);
        }
        Self { flags }
    }

    /// Flags in bit order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.flags.iter().copied()
    }
}

/// The value part of the first non-empty line, trimmed.
pub fn split_value(output: &str) -> Result<&str, DecodeError> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    line.split_once('=')
        .map(|(_, value)| value.trim())
        .ok_or_else(|| DecodeError::MissingSeparator(line.to_string()))
}

/// Volts, from `volt=0.8600V`.
pub fn parse_voltage(output: &str) -> Result<f64, DecodeError> {
    parse_float(split_value(output)?.trim_end_matches('V'))
}

/// Degrees Celsius, from `temp=47.2'C`.
pub fn parse_temperature(output: &str) -> Result<f64, DecodeError> {
    parse_float(split_value(output)?.trim_end_matches("'C"))
}

/// Hertz, from `frequency(48)=1500000000`.
pub fn parse_clock_hz(output: &str) -> Result<f64, DecodeError> {
    parse_float(split_value(output)?)
}

/// Megabytes, from `gpu=76M`.
pub fn parse_memory_mb(output: &str) -> Result<u64, DecodeError> {
    let value = split_value(output)?.trim_end_matches('M');
    value
        .parse()
        .map_err(|_| DecodeError::InvalidNumber(value.to_string()))
}

/// Bitmask from `throttled=0x50005`. The `0x` prefix is optional.
pub fn parse_throttled(output: &str) -> Result<u32, DecodeError> {
    let value = split_value(output)?;
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|_| DecodeError::InvalidNumber(value.to_string()))
}

fn parse_float(value: &str) -> Result<f64, DecodeError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::InvalidNumber(value.to_string()))
}
