//! Host platform detection.

use std::path::Path;

use tracing::debug;

use crate::config::types::FirmwareSettings;
use crate::system::executor;

/// Device-tree model string, e.g. "Raspberry Pi 5 Model B Rev 1.0".
/// The firmware pads it with NUL bytes; those are stripped.
pub fn read_device_model(path: &Path) -> Option<String> {
    let raw = std::fs::read(path).ok()?;
    let model = String::from_utf8_lossy(&raw)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    if model.is_empty() {
        None
    } else {
        Some(model)
    }
}

/// True when `vcgencmd` is available and the device-tree model names a Raspberry Pi.
pub fn is_raspberry_pi(settings: &FirmwareSettings) -> bool {
    let Some(vcgencmd) = executor::find_program(&settings.vcgencmd_path) else {
        debug!("{:?} not found, not a Raspberry Pi", settings.vcgencmd_path);
        return false;
    };

    match read_device_model(&settings.device_model_path) {
        Some(model) if model.to_lowercase().contains("raspberry pi") => {
            debug!("Detected {} ({:?})", model, vcgencmd);
            true
        }
        Some(model) => {
            debug!("Device model {:?} is not a Raspberry Pi", model);
            false
        }
        None => false,
    }
}
