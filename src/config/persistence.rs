//! Config file loading.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::types::ExporterConfig;

/// Load configuration from `path`, or return defaults when no path is given.
/// An explicit path that is missing or malformed is an error.
pub async fn load_config(path: Option<&Path>) -> Result<ExporterConfig> {
    let Some(config_path) = path else {
        return Ok(ExporterConfig::default());
    };

    let content = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("Failed to read config file {:?}", config_path))?;
    let config: ExporterConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

    Ok(config)
}
