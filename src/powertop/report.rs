//! Powertop invocation and scratch report file lifecycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{trace, warn};

use crate::config::types::SamplerSettings;
use crate::system::executor;

/// Produces a CSV power report at a given path.
#[async_trait]
pub trait ReportTool: Send + Sync {
    /// Write a report to `report_path` and return the tool's stdout.
    async fn generate(&self, report_path: &Path) -> Result<String>;
}

/// `powertop --debug --csv=<path> --time=<secs>`
pub struct Powertop {
    path: PathBuf,
    duration_secs: u32,
    timeout: Duration,
}

impl Powertop {
    pub fn new(settings: &SamplerSettings) -> Self {
        Self {
            path: settings.powertop_path.clone(),
            duration_secs: settings.report_duration_secs,
            timeout: settings.command_timeout(),
        }
    }

    fn args(&self, report_path: &Path) -> Vec<String> {
        vec![
            "--debug".to_string(),
            format!("--csv={}", report_path.display()),
            format!("--time={}", self.duration_secs),
        ]
    }
}

#[async_trait]
impl ReportTool for Powertop {
    async fn generate(&self, report_path: &Path) -> Result<String> {
        executor::run_command(&self.path, &self.args(report_path), self.timeout).await
    }
}

/// A uniquely named report file in the scratch directory.
/// The file is removed when this value is dropped, on every exit path.
pub struct ScratchReport {
    path: PathBuf,
    file: Option<NamedTempFile>,
}

impl ScratchReport {
    pub fn create(scratch_dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("powertop_report")
            .suffix(".csv")
            .tempfile_in(scratch_dir)
            .with_context(|| format!("Failed to create report file in {:?}", scratch_dir))?;

        Ok(Self {
            path: file.path().to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Report contents as text. Invalid UTF-8 (process names, device
    /// strings) is replaced rather than failing the whole report.
    pub async fn read_to_string(&self) -> Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read report {:?}", self.path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for ScratchReport {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => trace!("Removed report file {:?}", self.path),
                Err(e) => warn!("Failed to remove report file {:?}: {}", self.path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powertop_arguments_request_csv_for_fixed_duration() {
        let tool = Powertop::new(&SamplerSettings::default());
        let args = tool.args(Path::new("/var/tmp/powertop_report123.csv"));
        assert_eq!(
            args,
            vec!["--debug", "--csv=/var/tmp/powertop_report123.csv", "--time=1"]
        );
    }

    #[test]
    fn scratch_report_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let report = ScratchReport::create(dir.path()).unwrap();
            assert!(report.path().exists());
            assert!(report.path().starts_with(dir.path()));
            report.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn removal_of_already_deleted_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let report = ScratchReport::create(dir.path()).unwrap();
        std::fs::remove_file(report.path()).unwrap();
        drop(report);
    }

    #[test]
    fn create_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScratchReport::create(&dir.path().join("missing")).is_err());
    }
}
