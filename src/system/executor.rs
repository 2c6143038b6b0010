//! Bounded subprocess executor.
//! Spawns external tools (powertop, vcgencmd) and captures their stdout.
//! Every invocation carries a timeout; a child that outlives it is killed.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::trace;

/// Run `program args...`, wait at most `timeout`, and return stdout as text.
///
/// Fails when the program cannot be spawned, exits non-zero (stderr is
/// included in the error), or does not finish in time.
pub async fn run_command<S>(program: &Path, args: &[S], timeout: Duration) -> Result<String>
where
    S: AsRef<OsStr>,
{
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args).kill_on_drop(true);

    trace!("Executing: {:?} {:?}", program, cmd.as_std().get_args().collect::<Vec<_>>());

    // Dropping the output future on timeout drops the child, which kills it.
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| anyhow!("{:?} timed out after {:.1}s", program, timeout.as_secs_f64()))?
        .with_context(|| format!("Failed to execute {:?}", program))?;

    if !output.status.success() {
        return Err(anyhow!(
            "{:?} failed ({}): {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Resolve a bare program name against `PATH`; explicit paths are checked directly.
pub fn find_program(program: &Path) -> Option<std::path::PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_of_successful_command() {
        let out = run_command(Path::new("echo"), &["volt=1.2000V"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "volt=1.2000V");
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let err = run_command(Path::new("false"), &[] as &[&str], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let result = run_command(
            Path::new("definitely-not-a-real-binary-7f3a"),
            &["x"],
            Duration::from_secs(5),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_command(Path::new("sleep"), &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn find_program_handles_missing_binaries() {
        assert!(find_program(Path::new("definitely-not-a-real-binary-7f3a")).is_none());
        assert!(find_program(Path::new("/nonexistent/dir/vcgencmd")).is_none());
    }
}
