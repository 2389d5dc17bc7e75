//! Post-render notify command.

use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to spawn notify command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("notify command exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },
}

/// Run `command` through `sh -c` and wait for it.
pub fn run_notify(command: &str) -> Result<(), NotifyError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(NotifyError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NotifyError::ExitStatus {
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        debug!(command = %command, stdout = %stdout.trim(), "Notify output");
    }
    Ok(())
}
