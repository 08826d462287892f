//! Background runner for the configured init command.
//!
//! The command (for example `php app.php` or a `curl` with `XDEBUG_TRIGGER`) is
//! what makes the engine start and connect back. It runs on its own task while the
//! session blocks in `accept`, and it never touches session state: its only output
//! is a failure report sent over a channel.

use crate::{DebuggerError, Result};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Where init-command failures are delivered.
pub type LaunchReports = mpsc::UnboundedSender<DebuggerError>;

/// Run `command` through `sh -c` on a background task.
#[tracing::instrument(skip(reports))]
pub fn spawn_init_command(command: &str, reports: LaunchReports) -> JoinHandle<()> {
    let command = command.to_string();
    tokio::spawn(async move {
        match run_init_command(&command).await {
            Ok(output) => info!(command = %command, result = %output.trim_end(), "init command finished"),
            Err(e) => {
                error!(error = %e, "init command failed");
                let _ = reports.send(e);
            }
        }
    })
}

/// Run `command` to completion and return its combined stdout and stderr.
pub async fn run_init_command(command: &str) -> Result<String> {
    info!(command, "running init command");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| DebuggerError::InitCommandError {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(DebuggerError::InitCommandError {
            command: command.to_string(),
            reason: format!("{} out: {}", output.status, combined.trim_end()),
        });
    }

    Ok(combined)
}
