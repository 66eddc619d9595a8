//! Subprocess helpers shared by presence checks and installers.

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Run a command and capture stdout, failing on non-zero exit.
pub fn run_capture<S: AsRef<OsStr>>(cmd: &str, args: &[S]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .map_err(|e| Error::Command {
            command: cmd.to_string(),
            message: e.to_string(),
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Command {
            command: cmd.to_string(),
            message: stderr.trim().to_string(),
        })
    }
}

/// Run a command silently, returning success/failure.
pub fn run_quiet<S: AsRef<OsStr>>(cmd: &str, args: &[S]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a command resolves on PATH.
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
