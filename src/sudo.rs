//! Scoped sudo context: the single audited elevation boundary
//!
//! Sudo is never requested for the entire process. Instead:
//! 1. The catalog marks which steps need root (allowlist by declaration)
//! 2. The pending set is computed first (no sudo needed)
//! 3. Sudo is acquired once, only if a pending step requires it
//! 4. Sudo is released when the context drops

use anyhow::{Context, Result, bail};
use provision::{CommandOutput, SudoProvider};
use std::process::{Command, Output};

/// Scoped sudo context - invalidates the sudo timestamp on drop
pub struct SudoContext {
    validated: bool,
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to the user
    pub fn acquire(reason: &str) -> Result<Self> {
        eprintln!();
        eprintln!("  Sudo required: {reason}");
        eprintln!();

        // Validate sudo (will prompt for password)
        let status = Command::new("sudo")
            .args(["-v"])
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        Ok(Self { validated: true })
    }

    /// Check if sudo is currently valid (without prompting)
    pub fn is_valid() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run_internal(&self, cmd: &str, args: &[&str]) -> provision::Result<Output> {
        if !self.validated {
            return Err(provision::Error::Permission(
                "sudo context not validated".to_string(),
            ));
        }

        Command::new("sudo")
            .arg(cmd)
            .args(args)
            .output()
            .map_err(|e| provision::Error::Command {
                command: format!("sudo {cmd}"),
                message: e.to_string(),
            })
    }
}

/// The engine's elevation boundary runs through this impl: a fixed command
/// plus typed arguments, never a shell string.
impl SudoProvider for SudoContext {
    fn run(&self, cmd: &str, args: &[&str]) -> provision::Result<CommandOutput> {
        let output = self.run_internal(cmd, args)?;
        Ok(output.into())
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        // Invalidate sudo timestamp to release privileges
        let _ = Command::new("sudo").args(["-k"]).status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvalidated_context_refuses_to_run() {
        let ctx = SudoContext { validated: false };
        let err = ctx.run("apt-get", &["install", "-y", "--", "git"]).unwrap_err();
        assert!(matches!(err, provision::Error::Permission(_)));
    }

    #[test]
    fn is_valid_does_not_panic() {
        // May be true or false depending on the environment.
        let _ = SudoContext::is_valid();
    }
}
