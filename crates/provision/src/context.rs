//! Run context and provider traits.
//!
//! The context is constructed once at startup and stays immutable for the
//! whole run. Provider traits keep the engine free of hard dependencies on
//! a concrete sudo implementation, terminal multiplexer, or UI.

use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::runner::StepStatus;
use crate::step::Step;

/// Ambient configuration threaded through every step.
///
/// Immutable for the duration of one run; never persisted.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Target account name (ledger metadata).
    pub account: String,
    /// Target home directory.
    pub home: PathBuf,
    /// Workspace root for session setup steps.
    pub workspace: PathBuf,
    /// CPU architecture string (e.g. `x86_64`).
    pub arch: String,
    /// Whether privilege elevation is available at all.
    pub elevation_available: bool,
    /// Whether the run assumes network reachability.
    pub assume_network: bool,
}

/// Provider for elevated privilege operations.
///
/// Every privileged execution path in the engine goes through this single
/// boundary with a fixed command plus typed arguments.
pub trait SudoProvider {
    /// Run a command with elevated privileges.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Contract with the terminal/session multiplexer collaborator.
///
/// The engine only needs these three capabilities: existence probe,
/// session/window creation, and sending literal keystrokes.
pub trait Multiplexer {
    /// Does a session with this name exist?
    fn has_session(&self, name: &str) -> Result<bool>;

    /// Create a detached session, optionally rooted at a directory.
    fn create_session(&self, name: &str, root: Option<&std::path::Path>) -> Result<()>;

    /// Create a named window inside an existing session.
    fn create_window(&self, session: &str, name: &str) -> Result<()>;

    /// Send one literal line of keystrokes to a window.
    fn send_line(&self, session: &str, window: &str, line: &str) -> Result<()>;
}

/// Multiplexer stand-in used when no multiplexer is available.
///
/// Presence probes report absent; any mutation fails the step cleanly.
pub struct NullMux;

impl Multiplexer for NullMux {
    fn has_session(&self, _name: &str) -> Result<bool> {
        Ok(false)
    }

    fn create_session(&self, name: &str, _root: Option<&std::path::Path>) -> Result<()> {
        Err(crate::error::Error::Mux(format!(
            "no multiplexer available to create session '{name}'"
        )))
    }

    fn create_window(&self, session: &str, _name: &str) -> Result<()> {
        Err(crate::error::Error::Mux(format!(
            "no multiplexer available for session '{session}'"
        )))
    }

    fn send_line(&self, session: &str, _window: &str, _line: &str) -> Result<()> {
        Err(crate::error::Error::Mux(format!(
            "no multiplexer available for session '{session}'"
        )))
    }
}

/// Progress callback for run reporting.
pub trait ProgressCallback {
    /// Called before a step's presence check.
    fn on_step_start(&mut self, step: &Step, index: usize, total: usize);

    /// Called once the step reaches a terminal state.
    fn on_step_complete(&mut self, step: &Step, status: &StepStatus);
}

/// No-op progress callback.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&mut self, _step: &Step, _index: usize, _total: usize) {}
    fn on_step_complete(&mut self, _step: &Step, _status: &StepStatus) {}
}

/// Cooperative cancellation flag, checked at step boundaries only.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler: this is a
    /// single atomic store with no allocation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Output from a privileged command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Captured stdout bytes.
    pub stdout: Vec<u8>,
    /// Captured stderr bytes.
    pub stderr: Vec<u8>,
    /// Whether the command exited successfully.
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string.
    #[must_use]
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string.
    #[must_use]
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
