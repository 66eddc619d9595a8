//! # mux
//!
//! Minimal tmux wrapper exposing exactly the contract a provisioning run
//! needs from a terminal multiplexer: "does session X exist", "create
//! session/window", and "send literal keystrokes to a window".
//!
//! Everything shells out to the `tmux` CLI; there is no control-mode
//! protocol here. Sessions are always created detached so a provisioning
//! run never steals the operator's terminal.

pub mod error;

pub use error::{Error, Result};

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Handle to the tmux CLI.
///
/// ## Supported operations
///
/// - `tmux has-session` - probe for a named session
/// - `tmux new-session -d` - create a detached session
/// - `tmux new-window` - add a named window
/// - `tmux send-keys` - type a literal line followed by Enter
pub struct Tmux;

impl Tmux {
    /// Check if tmux is available on this system.
    #[must_use]
    pub fn is_available() -> bool {
        Command::new("tmux")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Does a session with this exact name exist?
    ///
    /// A non-zero exit from `has-session` means "no such session"; only a
    /// failure to spawn tmux at all is an error.
    pub fn has_session(&self, name: &str) -> Result<bool> {
        let status = Command::new("tmux")
            .args(has_session_args(name))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(map_spawn_error)?;
        Ok(status.success())
    }

    /// Create a detached session, optionally rooted at a directory.
    pub fn new_session(&self, name: &str, root: Option<&Path>) -> Result<()> {
        let root = root.map(|p| p.display().to_string());
        self.run(&new_session_args(name, root.as_deref()))
    }

    /// Create a named window inside an existing session.
    pub fn new_window(&self, session: &str, name: &str) -> Result<()> {
        self.run(&new_window_args(session, name))
    }

    /// Send one literal line of keystrokes to a window, followed by Enter.
    pub fn send_line(&self, session: &str, window: &str, line: &str) -> Result<()> {
        self.run(&send_line_args(session, window, line))
    }

    /// Run a tmux command, failing on non-zero exit.
    fn run(&self, args: &[String]) -> Result<()> {
        log::debug!("tmux {}", args.join(" "));
        let output = Command::new("tmux")
            .args(args)
            .output()
            .map_err(map_spawn_error)?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::TmuxFailed(stderr.trim().to_string()))
        }
    }
}

fn map_spawn_error(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::TmuxNotFound
    } else {
        Error::Io(e)
    }
}

// Argument builders are split out so the exact CLI surface is testable
// without a running tmux server.

fn has_session_args(name: &str) -> Vec<String> {
    // `=` forces an exact match instead of tmux's prefix matching.
    vec!["has-session".into(), "-t".into(), format!("={name}")]
}

fn new_session_args(name: &str, root: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = vec!["new-session".into(), "-d".into(), "-s".into(), name.into()];
    if let Some(root) = root {
        args.push("-c".into());
        args.push(root.into());
    }
    args
}

fn new_window_args(session: &str, name: &str) -> Vec<String> {
    vec![
        "new-window".into(),
        "-t".into(),
        format!("{session}:"),
        "-n".into(),
        name.into(),
    ]
}

fn send_line_args(session: &str, window: &str, line: &str) -> Vec<String> {
    // The line is passed as a single literal argument; C-m presses Enter.
    vec![
        "send-keys".into(),
        "-t".into(),
        format!("{session}:{window}"),
        line.into(),
        "C-m".into(),
    ]
}
