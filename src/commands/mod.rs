pub mod apply;
pub mod doctor;
pub mod ledger;
pub mod plan;
pub mod status;

use std::path::Path;

use anyhow::{Context as _, Result};
use mux::Tmux;
use provision::{Multiplexer, NullMux, RunContext, Step};

use crate::{paths, ui};

/// Bridge the mux crate's tmux handle into the engine's multiplexer
/// contract.
pub struct TmuxBridge {
    tmux: Tmux,
}

impl Multiplexer for TmuxBridge {
    fn has_session(&self, name: &str) -> provision::Result<bool> {
        self.tmux
            .has_session(name)
            .map_err(|e| provision::Error::Mux(e.to_string()))
    }

    fn create_session(&self, name: &str, root: Option<&Path>) -> provision::Result<()> {
        self.tmux
            .new_session(name, root)
            .map_err(|e| provision::Error::Mux(e.to_string()))
    }

    fn create_window(&self, session: &str, name: &str) -> provision::Result<()> {
        self.tmux
            .new_window(session, name)
            .map_err(|e| provision::Error::Mux(e.to_string()))
    }

    fn send_line(&self, session: &str, window: &str, line: &str) -> provision::Result<()> {
        self.tmux
            .send_line(session, window, line)
            .map_err(|e| provision::Error::Mux(e.to_string()))
    }
}

/// Pick the real multiplexer when tmux is installed, otherwise a null
/// implementation that fails session steps cleanly.
pub fn make_mux() -> Box<dyn Multiplexer> {
    if Tmux::is_available() {
        Box::new(TmuxBridge { tmux: Tmux })
    } else {
        log::debug!("tmux not found; session steps will fail if reached");
        Box::new(NullMux)
    }
}

/// Build the immutable per-run context from the execution environment.
pub fn build_run_context() -> Result<RunContext> {
    let account = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let workspace = paths::workspace_dir()?;

    Ok(RunContext {
        account,
        home,
        workspace,
        arch: std::env::consts::ARCH.to_string(),
        elevation_available: provision::process::command_exists("sudo"),
        assume_network: true,
    })
}

/// Load and validate the catalog, exiting with code 2 on any catalog
/// error: a bad catalog aborts before any step executes, ledger untouched.
pub fn load_catalog_or_exit(flag: Option<&Path>) -> Vec<Step> {
    let path = match paths::catalog_path(flag) {
        Ok(path) => path,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            std::process::exit(2);
        }
    };

    match provision::catalog::load(&path) {
        Ok(steps) => steps,
        Err(e) => {
            ui::error(&format!("{e}"));
            ui::dim(e.kind().hint());
            std::process::exit(2);
        }
    }
}
