//! Centralized path resolution for outfitter
//!
//! Provides platform-aware path resolution with environment variable
//! overrides, so the catalog can live in a dotfiles repository and the
//! state directory can be relocated for tests.
//!
//! # Environment Variables
//!
//! - `OUTFITTER_CONFIG_DIR` - Override config directory (catalog location)
//! - `OUTFITTER_STATE_DIR` - Override state directory (ledger location)
//! - `OUTFITTER_WORKSPACE_DIR` - Override workspace root for session steps

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "OUTFITTER_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "OUTFITTER_STATE_DIR";

/// Environment variable for workspace directory override
pub const ENV_WORKSPACE_DIR: &str = "OUTFITTER_WORKSPACE_DIR";

/// Get the outfitter config directory path
///
/// Priority:
/// 1. `OUTFITTER_CONFIG_DIR` env var
/// 2. `XDG_CONFIG_HOME/outfitter`
/// 3. Default: `~/.config/outfitter`
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("outfitter");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("outfitter"))
}

/// Get the outfitter state directory path
///
/// Priority:
/// 1. `OUTFITTER_STATE_DIR` env var
/// 2. `XDG_STATE_HOME/outfitter`
/// 3. Default: `~/.local/state/outfitter`
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("outfitter");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("outfitter"))
}

/// Get the workspace root directory for session setup steps
///
/// Priority:
/// 1. `OUTFITTER_WORKSPACE_DIR` env var
/// 2. Default: `~/dev`
pub fn workspace_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_WORKSPACE_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using workspace dir from {}: {}",
            ENV_WORKSPACE_DIR,
            path.display()
        );
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join("dev"))
}

/// Resolve the catalog path: explicit flag wins, then the config dir.
pub fn catalog_path(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config_dir()?.join("catalog.toml")),
    }
}

/// Resolve the ledger path inside the state directory.
pub fn ledger_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("ledger.json"))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
