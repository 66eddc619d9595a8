//! Error types for tmux operations.

use std::io;

/// Result type alias for mux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving tmux.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// tmux binary is not on PATH.
    #[error("tmux not found on PATH")]
    TmuxNotFound,

    /// tmux exited non-zero.
    #[error("tmux failed: {0}")]
    TmuxFailed(String),

    /// Failed to spawn tmux.
    #[error("IO error running tmux: {0}")]
    Io(#[from] io::Error),
}
