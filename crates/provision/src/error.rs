//! Error types for provisioning operations.
//!
//! Every failure carries a kind so the caller can print the step name, the
//! error kind, and a remediation hint without matching on variants.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a provisioning error.
///
/// Kinds drive user-facing reporting: each one has a short description and
/// a remediation hint shown next to the failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Catalog authoring defect (duplicate name, phase regression, bad shape).
    Catalog,
    /// Network or transport failure while fetching an artifact.
    Fetch,
    /// Digest mismatch on a downloaded artifact.
    Integrity,
    /// Package manager or installer exited non-zero.
    Install,
    /// Elevation required but unavailable or denied.
    Permission,
    /// Terminal multiplexer operation failed.
    Mux,
    /// Ledger or other local I/O failure.
    Io,
}

impl ErrorKind {
    /// Short label used in failure reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Fetch => "fetch",
            Self::Integrity => "integrity",
            Self::Install => "install",
            Self::Permission => "permission",
            Self::Mux => "multiplexer",
            Self::Io => "io",
        }
    }

    /// Actionable advice shown next to a failing step.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Catalog => "Fix the catalog file; no steps ran",
            Self::Fetch => "Check network connectivity and re-run to retry",
            Self::Integrity => "The download did not match its pinned digest; verify the catalog entry",
            Self::Install => "Inspect the installer output and re-run to retry",
            Self::Permission => "Ensure sudo is available, or mark the step unprivileged",
            Self::Mux => "Check that tmux is installed and the session name is free",
            Self::Io => "Check filesystem permissions and free space",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Errors that can occur while loading a catalog or executing steps.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two steps in the catalog share a name.
    #[error("duplicate step name: {0}")]
    DuplicateName(String),

    /// Phase numbers must be monotonically non-decreasing in declaration order.
    #[error("step {step}: phase {phase} declared after phase {previous}")]
    PhaseOrder {
        /// Offending step name.
        step: String,
        /// Phase declared on the offending step.
        phase: u32,
        /// Highest phase seen before it.
        previous: u32,
    },

    /// The catalog file is malformed or violates a validation rule.
    #[error("invalid catalog: {0}")]
    Catalog(String),

    /// Only encrypted, authenticated transports are accepted.
    #[error("insecure url rejected (https required): {0}")]
    InsecureUrl(String),

    /// Network or transport failure.
    #[error("fetch failed for {url}: {message}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// Human-readable failure description.
        message: String,
    },

    /// Downloaded bytes did not match the expected digest.
    #[error("digest mismatch for {url}: expected {expected}, got {actual}")]
    Integrity {
        /// URL that was downloaded.
        url: String,
        /// Digest pinned in the catalog.
        expected: String,
        /// Digest of the bytes actually received.
        actual: String,
    },

    /// Installer or package manager failed.
    #[error("install failed: {0}")]
    Install(String),

    /// Elevation required but unavailable or denied.
    #[error("elevation unavailable: {0}")]
    Permission(String),

    /// Terminal multiplexer operation failed.
    #[error("multiplexer error: {0}")]
    Mux(String),

    /// Failed to spawn or talk to a subprocess.
    #[error("failed to run {command}: {message}")]
    Command {
        /// Program that was invoked.
        command: String,
        /// Underlying failure.
        message: String,
    },

    /// I/O error with path context.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The kind of this error, for reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateName(_) | Self::PhaseOrder { .. } | Self::Catalog(_) => {
                ErrorKind::Catalog
            }
            Self::InsecureUrl(_) | Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Install(_) | Self::Command { .. } => ErrorKind::Install,
            Self::Permission(_) => ErrorKind::Permission,
            Self::Mux(_) => ErrorKind::Mux,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
