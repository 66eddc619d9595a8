//! Step descriptors: the unit of provisioning work.
//!
//! Steps are defined statically in the catalog, never mutated at run time,
//! and consumed read-only by the runner. A step bundles a presence
//! predicate, an optional fetch spec, and an install action.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use crate::context::Multiplexer;
use crate::error::{Error, Result};
use crate::fetch::validate_sha256;
use crate::process;

/// Whether a step failure aborts the whole run or is merely recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FatalityPolicy {
    /// Record the failure and keep going.
    #[default]
    Continue,
    /// Stop processing further steps.
    Abort,
}

/// A check answering "is this step's effect already in place".
///
/// Always evaluated live against the system; the ledger is never trusted
/// alone, so manual uninstalls and partial prior runs are tolerated.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Presence {
    /// A binary resolves on PATH.
    CommandExists {
        /// Binary name to look up.
        command: String,
    },
    /// A file or directory exists. Supports `~` and env expansion.
    PathExists {
        /// Path to probe.
        path: String,
    },
    /// The system package manager reports every named package installed.
    DpkgInstalled {
        /// Package names to query.
        packages: Vec<String>,
    },
    /// The terminal multiplexer reports a named session.
    SessionExists {
        /// Session name to probe.
        session: String,
    },
}

impl Presence {
    /// Evaluate the predicate against the live system.
    pub fn evaluate(&self, mux: &dyn Multiplexer) -> Result<bool> {
        match self {
            Self::CommandExists { command } => Ok(process::command_exists(command)),
            Self::PathExists { path } => Ok(expand(path).exists()),
            Self::DpkgInstalled { packages } => {
                for pkg in packages {
                    if !dpkg_installed(pkg)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::SessionExists { session } => mux.has_session(session),
        }
    }
}

/// Query dpkg for a single package's install state.
///
/// An unknown package exits non-zero, which means "not installed"; only a
/// failure to spawn dpkg-query at all is an error.
fn dpkg_installed(package: &str) -> Result<bool> {
    let output = Command::new("dpkg-query")
        .args(["-W", "-f=${Status}", package])
        .output()
        .map_err(|e| Error::Command {
            command: "dpkg-query".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Ok(false);
    }
    let status = String::from_utf8_lossy(&output.stdout);
    Ok(status.contains("install ok installed"))
}

/// Remote artifact to retrieve before installing.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSpec {
    /// Download URL. Must be https.
    pub url: String,
    /// Expected SHA-256 of the downloaded bytes (64 lowercase hex chars).
    #[serde(default)]
    pub sha256: Option<String>,
}

/// One window inside a workspace session.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowSpec {
    /// Window name.
    pub name: String,
    /// Literal lines of keystrokes sent to the window after creation.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// How a step applies its artifact (or package list) to the system.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallAction {
    /// Delegate to the system package manager by name list.
    Packages {
        /// Package names to install.
        packages: Vec<String>,
    },
    /// Execute the fetched installer with a bounded, explicit argument list.
    Script {
        /// Arguments passed verbatim to the installer.
        #[serde(default)]
        args: Vec<String>,
    },
    /// Install the fetched file to a destination path, mode 0755.
    Binary {
        /// Destination path. Supports `~` and env expansion.
        dest: String,
    },
    /// Unpack one member of a fetched `.tar.gz` archive to a destination,
    /// mode 0755.
    Tarball {
        /// Archive member to extract (matched by path suffix).
        member: String,
        /// Destination path. Supports `~` and env expansion.
        dest: String,
    },
    /// Create a multiplexer session with named windows and initial keys.
    Session {
        /// Session name.
        session: String,
        /// Working directory for the session. Supports expansion.
        #[serde(default)]
        root: Option<String>,
        /// Windows to create inside the session.
        #[serde(default)]
        windows: Vec<WindowSpec>,
    },
}

impl InstallAction {
    /// Does this action consume a fetched artifact?
    #[must_use]
    pub fn needs_artifact(&self) -> bool {
        matches!(
            self,
            Self::Script { .. } | Self::Binary { .. } | Self::Tarball { .. }
        )
    }

    /// Short label for reporting.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Packages { .. } => "packages",
            Self::Script { .. } => "script",
            Self::Binary { .. } => "binary",
            Self::Tarball { .. } => "tarball",
            Self::Session { .. } => "session",
        }
    }
}

/// One idempotent unit of provisioning work.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Unique name across the catalog.
    pub name: String,
    /// Reporting phase. Monotonically non-decreasing in declaration order.
    #[serde(default)]
    pub phase: u32,
    /// Presence predicate deciding whether the step is already satisfied.
    pub presence: Presence,
    /// Remote artifact to fetch, if the action needs one.
    #[serde(default)]
    pub fetch: Option<FetchSpec>,
    /// Install action applied when the step is not satisfied.
    pub action: InstallAction,
    /// Whether a failure aborts the run.
    #[serde(default)]
    pub fatality: FatalityPolicy,
    /// Whether the install action runs through the elevation boundary.
    #[serde(default)]
    pub requires_root: bool,
    /// Version string recorded in the ledger on success.
    #[serde(default)]
    pub version: Option<String>,
}

impl Step {
    /// Validate internal coherence of a single step.
    ///
    /// Catalog-wide rules (unique names, phase ordering) live in the
    /// registry; this checks only what one step can violate on its own.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Catalog("step with empty name".to_string()));
        }

        if let Some(fetch) = &self.fetch {
            if let Some(digest) = &fetch.sha256 {
                validate_sha256(digest)
                    .map_err(|e| Error::Catalog(format!("step {}: {e}", self.name)))?;
            }
            // Running a downloaded artifact with elevated rights requires a
            // pinned digest. Unprivileged fetches may omit it.
            if self.requires_root && fetch.sha256.is_none() {
                return Err(Error::Catalog(format!(
                    "step {}: privileged fetch requires a sha256 digest",
                    self.name
                )));
            }
        }

        if self.action.needs_artifact() && self.fetch.is_none() {
            return Err(Error::Catalog(format!(
                "step {}: action '{}' requires a fetch url",
                self.name,
                self.action.label()
            )));
        }
        if !self.action.needs_artifact() && self.fetch.is_some() {
            return Err(Error::Catalog(format!(
                "step {}: action '{}' does not consume a fetched artifact",
                self.name,
                self.action.label()
            )));
        }

        match &self.action {
            InstallAction::Packages { packages } => {
                if packages.is_empty() {
                    return Err(Error::Catalog(format!(
                        "step {}: empty package list",
                        self.name
                    )));
                }
                if !self.requires_root {
                    return Err(Error::Catalog(format!(
                        "step {}: package installation requires root",
                        self.name
                    )));
                }
            }
            InstallAction::Session { session, .. } => {
                if session.trim().is_empty() {
                    return Err(Error::Catalog(format!(
                        "step {}: empty session name",
                        self.name
                    )));
                }
                if self.requires_root {
                    return Err(Error::Catalog(format!(
                        "step {}: session setup never escalates",
                        self.name
                    )));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Human-readable description for progress output.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.action {
            InstallAction::Packages { packages } => {
                format!("install packages {}", packages.join(", "))
            }
            InstallAction::Script { .. } => format!("run installer for {}", self.name),
            InstallAction::Binary { dest } => format!("install binary to {dest}"),
            InstallAction::Tarball { member, dest } => {
                format!("unpack {member} to {dest}")
            }
            InstallAction::Session { session, .. } => {
                format!("set up session '{session}'")
            }
        }
    }
}

/// Expand `~` and environment variables in a catalog path.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NullMux;

    fn binary_step(name: &str) -> Step {
        Step {
            name: name.to_string(),
            phase: 1,
            presence: Presence::CommandExists {
                command: name.to_string(),
            },
            fetch: Some(FetchSpec {
                url: "https://example.com/tool".to_string(),
                sha256: None,
            }),
            action: InstallAction::Binary {
                dest: "~/.local/bin/tool".to_string(),
            },
            fatality: FatalityPolicy::Continue,
            requires_root: false,
            version: None,
        }
    }

    #[test]
    fn parses_step_from_toml() {
        let step: Step = toml::from_str(
            r#"
            name = "ripgrep"
            phase = 2
            fatality = "abort"
            version = "14.1.0"

            [presence]
            kind = "command-exists"
            command = "rg"

            [fetch]
            url = "https://example.com/ripgrep.tar.gz"
            sha256 = "0000000000000000000000000000000000000000000000000000000000000000"

            [action]
            kind = "tarball"
            member = "rg"
            dest = "~/.local/bin/rg"
            "#,
        )
        .unwrap();

        assert_eq!(step.name, "ripgrep");
        assert_eq!(step.phase, 2);
        assert_eq!(step.fatality, FatalityPolicy::Abort);
        assert!(!step.requires_root);
        step.validate().unwrap();
    }

    #[test]
    fn default_fatality_is_continue() {
        let step = binary_step("rg");
        assert_eq!(step.fatality, FatalityPolicy::Continue);
    }

    #[test]
    fn privileged_fetch_without_digest_is_rejected() {
        let mut step = binary_step("rg");
        step.requires_root = true;
        let err = step.validate().unwrap_err();
        assert!(err.to_string().contains("sha256"));
    }

    #[test]
    fn privileged_fetch_with_digest_is_accepted() {
        let mut step = binary_step("rg");
        step.requires_root = true;
        step.fetch.as_mut().unwrap().sha256 = Some("a".repeat(64));
        step.validate().unwrap();
    }

    #[test]
    fn artifact_action_requires_fetch_url() {
        let mut step = binary_step("rg");
        step.fetch = None;
        assert!(step.validate().is_err());
    }

    #[test]
    fn package_action_must_not_fetch() {
        let step = Step {
            name: "base".to_string(),
            phase: 0,
            presence: Presence::DpkgInstalled {
                packages: vec!["git".to_string()],
            },
            fetch: Some(FetchSpec {
                url: "https://example.com/x".to_string(),
                sha256: None,
            }),
            action: InstallAction::Packages {
                packages: vec!["git".to_string()],
            },
            fatality: FatalityPolicy::Abort,
            requires_root: true,
            version: None,
        };
        assert!(step.validate().is_err());
    }

    #[test]
    fn package_action_requires_root() {
        let step = Step {
            name: "base".to_string(),
            phase: 0,
            presence: Presence::DpkgInstalled {
                packages: vec!["git".to_string()],
            },
            fetch: None,
            action: InstallAction::Packages {
                packages: vec!["git".to_string()],
            },
            fatality: FatalityPolicy::Abort,
            requires_root: false,
            version: None,
        };
        assert!(step.validate().is_err());
    }

    #[test]
    fn session_step_never_escalates() {
        let step = Step {
            name: "workspace".to_string(),
            phase: 9,
            presence: Presence::SessionExists {
                session: "dev".to_string(),
            },
            fetch: None,
            action: InstallAction::Session {
                session: "dev".to_string(),
                root: None,
                windows: vec![],
            },
            fatality: FatalityPolicy::Continue,
            requires_root: true,
            version: None,
        };
        assert!(step.validate().is_err());
    }

    #[test]
    fn bad_digest_format_is_a_catalog_error() {
        let mut step = binary_step("rg");
        step.fetch.as_mut().unwrap().sha256 = Some("not-hex".to_string());
        let err = step.validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Catalog);
    }

    #[test]
    fn path_presence_expands_and_probes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("marker");
        let presence = Presence::PathExists {
            path: file.display().to_string(),
        };
        assert!(!presence.evaluate(&NullMux).unwrap());
        std::fs::write(&file, b"x").unwrap();
        assert!(presence.evaluate(&NullMux).unwrap());
    }

    #[test]
    fn session_presence_asks_the_multiplexer() {
        let presence = Presence::SessionExists {
            session: "dev".to_string(),
        };
        // NullMux always reports absent.
        assert!(!presence.evaluate(&NullMux).unwrap());
    }

    #[test]
    fn expand_handles_tilde() {
        let expanded = expand("~/bin/tool");
        assert!(!expanded.display().to_string().starts_with('~'));
    }
}
