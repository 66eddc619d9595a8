//! Installer executor: applies a step's install action to the system.
//!
//! The executor may assume the presence predicate was false on entry; the
//! runner enforces skip-if-present before calling in. Privileged actions go
//! through the [`SudoProvider`] boundary with fixed command templates and
//! typed arguments; downloaded content is never interpolated into a shell
//! invocation.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;

use crate::context::{Multiplexer, RunContext, SudoProvider};
use crate::error::{Error, Result};
use crate::fetch::{self, Fetcher};
use crate::step::{InstallAction, Step, WindowSpec, expand};

/// Result of a successful install action.
#[derive(Debug, Clone, Default)]
pub struct InstallOutcome {
    /// Version string to record in the ledger, if the catalog declares one.
    pub version: Option<String>,
}

/// Boundary between the runner and the machinery that changes the system.
///
/// Production uses [`Installer`]; tests substitute a stub to observe how
/// often and in what order the runner fires install actions.
pub trait StepExecutor {
    /// Fetch (if needed) and apply one step.
    fn execute(&self, step: &Step, ctx: &RunContext) -> Result<InstallOutcome>;
}

/// Production executor: fetches artifacts into per-step scratch space and
/// applies install actions, escalating only for steps marked root.
pub struct Installer<'a> {
    fetcher: Fetcher,
    sudo: Option<&'a dyn SudoProvider>,
    mux: &'a dyn Multiplexer,
}

impl<'a> Installer<'a> {
    /// Create an executor.
    ///
    /// `sudo` is `None` when elevation is unavailable; steps that require
    /// root then fail with a permission error instead of escalating.
    pub fn new(
        fetcher: Fetcher,
        sudo: Option<&'a dyn SudoProvider>,
        mux: &'a dyn Multiplexer,
    ) -> Self {
        Self { fetcher, sudo, mux }
    }

    fn install_packages(
        &self,
        packages: &[String],
        sudo: Option<&dyn SudoProvider>,
    ) -> Result<()> {
        let sudo = sudo.ok_or_else(|| {
            Error::Permission("package installation requires elevation".to_string())
        })?;

        // Fixed template: apt-get install -y -- <names>.
        let mut args: Vec<&str> = vec!["install", "-y", "--"];
        args.extend(packages.iter().map(String::as_str));

        let output = sudo.run("apt-get", &args)?;
        if !output.success {
            return Err(Error::Install(format!(
                "apt-get failed: {}",
                output.stderr_str().trim()
            )));
        }
        Ok(())
    }

    fn run_script(
        &self,
        artifact: &Path,
        args: &[String],
        sudo: Option<&dyn SudoProvider>,
    ) -> Result<()> {
        make_executable(artifact)?;
        let path_str = utf8_path(artifact)?;

        match sudo {
            Some(sudo) => {
                let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
                let output = sudo.run(path_str, &arg_refs)?;
                if !output.success {
                    return Err(Error::Install(format!(
                        "installer exited non-zero: {}",
                        output.stderr_str().trim()
                    )));
                }
            }
            None => {
                let output = Command::new(artifact)
                    .args(args)
                    .output()
                    .map_err(|e| Error::Command {
                        command: artifact.display().to_string(),
                        message: e.to_string(),
                    })?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::Install(format!(
                        "installer exited non-zero: {}",
                        stderr.trim()
                    )));
                }
            }
        }
        Ok(())
    }

    fn install_file(&self, src: &Path, dest: &str, sudo: Option<&dyn SudoProvider>) -> Result<()> {
        let dest = expand(dest);

        match sudo {
            Some(sudo) => {
                // install(1) creates parent directories and sets the mode in
                // one audited invocation.
                let src_str = utf8_path(src)?;
                let dest_str = utf8_path(&dest)?;
                let output = sudo.run("install", &["-D", "-m", "0755", "--", src_str, dest_str])?;
                if !output.success {
                    return Err(Error::Install(format!(
                        "install failed: {}",
                        output.stderr_str().trim()
                    )));
                }
            }
            None => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                }
                fs::copy(src, &dest).map_err(|e| Error::io(&dest, e))?;
                make_executable(&dest)?;
            }
        }
        log::info!("installed {}", dest.display());
        Ok(())
    }

    fn setup_session(
        &self,
        session: &str,
        root: Option<&str>,
        windows: &[WindowSpec],
        ctx: &RunContext,
    ) -> Result<()> {
        let root_path = root.map_or_else(|| ctx.workspace.clone(), expand);
        self.mux.create_session(session, Some(&root_path))?;
        for window in windows {
            self.mux.create_window(session, &window.name)?;
            for line in &window.keys {
                self.mux.send_line(session, &window.name, line)?;
            }
        }
        Ok(())
    }
}

impl StepExecutor for Installer<'_> {
    fn execute(&self, step: &Step, ctx: &RunContext) -> Result<InstallOutcome> {
        // Least privilege per step, not per process: unprivileged steps
        // never see the provider even when it is available.
        let sudo = if step.requires_root {
            Some(self.sudo.ok_or_else(|| {
                Error::Permission(format!(
                    "step {} requires root but elevation is unavailable",
                    step.name
                ))
            })?)
        } else {
            None
        };

        // One scratch directory per step; RAII drop removes it on every
        // exit path, verification failures included.
        let scratch = fetch::scratch_dir()?;

        let artifact = match &step.fetch {
            Some(spec) => {
                let dest = scratch.path().join(artifact_filename(&spec.url, &step.name));
                let download = match &spec.sha256 {
                    Some(digest) => self.fetcher.fetch_verified(&spec.url, &dest, digest)?,
                    None => self.fetcher.fetch(&spec.url, &dest)?,
                };
                Some(download.path)
            }
            None => None,
        };

        let require_artifact = || {
            artifact.as_deref().ok_or_else(|| {
                Error::Install(format!("step {} has no fetched artifact", step.name))
            })
        };

        match &step.action {
            InstallAction::Packages { packages } => self.install_packages(packages, sudo)?,
            InstallAction::Script { args } => self.run_script(require_artifact()?, args, sudo)?,
            InstallAction::Binary { dest } => self.install_file(require_artifact()?, dest, sudo)?,
            InstallAction::Tarball { member, dest } => {
                let extracted = extract_member(require_artifact()?, member, scratch.path())?;
                self.install_file(&extracted, dest, sudo)?;
            }
            InstallAction::Session {
                session,
                root,
                windows,
            } => self.setup_session(session, root.as_deref(), windows, ctx)?,
        }

        Ok(InstallOutcome {
            version: step.version.clone(),
        })
    }
}

/// Unpack one member of a `.tar.gz` archive into scratch space.
///
/// The member is matched by component-wise path suffix, so `rg` matches
/// `ripgrep-14.1.0-x86_64/rg`.
fn extract_member(archive: &Path, member: &str, scratch: &Path) -> Result<PathBuf> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let entries = tar
        .entries()
        .map_err(|e| Error::Install(format!("unreadable archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::Install(format!("corrupt archive: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| Error::Install(format!("corrupt archive: {e}")))?
            .into_owned();
        if path.ends_with(member) {
            let file_name = Path::new(member)
                .file_name()
                .ok_or_else(|| Error::Install(format!("bad member name '{member}'")))?;
            let out = scratch.join(file_name);
            entry
                .unpack(&out)
                .map_err(|e| Error::Install(format!("extraction failed: {e}")))?;
            return Ok(out);
        }
    }
    Err(Error::Install(format!(
        "member '{member}' not found in archive"
    )))
}

/// Scratch filename for a download, derived from the URL path.
fn artifact_filename(url: &str, step_name: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty())
        .map_or_else(|| step_name.to_string(), ToString::to_string)
}

fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::Install(format!("path is not valid UTF-8: {}", path.display())))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
