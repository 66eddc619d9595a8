//! Durable record of step outcomes across runs.
//!
//! The ledger is an audit trail and re-run optimization, not a source of
//! truth: the live presence predicate always wins. It therefore loads as
//! empty on a missing or corrupt file instead of failing the run, and every
//! write is atomic (temp file + rename) so a crash mid-write never leaves a
//! half-written document behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current ledger schema version.
const SCHEMA_VERSION: u32 = 1;

/// Terminal outcome of one step in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Install action ran and the presence probe confirmed the effect.
    Succeeded,
    /// Presence probe was already true; nothing ran.
    AlreadyPresent,
    /// Fetch or install failed.
    Failed,
}

/// Evidence that a step completed (or failed) in the latest run that
/// reached it. Prior records for the same step are superseded, not
/// appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Outcome of the step.
    pub outcome: Outcome,
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
    /// Installed version, when the catalog declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The on-disk ledger document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Timestamp of the last run that touched the ledger.
    pub last_run: DateTime<Utc>,
    /// Account the provisioning run targeted.
    pub account: String,
    /// Step name to latest record.
    #[serde(default)]
    pub steps: BTreeMap<String, RunRecord>,
}

impl Ledger {
    /// Create an empty ledger for an account.
    #[must_use]
    pub fn new(account: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_run: Utc::now(),
            account: account.to_string(),
            steps: BTreeMap::new(),
        }
    }

    /// Load the ledger from disk.
    ///
    /// A missing or unparseable file yields an empty ledger; corruption is
    /// logged, never fatal.
    #[must_use]
    pub fn load(path: &Path, account: &str) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no ledger at {}, starting empty", path.display());
                return Self::new(account);
            }
            Err(e) => {
                log::warn!("unreadable ledger at {}: {e}", path.display());
                return Self::new(account);
            }
        };

        match serde_json::from_str::<Self>(&text) {
            Ok(mut ledger) => {
                ledger.account = account.to_string();
                ledger
            }
            Err(e) => {
                log::warn!(
                    "corrupt ledger at {} ({e}), starting empty",
                    path.display()
                );
                Self::new(account)
            }
        }
    }

    /// Record an outcome, superseding any prior record for the step.
    pub fn record(&mut self, step_name: &str, outcome: Outcome, version: Option<String>) {
        self.last_run = Utc::now();
        self.steps.insert(
            step_name.to_string(),
            RunRecord {
                outcome,
                timestamp: self.last_run,
                version,
            },
        );
    }

    /// Latest record for a step, if any run ever reached it.
    #[must_use]
    pub fn get(&self, step_name: &str) -> Option<&RunRecord> {
        self.steps.get(step_name)
    }

    /// Persist atomically: the document is written to a temp file in the
    /// ledger's directory and renamed into place, so readers observe either
    /// the old document or the new one, never a partial write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            Error::io(
                path,
                std::io::Error::other("ledger path has no parent directory"),
            )
        })?;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::io(path, std::io::Error::other(e)))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| Error::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| Error::io(path, e.error))?;

        log::debug!("ledger saved to {}", path.display());
        Ok(())
    }
}
