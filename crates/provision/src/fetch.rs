//! Artifact retrieval over a trusted transport.
//!
//! The fetcher enforces an https-only policy and, when the catalog pins a
//! digest, verifies the downloaded bytes before anything lands at the
//! destination path. A mismatch therefore never leaves a half-verified
//! artifact that a later step could mistake for valid.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Maximum download size (100 MB covers installer scripts and tool archives).
const MAX_BODY_SIZE: u64 = 100 * 1024 * 1024;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("provision/", env!("CARGO_PKG_VERSION"));

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A completed download.
#[derive(Debug, Clone)]
pub struct Download {
    /// Where the artifact was written.
    pub path: PathBuf,
    /// Size in bytes.
    pub bytes: u64,
}

/// HTTPS-only artifact fetcher.
pub struct Fetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Create a fetcher with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            max_bytes: MAX_BODY_SIZE,
        }
    }

    /// Create a fetcher with a custom download size limit.
    #[must_use]
    pub fn with_limit(max_bytes: u64) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            max_bytes,
        }
    }

    /// Retrieve `url` into `dest` without integrity verification.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<Download> {
        self.fetch_inner(url, dest, None)
    }

    /// Retrieve `url` into `dest`, failing unless the bytes hash to
    /// `sha256`. On mismatch nothing valid remains at `dest`.
    pub fn fetch_verified(&self, url: &str, dest: &Path, sha256: &str) -> Result<Download> {
        validate_sha256(sha256)?;
        self.fetch_inner(url, dest, Some(sha256))
    }

    fn fetch_inner(&self, url: &str, dest: &Path, expected: Option<&str>) -> Result<Download> {
        ensure_https(url)?;

        log::debug!("fetching {url}");
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| map_transport_error(url, &e))?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.max_bytes)
            .read_to_vec()
            .map_err(|e| Error::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        commit(&bytes, dest, expected, url)
    }
}

/// Verify (when pinned) and write the downloaded bytes.
///
/// Verification happens before the write, so a mismatch writes nothing;
/// a stale artifact from an earlier attempt is removed as well.
fn commit(bytes: &[u8], dest: &Path, expected: Option<&str>, url: &str) -> Result<Download> {
    if let Some(expected) = expected {
        let actual = sha256_hex(bytes);
        if actual != expected {
            let _ = fs::remove_file(dest);
            return Err(Error::Integrity {
                url: url.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    fs::write(dest, bytes).map_err(|e| Error::io(dest, e))?;
    log::debug!("wrote {} ({} bytes)", dest.display(), bytes.len());
    Ok(Download {
        path: dest.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}

/// Reject any transport that is not encrypted and authenticated.
fn ensure_https(url: &str) -> Result<()> {
    if url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::InsecureUrl(url.to_string()))
    }
}

/// Hex-encode the SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Validate that a string is a well-formed hex-encoded SHA-256 digest.
pub fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(Error::Catalog(format!(
            "digest must be {DIGEST_HEX_LEN} hex characters, got {}",
            value.len()
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !c.is_ascii_hexdigit() || c.is_ascii_uppercase())
    {
        return Err(Error::Catalog(format!(
            "digest must be lowercase hex, found '{bad}'"
        )));
    }
    Ok(())
}

/// Create a caller-exclusive scratch directory for one step's artifacts.
///
/// Created mode 0700 and removed on every exit path by RAII drop.
pub fn scratch_dir() -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix("provision-")
        .tempdir()
        .map_err(|e| Error::io(std::env::temp_dir(), e))
}

fn map_transport_error(url: &str, err: &ureq::Error) -> Error {
    let message = match err {
        ureq::Error::StatusCode(code) => format!("HTTP {code}"),
        other => other.to_string(),
    };
    Error::Fetch {
        url: url.to_string(),
        message,
    }
}
