//! Catalog loading: the TOML file describing all provisioning steps.
//!
//! A catalog is a sequence of `[[step]]` tables. Shape errors and
//! validation failures are reported before any step executes, so a bad
//! catalog never touches the system or the ledger.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::registry::StepRegistry;
use crate::step::Step;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "step")]
    steps: Vec<Step>,
}

/// Parse a catalog from TOML text.
pub fn parse(text: &str) -> Result<Vec<Step>> {
    let file: CatalogFile =
        toml::from_str(text).map_err(|e| Error::Catalog(e.to_string()))?;

    if file.steps.is_empty() {
        return Err(Error::Catalog("catalog declares no steps".to_string()));
    }

    let mut registry = StepRegistry::new();
    for step in file.steps {
        registry.register(step)?;
    }
    log::info!("catalog loaded: {} steps", registry.len());
    Ok(registry.into_steps())
}

/// Load and validate a catalog file.
pub fn load(path: &Path) -> Result<Vec<Step>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [[step]]
        name = "base-packages"
        phase = 1
        fatality = "abort"
        requires_root = true
        presence = { kind = "dpkg-installed", packages = ["git", "curl"] }
        action = { kind = "packages", packages = ["git", "curl"] }

        [[step]]
        name = "ripgrep"
        phase = 2
        presence = { kind = "command-exists", command = "rg" }
        fetch = { url = "https://example.com/ripgrep.tar.gz" }
        action = { kind = "tarball", member = "rg", dest = "~/.local/bin/rg" }

        [[step]]
        name = "workspace"
        phase = 3
        presence = { kind = "session-exists", session = "dev" }

        [step.action]
        kind = "session"
        session = "dev"
        windows = [{ name = "editor", keys = ["nvim"] }]
    "#;

    #[test]
    fn parses_a_full_catalog() {
        let steps = parse(SAMPLE).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].name, "base-packages");
        assert_eq!(steps[2].phase, 3);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let err = parse("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Catalog);
    }

    #[test]
    fn duplicate_names_fail_before_any_step_runs() {
        let text = r#"
            [[step]]
            name = "git"
            requires_root = true
            presence = { kind = "command-exists", command = "git" }
            action = { kind = "packages", packages = ["git"] }

            [[step]]
            name = "git"
            requires_root = true
            presence = { kind = "command-exists", command = "git" }
            action = { kind = "packages", packages = ["git"] }
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
    }

    #[test]
    fn unknown_action_kind_is_a_catalog_error() {
        let text = r#"
            [[step]]
            name = "mystery"
            presence = { kind = "command-exists", command = "x" }
            action = { kind = "teleport" }
        "#;
        let err = parse(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Catalog);
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let steps = load(file.path()).unwrap();
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn load_reports_missing_file_with_path() {
        let err = load(Path::new("/nonexistent/catalog.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/catalog.toml"));
    }
}
