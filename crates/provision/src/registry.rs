//! Step registry: ordered catalog of provisioning steps.
//!
//! Declaration order is the only ordering signal the engine honors. Later
//! steps may assume earlier ones ran, but the engine does not verify this;
//! documenting real ordering dependencies is the catalog author's job.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::step::Step;

/// Collects steps in declaration order, enforcing catalog-wide invariants.
///
/// Registration closes when the registry is consumed with
/// [`into_steps`](Self::into_steps); there is no mutation after that.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
    names: HashSet<String>,
    highest_phase: u32,
}

impl StepRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step, preserving declaration order.
    ///
    /// Fails on duplicate names, phase regression, or a step that does not
    /// validate on its own.
    pub fn register(&mut self, step: Step) -> Result<()> {
        step.validate()?;

        if !self.names.insert(step.name.clone()) {
            return Err(Error::DuplicateName(step.name));
        }
        if step.phase < self.highest_phase {
            return Err(Error::PhaseOrder {
                step: step.name,
                phase: step.phase,
                previous: self.highest_phase,
            });
        }

        self.highest_phase = step.phase;
        log::debug!("registered step '{}' (phase {})", step.name, step.phase);
        self.steps.push(step);
        Ok(())
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Is the registry empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Close registration and return the ordered catalog.
    #[must_use]
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{FatalityPolicy, InstallAction, Presence};

    fn step(name: &str, phase: u32) -> Step {
        Step {
            name: name.to_string(),
            phase,
            presence: Presence::CommandExists {
                command: name.to_string(),
            },
            fetch: None,
            action: InstallAction::Packages {
                packages: vec![name.to_string()],
            },
            fatality: FatalityPolicy::Continue,
            requires_root: true,
            version: None,
        }
    }

    #[test]
    fn preserves_declaration_order() {
        let mut registry = StepRegistry::new();
        registry.register(step("zsh", 1)).unwrap();
        registry.register(step("git", 1)).unwrap();
        registry.register(step("tmux", 2)).unwrap();

        let names: Vec<String> = registry.into_steps().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["zsh", "git", "tmux"]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = StepRegistry::new();
        registry.register(step("git", 1)).unwrap();
        let err = registry.register(step("git", 1)).unwrap_err();
        match err {
            Error::DuplicateName(name) => assert_eq!(name, "git"),
            other => panic!("expected DuplicateName, got {other:?}"),
        }
    }

    #[test]
    fn rejects_phase_regression() {
        let mut registry = StepRegistry::new();
        registry.register(step("git", 3)).unwrap();
        let err = registry.register(step("zsh", 1)).unwrap_err();
        match err {
            Error::PhaseOrder {
                step, phase, previous,
            } => {
                assert_eq!(step, "zsh");
                assert_eq!(phase, 1);
                assert_eq!(previous, 3);
            }
            other => panic!("expected PhaseOrder, got {other:?}"),
        }
    }

    #[test]
    fn equal_phases_are_fine() {
        let mut registry = StepRegistry::new();
        registry.register(step("a", 2)).unwrap();
        registry.register(step("b", 2)).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn invalid_step_is_rejected_at_registration() {
        let mut registry = StepRegistry::new();
        let mut bad = step("git", 1);
        bad.requires_root = false; // package installs need root
        assert!(registry.register(bad).is_err());
        assert!(registry.is_empty());
    }
}
