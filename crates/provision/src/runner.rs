//! Sequential runner: orders steps, applies skip-if-present, executes,
//! updates the ledger, and aggregates failures into a final report.
//!
//! Steps run one at a time in catalog order on a single logical thread of
//! control; they share mutable ambient state (dotfiles, the package-manager
//! lock), so there is nothing to gain from parallelism in a one-shot tool.
//! Step N's install action completes before step N+1's presence check
//! begins. Cancellation is honored only at step boundaries.

use std::path::PathBuf;

use crate::context::{CancelToken, Multiplexer, ProgressCallback, RunContext};
use crate::error::{Error, ErrorKind};
use crate::exec::StepExecutor;
use crate::ledger::{Ledger, Outcome};
use crate::step::{FatalityPolicy, Step};

/// Terminal state of one step in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Presence probe was true; nothing ran.
    AlreadySatisfied,
    /// Install action ran and the presence probe confirmed the effect.
    Succeeded,
    /// Fetch, install, or the post-install probe failed.
    Failed {
        /// Classification for reporting.
        kind: ErrorKind,
        /// Human-readable failure description.
        error: String,
        /// Whether the step's fatality policy aborts the run.
        fatal: bool,
    },
    /// Would have installed, but this is a dry run.
    Skipped,
    /// Never reached: an earlier fatal failure or an interrupt stopped the
    /// run first.
    NotRun,
}

impl StepStatus {
    /// Is this a failure state?
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Did the step end satisfied (present on the system)?
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::AlreadySatisfied | Self::Succeeded)
    }

    /// Short label for reporting.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadySatisfied => "already satisfied",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped (dry run)",
            Self::NotRun => "not run",
        }
    }
}

/// Per-step entry in the final report.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Step name.
    pub name: String,
    /// Reporting phase.
    pub phase: u32,
    /// Terminal status.
    pub status: StepStatus,
}

/// Aggregate result of one runner invocation.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per catalog step, in catalog order.
    pub steps: Vec<StepReport>,
    /// A fatal step failure stopped the run early.
    pub aborted: bool,
    /// An operator interrupt stopped the run at a step boundary.
    pub interrupted: bool,
}

impl RunReport {
    /// Process exit code: 0 all satisfied, 1 partial success under
    /// continue-on-failure, 2 fatal abort or interrupt.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.aborted || self.interrupted {
            2
        } else if self.steps.iter().any(|s| s.status.is_failure()) {
            1
        } else {
            0
        }
    }

    /// Steps that did not end satisfied.
    #[must_use]
    pub fn unsatisfied(&self) -> Vec<&StepReport> {
        self.steps
            .iter()
            .filter(|s| !s.status.is_satisfied())
            .collect()
    }

    /// Failed steps only.
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status.is_failure())
    }
}

/// Execution options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Report what would run without side effects or ledger writes.
    pub dry_run: bool,
}

/// The orchestrator. Holds everything immutable for one invocation.
pub struct Runner<'a> {
    ctx: &'a RunContext,
    executor: &'a dyn StepExecutor,
    mux: &'a dyn Multiplexer,
    ledger_path: PathBuf,
    cancel: CancelToken,
}

impl<'a> Runner<'a> {
    /// Create a runner over the given collaborators.
    pub fn new(
        ctx: &'a RunContext,
        executor: &'a dyn StepExecutor,
        mux: &'a dyn Multiplexer,
        ledger_path: PathBuf,
    ) -> Self {
        Self {
            ctx,
            executor,
            mux,
            ledger_path,
            cancel: CancelToken::new(),
        }
    }

    /// Attach an externally controlled cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the catalog to completion, abort, or interrupt.
    ///
    /// The ledger is persisted after every recorded outcome, so a crash
    /// mid-run loses at most the in-flight step, and a re-run resumes
    /// cleanly: completed steps short-circuit on their presence probe.
    pub fn run(
        &self,
        steps: &[Step],
        opts: &RunOptions,
        progress: &mut dyn ProgressCallback,
    ) -> RunReport {
        let mut ledger = Ledger::load(&self.ledger_path, &self.ctx.account);
        let mut report = RunReport::default();
        let total = steps.len();

        for (index, step) in steps.iter().enumerate() {
            if report.aborted || report.interrupted {
                report.steps.push(StepReport {
                    name: step.name.clone(),
                    phase: step.phase,
                    status: StepStatus::NotRun,
                });
                continue;
            }
            if self.cancel.is_cancelled() {
                log::warn!("interrupted; stopping before step '{}'", step.name);
                report.interrupted = true;
                report.steps.push(StepReport {
                    name: step.name.clone(),
                    phase: step.phase,
                    status: StepStatus::NotRun,
                });
                continue;
            }

            progress.on_step_start(step, index, total);
            let status = self.run_step(step, &mut ledger, opts);

            if !opts.dry_run && status != StepStatus::Skipped {
                if let Err(e) = ledger.save(&self.ledger_path) {
                    log::error!("failed to persist ledger: {e}");
                }
            }

            if let StepStatus::Failed { fatal: true, .. } = status {
                report.aborted = true;
            }

            progress.on_step_complete(step, &status);
            report.steps.push(StepReport {
                name: step.name.clone(),
                phase: step.phase,
                status,
            });
        }

        report
    }

    /// Drive one step through its state machine:
    /// `PresenceCheck -> {AlreadySatisfied | Fetching -> Installing ->
    /// {Succeeded | Failed}}`.
    fn run_step(&self, step: &Step, ledger: &mut Ledger, opts: &RunOptions) -> StepStatus {
        // The skip decision is always the live predicate, never the ledger,
        // to tolerate external drift (manual uninstalls, partial runs).
        let present = match step.presence.evaluate(self.mux) {
            Ok(present) => present,
            Err(e) => {
                ledger.record(&step.name, Outcome::Failed, None);
                return failed(step, &e);
            }
        };

        if present {
            log::debug!("step '{}' already satisfied", step.name);
            if !opts.dry_run {
                ledger.record(&step.name, Outcome::AlreadyPresent, None);
            }
            return StepStatus::AlreadySatisfied;
        }

        if opts.dry_run {
            return StepStatus::Skipped;
        }

        log::info!("installing '{}': {}", step.name, step.description());
        match self.executor.execute(step, self.ctx) {
            Ok(outcome) => {
                // A succeeded record must not lie about installed state:
                // re-probe presence before trusting the executor.
                match step.presence.evaluate(self.mux) {
                    Ok(true) => {
                        ledger.record(&step.name, Outcome::Succeeded, outcome.version);
                        StepStatus::Succeeded
                    }
                    Ok(false) => {
                        let err = Error::Install(
                            "installer reported success but the presence probe still reports absent"
                                .to_string(),
                        );
                        ledger.record(&step.name, Outcome::Failed, None);
                        failed(step, &err)
                    }
                    Err(e) => {
                        ledger.record(&step.name, Outcome::Failed, None);
                        failed(step, &e)
                    }
                }
            }
            Err(e) => {
                ledger.record(&step.name, Outcome::Failed, None);
                failed(step, &e)
            }
        }
    }
}

fn failed(step: &Step, err: &Error) -> StepStatus {
    log::warn!("step '{}' failed: {err}", step.name);
    StepStatus::Failed {
        kind: err.kind(),
        error: err.to_string(),
        fatal: step.fatality == FatalityPolicy::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{NoProgress, NullMux};
    use crate::exec::InstallOutcome;
    use crate::step::{InstallAction, Presence};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::path::Path;

    /// Executor stub: records invocations and simulates installs by
    /// creating the file the step's presence predicate probes.
    #[derive(Default)]
    struct StubExecutor {
        calls: RefCell<Vec<String>>,
        fail: HashSet<String>,
        creates: HashMap<String, PathBuf>,
    }

    impl StepExecutor for StubExecutor {
        fn execute(&self, step: &Step, _ctx: &RunContext) -> crate::error::Result<InstallOutcome> {
            self.calls.borrow_mut().push(step.name.clone());
            if self.fail.contains(&step.name) {
                return Err(Error::Install("simulated failure".to_string()));
            }
            if let Some(path) = self.creates.get(&step.name) {
                fs::write(path, b"installed").unwrap();
            }
            Ok(InstallOutcome {
                version: step.version.clone(),
            })
        }
    }

    /// Multiplexer stub that counts presence probes.
    #[derive(Default)]
    struct ProbeMux {
        probes: RefCell<Vec<String>>,
    }

    impl Multiplexer for ProbeMux {
        fn has_session(&self, name: &str) -> crate::error::Result<bool> {
            self.probes.borrow_mut().push(name.to_string());
            Ok(false)
        }
        fn create_session(&self, _: &str, _: Option<&Path>) -> crate::error::Result<()> {
            Ok(())
        }
        fn create_window(&self, _: &str, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn send_line(&self, _: &str, _: &str, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn ctx() -> RunContext {
        RunContext {
            account: "dev".to_string(),
            home: PathBuf::from("/home/dev"),
            workspace: PathBuf::from("/home/dev/dev"),
            arch: "x86_64".to_string(),
            elevation_available: false,
            assume_network: true,
        }
    }

    fn file_step(name: &str, phase: u32, marker: &Path, fatality: FatalityPolicy) -> Step {
        Step {
            name: name.to_string(),
            phase,
            presence: Presence::PathExists {
                path: marker.display().to_string(),
            },
            fetch: None,
            action: InstallAction::Session {
                session: name.to_string(),
                root: None,
                windows: vec![],
            },
            fatality,
            requires_root: false,
            version: None,
        }
    }

    fn session_step(name: &str, phase: u32, fatality: FatalityPolicy) -> Step {
        Step {
            name: name.to_string(),
            phase,
            presence: Presence::SessionExists {
                session: name.to_string(),
            },
            fetch: None,
            action: InstallAction::Session {
                session: name.to_string(),
                root: None,
                windows: vec![],
            },
            fatality,
            requires_root: false,
            version: None,
        }
    }

    #[test]
    fn install_fires_once_then_presence_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("rg");
        let ledger_path = dir.path().join("ledger.json");

        let mut step = file_step("ripgrep", 1, &marker, FatalityPolicy::Continue);
        step.version = Some("14.1.0".to_string());
        let steps = vec![step];

        let mut executor = StubExecutor::default();
        executor
            .creates
            .insert("ripgrep".to_string(), marker.clone());

        let context = ctx();
        let runner = Runner::new(&context, &executor, &NullMux, ledger_path.clone());

        // First run: rg absent, installer invoked once, ledger says succeeded.
        let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.steps[0].status, StepStatus::Succeeded);
        assert_eq!(executor.calls.borrow().len(), 1);

        let ledger = Ledger::load(&ledger_path, "dev");
        let record = ledger.get("ripgrep").unwrap();
        assert_eq!(record.outcome, Outcome::Succeeded);
        assert_eq!(record.version.as_deref(), Some("14.1.0"));

        // Second run: presence short-circuits, no install, ledger updated.
        let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.steps[0].status, StepStatus::AlreadySatisfied);
        assert_eq!(executor.calls.borrow().len(), 1);

        let ledger = Ledger::load(&ledger_path, "dev");
        assert_eq!(
            ledger.get("ripgrep").unwrap().outcome,
            Outcome::AlreadyPresent
        );
    }

    #[test]
    fn repeated_runs_converge() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("tool");
        let ledger_path = dir.path().join("ledger.json");
        let steps = vec![file_step("tool", 1, &marker, FatalityPolicy::Continue)];

        let mut executor = StubExecutor::default();
        executor.creates.insert("tool".to_string(), marker.clone());

        let context = ctx();
        let runner = Runner::new(&context, &executor, &NullMux, ledger_path);

        for _ in 0..3 {
            let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);
            assert_eq!(report.exit_code(), 0);
        }
        // At most one real install action across repeated invocations.
        assert_eq!(executor.calls.borrow().len(), 1);
    }

    #[test]
    fn fatal_failure_stops_before_the_next_presence_check() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.json");
        let marker_a = dir.path().join("a");

        let steps = vec![
            file_step("a", 1, &marker_a, FatalityPolicy::Abort),
            session_step("b", 2, FatalityPolicy::Continue),
        ];

        let mut executor = StubExecutor::default();
        executor.fail.insert("a".to_string());

        let mux = ProbeMux::default();
        let context = ctx();
        let runner = Runner::new(&context, &executor, &mux, ledger_path.clone());
        let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);

        assert!(report.aborted);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.steps[1].status, StepStatus::NotRun);
        // B's presence predicate must never have been evaluated.
        assert!(mux.probes.borrow().is_empty());
        // Partial ledger persisted: A recorded, B absent.
        let ledger = Ledger::load(&ledger_path, "dev");
        assert_eq!(ledger.get("a").unwrap().outcome, Outcome::Failed);
        assert!(ledger.get("b").is_none());
    }

    #[test]
    fn continue_policy_records_and_proceeds() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.json");
        let marker_a = dir.path().join("a");
        let marker_b = dir.path().join("b");

        let steps = vec![
            file_step("a", 1, &marker_a, FatalityPolicy::Continue),
            file_step("b", 2, &marker_b, FatalityPolicy::Abort),
        ];

        let mut executor = StubExecutor::default();
        executor.fail.insert("a".to_string());
        executor.creates.insert("b".to_string(), marker_b.clone());

        let context = ctx();
        let runner = Runner::new(&context, &executor, &NullMux, ledger_path.clone());
        let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);

        assert_eq!(report.exit_code(), 1);
        assert!(!report.aborted);
        assert!(report.steps[0].status.is_failure());
        assert_eq!(report.steps[1].status, StepStatus::Succeeded);
        assert_eq!(report.unsatisfied().len(), 1);

        let ledger = Ledger::load(&ledger_path, "dev");
        assert_eq!(ledger.get("a").unwrap().outcome, Outcome::Failed);
        assert_eq!(ledger.get("b").unwrap().outcome, Outcome::Succeeded);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.json");
        let marker = dir.path().join("tool");
        let steps = vec![file_step("tool", 1, &marker, FatalityPolicy::Continue)];

        let executor = StubExecutor::default();
        let context = ctx();
        let runner = Runner::new(&context, &executor, &NullMux, ledger_path.clone());
        let report = runner.run(
            &steps,
            &RunOptions { dry_run: true },
            &mut NoProgress,
        );

        assert_eq!(report.steps[0].status, StepStatus::Skipped);
        assert!(executor.calls.borrow().is_empty());
        assert!(!ledger_path.exists());
    }

    #[test]
    fn succeeded_record_must_not_lie() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.json");
        let marker = dir.path().join("tool");
        let steps = vec![file_step("tool", 1, &marker, FatalityPolicy::Continue)];

        // Executor claims success but never creates the marker.
        let executor = StubExecutor::default();
        let context = ctx();
        let runner = Runner::new(&context, &executor, &NullMux, ledger_path.clone());
        let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);

        assert_eq!(report.exit_code(), 1);
        assert!(report.steps[0].status.is_failure());
        let ledger = Ledger::load(&ledger_path, "dev");
        assert_eq!(ledger.get("tool").unwrap().outcome, Outcome::Failed);
    }

    #[test]
    fn interrupt_is_honored_between_steps() {
        struct CancelAfterFirst {
            token: CancelToken,
        }
        impl ProgressCallback for CancelAfterFirst {
            fn on_step_start(&mut self, _: &Step, _: usize, _: usize) {}
            fn on_step_complete(&mut self, _: &Step, _: &StepStatus) {
                self.token.cancel();
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.json");
        let marker_a = dir.path().join("a");
        let marker_b = dir.path().join("b");

        let steps = vec![
            file_step("a", 1, &marker_a, FatalityPolicy::Continue),
            file_step("b", 1, &marker_b, FatalityPolicy::Continue),
        ];

        let mut executor = StubExecutor::default();
        executor.creates.insert("a".to_string(), marker_a.clone());
        executor.creates.insert("b".to_string(), marker_b.clone());

        let token = CancelToken::new();
        let context = ctx();
        let runner = Runner::new(&context, &executor, &NullMux, ledger_path.clone())
            .with_cancel_token(token.clone());
        let mut progress = CancelAfterFirst { token };
        let report = runner.run(&steps, &RunOptions::default(), &mut progress);

        // Step a completed, step b was never started.
        assert!(report.interrupted);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.steps[0].status, StepStatus::Succeeded);
        assert_eq!(report.steps[1].status, StepStatus::NotRun);
        assert_eq!(executor.calls.borrow().len(), 1);

        // Ledger was persisted before exiting.
        let ledger = Ledger::load(&ledger_path, "dev");
        assert_eq!(ledger.get("a").unwrap().outcome, Outcome::Succeeded);
        assert!(ledger.get("b").is_none());
    }

    #[test]
    fn presence_probe_error_fails_the_step() {
        struct BrokenMux;
        impl Multiplexer for BrokenMux {
            fn has_session(&self, _: &str) -> crate::error::Result<bool> {
                Err(Error::Mux("tmux exploded".to_string()))
            }
            fn create_session(&self, _: &str, _: Option<&Path>) -> crate::error::Result<()> {
                Ok(())
            }
            fn create_window(&self, _: &str, _: &str) -> crate::error::Result<()> {
                Ok(())
            }
            fn send_line(&self, _: &str, _: &str, _: &str) -> crate::error::Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("ledger.json");
        let steps = vec![session_step("ws", 1, FatalityPolicy::Continue)];

        let executor = StubExecutor::default();
        let context = ctx();
        let runner = Runner::new(&context, &executor, &BrokenMux, ledger_path);
        let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);

        assert_eq!(report.exit_code(), 1);
        assert!(executor.calls.borrow().is_empty());
    }
}
