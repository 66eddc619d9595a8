//! Converge the machine to the catalog.

use anyhow::Result;
use dialoguer::Confirm;
use provision::{
    Fetcher, Installer, RunOptions, RunReport, Runner, Step, StepStatus, SudoProvider,
};

use crate::cli::ApplyArgs;
use crate::commands::{build_run_context, load_catalog_or_exit, make_mux};
use crate::progress::ConsoleProgress;
use crate::sudo::SudoContext;
use crate::{Context, interrupt, paths, ui};

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let steps = load_catalog_or_exit(args.catalog.as_deref());
    let run_ctx = build_run_context()?;
    let mux = make_mux();

    ui::header(&format!(
        "Provisioning {} ({} steps)",
        run_ctx.account,
        steps.len()
    ));

    // Compute the pending set up front: it drives the confirmation prompt
    // and decides whether sudo is needed at all.
    let pending: Vec<&Step> = steps
        .iter()
        .filter(|step| !step.presence.evaluate(mux.as_ref()).unwrap_or(false))
        .collect();

    if pending.is_empty() {
        ui::success("Everything already satisfied");
    } else {
        ui::section(&format!("{} steps to install", pending.len()));
        for step in &pending {
            ui::dim(&format!("{} - {}", step.name, step.description()));
        }
        println!();

        if !args.yes && !args.dry_run {
            let confirmed = Confirm::new()
                .with_prompt("Apply changes?")
                .default(true)
                .interact()?;
            if !confirmed {
                ui::warn("Aborted, nothing changed");
                return Ok(());
            }
        }
    }

    // Acquire sudo once, only when a pending step actually needs it.
    let needs_root = pending.iter().any(|step| step.requires_root);
    let sudo_ctx = if needs_root && !args.dry_run {
        Some(SudoContext::acquire(
            "some catalog steps install system-wide",
        )?)
    } else {
        None
    };
    let sudo_ref: Option<&dyn SudoProvider> =
        sudo_ctx.as_ref().map(|s| s as &dyn SudoProvider);

    let cancel = interrupt::install_handler();
    let installer = Installer::new(Fetcher::new(), sudo_ref, mux.as_ref());
    let runner = Runner::new(&run_ctx, &installer, mux.as_ref(), paths::ledger_path()?)
        .with_cancel_token(cancel);

    let mut progress = ConsoleProgress::new(ctx.quiet);
    let report = runner.run(
        &steps,
        &RunOptions {
            dry_run: args.dry_run,
        },
        &mut progress,
    );

    print_summary(&report);

    let code = report.exit_code();
    // process::exit skips destructors; release the sudo timestamp first.
    drop(runner);
    drop(installer);
    drop(sudo_ctx);
    if code != 0 {
        std::process::exit(i32::from(code));
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let satisfied = report
        .steps
        .iter()
        .filter(|s| s.status.is_satisfied())
        .count();

    ui::section("Summary");
    ui::kv("satisfied", &format!("{satisfied}/{}", report.steps.len()));

    if report.interrupted {
        ui::warn("Interrupted; ledger persisted. Re-run to resume.");
    }
    if report.aborted {
        ui::warn("Aborted on a fatal step failure. Re-run to resume from there.");
    }

    let unsatisfied = report.unsatisfied();
    if !unsatisfied.is_empty() {
        println!();
        for entry in unsatisfied {
            match &entry.status {
                StepStatus::Failed { kind, error, .. } => {
                    ui::error(&format!("{} [{kind}] {error}", entry.name));
                    ui::dim(kind.hint());
                }
                status => ui::dim(&format!("{} - {}", entry.name, status.label())),
            }
        }
    }
}
