//! Live presence per step merged with the last recorded ledger outcome.
//!
//! The ledger can drift from reality (manual uninstalls, new machines);
//! this view makes the drift visible instead of hiding it.

use anyhow::Result;
use colored::Colorize;
use provision::{Ledger, Outcome};

use crate::cli::CatalogArgs;
use crate::commands::{build_run_context, load_catalog_or_exit, make_mux};
use crate::{Context, paths, ui};

pub fn run(_ctx: &Context, args: &CatalogArgs) -> Result<()> {
    let steps = load_catalog_or_exit(args.catalog.as_deref());
    let run_ctx = build_run_context()?;
    let ledger = Ledger::load(&paths::ledger_path()?, &run_ctx.account);
    let mux = make_mux();

    ui::header(&format!("Status for {}", run_ctx.account));

    let mut drifted = 0usize;
    for step in &steps {
        let present = step.presence.evaluate(mux.as_ref()).unwrap_or(false);
        let record = ledger.get(&step.name);

        let live = if present {
            "present".green()
        } else {
            "absent".yellow()
        };
        let recorded = match record.map(|r| r.outcome) {
            Some(Outcome::Succeeded) => "succeeded",
            Some(Outcome::AlreadyPresent) => "already-present",
            Some(Outcome::Failed) => "failed",
            None => "never run",
        };

        // A ledger claiming success for something no longer installed is
        // exactly the drift the live probe exists to catch.
        let drift = !present
            && matches!(
                record.map(|r| r.outcome),
                Some(Outcome::Succeeded | Outcome::AlreadyPresent)
            );
        if drift {
            drifted += 1;
        }

        println!(
            "  {:<20} {:<8} ledger: {}{}",
            step.name.bold(),
            live,
            recorded.dimmed(),
            if drift {
                format!(" {}", "(drift)".red())
            } else {
                String::new()
            }
        );
    }

    println!();
    if drifted > 0 {
        ui::warn(&format!(
            "{drifted} steps drifted from the ledger; 'outfitter apply' will reinstall them"
        ));
    } else {
        ui::success("Ledger matches the live system");
    }
    Ok(())
}
