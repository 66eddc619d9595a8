//! Inspect or reset the outcome ledger.

use anyhow::Result;
use dialoguer::Confirm;
use provision::{Ledger, Outcome};

use crate::commands::build_run_context;
use crate::{Context, paths, ui};

pub fn show(_ctx: &Context) -> Result<()> {
    let run_ctx = build_run_context()?;
    let path = paths::ledger_path()?;
    let ledger = Ledger::load(&path, &run_ctx.account);

    ui::header("Ledger");
    ui::kv("path", &path.display().to_string());
    ui::kv("account", &ledger.account);
    ui::kv("last run", &ledger.last_run.to_rfc3339());

    if ledger.steps.is_empty() {
        println!();
        ui::dim("no recorded outcomes yet");
        return Ok(());
    }

    ui::section("Steps");
    for (name, record) in &ledger.steps {
        let outcome = match record.outcome {
            Outcome::Succeeded => "succeeded",
            Outcome::AlreadyPresent => "already-present",
            Outcome::Failed => "failed",
        };
        let version = record
            .version
            .as_deref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        ui::kv(name, &format!("{outcome}{version} at {}", record.timestamp.to_rfc3339()));
    }
    Ok(())
}

pub fn clear(_ctx: &Context, yes: bool) -> Result<()> {
    let path = paths::ledger_path()?;
    if !path.exists() {
        ui::dim("no ledger to clear");
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {}?", path.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            ui::warn("Aborted");
            return Ok(());
        }
    }

    std::fs::remove_file(&path)?;
    ui::success("Ledger cleared; the next apply re-records every step");
    Ok(())
}
