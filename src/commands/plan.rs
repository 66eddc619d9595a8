//! Presence-check every step and show what apply would install.

use anyhow::Result;
use colored::Colorize;

use crate::cli::CatalogArgs;
use crate::commands::{load_catalog_or_exit, make_mux};
use crate::{Context, ui};

pub fn run(_ctx: &Context, args: &CatalogArgs) -> Result<()> {
    let steps = load_catalog_or_exit(args.catalog.as_deref());
    let mux = make_mux();

    ui::header("Plan");

    let mut pending = 0usize;
    let mut current_phase = None;
    for step in &steps {
        if current_phase != Some(step.phase) {
            current_phase = Some(step.phase);
            ui::section(&format!("Phase {}", step.phase));
        }

        match step.presence.evaluate(mux.as_ref()) {
            Ok(true) => println!("  {} {}", "✓".green(), step.name.dimmed()),
            Ok(false) => {
                pending += 1;
                println!(
                    "  {} {} {}",
                    "+".yellow().bold(),
                    step.name.bold(),
                    step.description().dimmed()
                );
            }
            Err(e) => {
                pending += 1;
                println!("  {} {} {}", "?".red(), step.name, e.to_string().dimmed());
            }
        }
    }

    println!();
    if pending == 0 {
        ui::success("Nothing to do");
    } else {
        ui::info(&format!("{pending} steps would install; run 'outfitter apply'"));
    }
    Ok(())
}
