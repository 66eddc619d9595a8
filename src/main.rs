mod cli;
mod commands;
mod interrupt;
mod paths;
mod progress;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, LedgerCommand};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Apply(args) => commands::apply::run(&ctx, &args),
        Commands::Plan(args) => commands::plan::run(&ctx, &args),
        Commands::Status(args) => commands::status::run(&ctx, &args),
        Commands::Ledger(cmd) => match cmd {
            LedgerCommand::Show => commands::ledger::show(&ctx),
            LedgerCommand::Clear { yes } => commands::ledger::clear(&ctx, yes),
        },
        Commands::Doctor => commands::doctor::run(&ctx),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "outfitter", &mut io::stdout());
            Ok(())
        }
    }
}
