use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "outfitter")]
#[command(version)]
#[command(about = "Declarative provisioning runner for development machines", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Converge the machine to the catalog
    Apply(ApplyArgs),

    /// Show what apply would install, without side effects
    Plan(CatalogArgs),

    /// Show live presence per step merged with the last ledger outcome
    Status(CatalogArgs),

    /// Inspect or reset the outcome ledger
    #[command(subcommand)]
    Ledger(LedgerCommand),

    /// Run environment health checks
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Catalog file (defaults to ~/.config/outfitter/catalog.toml)
    #[arg(long, env = "OUTFITTER_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Report what would run without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct CatalogArgs {
    /// Catalog file (defaults to ~/.config/outfitter/catalog.toml)
    #[arg(long, env = "OUTFITTER_CATALOG")]
    pub catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum LedgerCommand {
    /// Print every recorded step outcome
    Show,

    /// Delete the ledger file
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
