//! # provision
//!
//! An idempotent provisioning engine: declare an ordered catalog of steps,
//! and converge a machine to it with at most one real install action per
//! step.
//!
//! ## Core Concepts
//!
//! - **Step**: one unit of provisioning work (install a tool, write a
//!   config, set up a session), with a presence predicate and an install
//!   action.
//! - **Registry/Catalog**: the ordered step list, validated before any
//!   step executes.
//! - **Fetcher**: https-only artifact retrieval with optional SHA-256
//!   verification.
//! - **Installer**: applies install actions through a single audited
//!   elevation boundary.
//! - **Ledger**: durable, atomically-written record of step outcomes.
//! - **Runner**: sequential orchestration with per-step fatality policies.
//!
//! ## Example
//!
//! ```no_run
//! use provision::{
//!     catalog, Fetcher, Installer, NoProgress, NullMux, RunContext,
//!     RunOptions, Runner,
//! };
//!
//! let steps = catalog::load(std::path::Path::new("catalog.toml"))?;
//! let ctx = RunContext {
//!     account: "dev".into(),
//!     home: "/home/dev".into(),
//!     workspace: "/home/dev/dev".into(),
//!     arch: std::env::consts::ARCH.into(),
//!     elevation_available: false,
//!     assume_network: true,
//! };
//! let mux = NullMux;
//! let installer = Installer::new(Fetcher::new(), None, &mux);
//! let runner = Runner::new(&ctx, &installer, &mux, "ledger.json".into());
//! let report = runner.run(&steps, &RunOptions::default(), &mut NoProgress);
//! std::process::exit(report.exit_code().into());
//! # Ok::<(), provision::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! The engine has no hard dependency on a concrete sudo implementation or
//! terminal multiplexer:
//!
//! - [`SudoProvider`]: the single elevation boundary
//! - [`Multiplexer`]: session probe/create/send contract
//! - [`ProgressCallback`]: run progress reporting
//! - [`StepExecutor`]: the install boundary (stubbed in tests)

pub mod catalog;
pub mod context;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod ledger;
pub mod process;
pub mod registry;
pub mod runner;
pub mod step;

// Re-export main types at crate root
pub use context::{
    CancelToken, CommandOutput, Multiplexer, NoProgress, NullMux, ProgressCallback, RunContext,
    SudoProvider,
};
pub use error::{Error, ErrorKind, Result};
pub use exec::{InstallOutcome, Installer, StepExecutor};
pub use fetch::{Download, Fetcher};
pub use ledger::{Ledger, Outcome, RunRecord};
pub use registry::StepRegistry;
pub use runner::{RunOptions, RunReport, Runner, StepReport, StepStatus};
pub use step::{FatalityPolicy, FetchSpec, InstallAction, Presence, Step, WindowSpec};
