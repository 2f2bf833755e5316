//! cli
//!
//! The `gg` command line.
//!
//! Parsing is done by clap ([`args`]); each subcommand has a handler in
//! [`commands`] that opens the repository, loads configuration and calls
//! into [`crate::engine`]. Handlers never write refs themselves.

pub mod args;
pub mod commands;

pub use args::Cli;

use crate::engine;
use anyhow::Result;

/// Parse `std::env::args` and run the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let ctx = engine::Context {
        cwd: cli.cwd,
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
