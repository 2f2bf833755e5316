//! cli::commands
//!
//! Command handlers. `gg` currently has one: [`pull()`].

mod pull;

pub use pull::{pull, PullArgs};

use crate::cli::args::Command;
use crate::engine::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Pull {
            source,
            refs,
            pattern,
            force_tags,
            dry_run,
            json,
        } => pull::pull(
            ctx,
            &PullArgs {
                source,
                refs,
                pattern,
                force_tags,
                dry_run,
                json,
            },
        ),
    }
}
