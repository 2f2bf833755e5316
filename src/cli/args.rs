//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gg - git porcelain with safe, idempotent remote synchronization
#[derive(Parser, Debug)]
#[command(name = "gg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gg was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch branches and tags from a remote and reconcile local refs
    #[command(
        name = "pull",
        long_about = "Fetch branches and tags from a remote and reconcile local refs.\n\n\
            Every selected remote branch is created locally if missing, or \
            fast-forwarded if the local branch is an ancestor of the remote one. \
            Diverged branches and the checked-out branch are never moved. Branches \
            the remote deleted are moved to refs/gg-old/<name> when no other remote \
            still tracks them. Tags that differ from the remote are never \
            overwritten without --force-tags.",
        after_help = "\
EXAMPLES:
    # Pull everything from the current branch's remote (or origin)
    gg pull

    # Pull two branches from a named remote
    gg pull upstream -r main -r release

    # Pull every feature branch
    gg pull --pattern 'feature/*'

    # Preview without fetching
    gg pull --dry-run --json"
    )]
    Pull {
        /// Remote name or URL (default: current branch's remote, then configured default)
        source: Option<String>,

        /// Ref to pull (branch or tag, short or fully qualified); repeatable
        #[arg(short = 'r', long = "ref", value_name = "REF", conflicts_with = "pattern")]
        refs: Vec<String>,

        /// Pull only refs whose name matches this glob
        #[arg(long, value_name = "GLOB")]
        pattern: Option<String>,

        /// Overwrite local tags that differ from the remote
        #[arg(long)]
        force_tags: bool,

        /// Show the plan without fetching or changing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}
