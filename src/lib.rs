//! ggsync - remote-ref synchronization for the `gg` git porcelain
//!
//! `gg pull` fetches branches and tags from a remote and reconciles local
//! state against them without silently destroying divergent or checked-out
//! work.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Snapshot → Plan → Fetch → Reconcile lifecycle
//! - [`core`] - Domain types, refspecs, configuration and locking
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Diagnostics and verbosity
//!
//! # Correctness Invariants
//!
//! 1. Nothing is mutated before the fetch succeeds
//! 2. Branches only move forward; diverged and checked-out branches stay put
//! 3. Deleted branches go to `refs/gg-old/` instead of disappearing
//! 4. Tags are never overwritten without `--force-tags`

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
