//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Diagnostics and verbosity handling
//!
//! # Design
//!
//! All diagnostics go through this module so that `--quiet` and `--debug`
//! are honored consistently.

pub mod output;
