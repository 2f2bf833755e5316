//! ui::output
//!
//! Diagnostics for `gg`.
//!
//! # Streams
//!
//! Summary lines go to stdout and disappear under `--quiet`. The JSON
//! report also goes to stdout, so everything else (warnings, errors and
//! `--debug` traces) is written to stderr.

use std::fmt::Display;

use serde::Serialize;

/// How much `gg` says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors and the JSON report only
    Quiet,
    /// Summary lines and warnings
    #[default]
    Normal,
    /// Also `[debug]` traces of snapshots, refspecs and skipped refs
    Debug,
}

impl Verbosity {
    /// Verbosity for `--quiet` / `--debug`. Quiet wins.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }

    fn is_quiet(self) -> bool {
        self == Verbosity::Quiet
    }
}

/// A summary line on stdout.
pub fn print(message: impl Display, verbosity: Verbosity) {
    if !verbosity.is_quiet() {
        println!("{}", message);
    }
}

/// A `[debug]` trace on stderr.
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// A non-fatal problem on stderr.
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if !verbosity.is_quiet() {
        eprintln!("warning: {}", message);
    }
}

/// A fatal error on stderr, shown even under `--quiet`.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Pretty-printed JSON on stdout, shown even under `--quiet`.
///
/// # Errors
///
/// Returns the serialization error; nothing is printed in that case.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{}", rendered);
    Ok(())
}
