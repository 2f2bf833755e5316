//! engine
//!
//! The remote-ref synchronization engine behind `gg pull`.
//!
//! # Architecture
//!
//! Components, leaves first:
//!
//! 1. **Snapshot** ([`snapshot`]): immutable `RefName -> Oid` maps of the
//!    local repository and of the source, captured before any mutation
//! 2. **Reverse mapping** ([`reverse`]): the source's refs as last observed
//!    through its remote-tracking refs
//! 3. **Orphan detection** ([`orphan`]): whether the source was the last
//!    remote serving a branch it deleted
//! 4. **Planning** ([`plan`]): the selection resolved into refspecs, branch
//!    candidates, deletion candidates and tag conflicts
//! 5. **Reconciliation** ([`reconcile`]): the deferred operations applied
//!    after the fetch
//!
//! [`pull`] drives the whole lifecycle:
//!
//! ```text
//! Resolve -> Snapshot -> Plan -> Fetch -> Reconcile
//! ```
//!
//! # Invariants
//!
//! - The engine never mutates refs directly; all mutation goes through
//!   [`crate::git::VcsExecutor`] with compare-and-set semantics
//! - Nothing is mutated before the fetch succeeds
//! - The checked-out branch is never moved or deleted

pub mod orphan;
pub mod plan;
pub mod pull;
pub mod reconcile;
pub mod reverse;
pub mod snapshot;

pub use orphan::is_ref_orphaned;
pub use plan::{
    build_fetch_plan, BranchCandidate, CandidateKind, DeferredFetchOps, FetchPlan, PlanError,
    PlanRequest, Source, TagConflict, TagUpdate,
};
pub use pull::{pull, resolve_source, PullError, PullOptions, PullReport};
pub use reconcile::{reconcile, Divergence, ReconcileError, ReconcileReport, RefFailure};
pub use reverse::reverse_fetch_refs;
pub use snapshot::{RefSnapshot, SnapshotError};

use std::path::PathBuf;

use crate::ui::output::Verbosity;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags that affect command behavior.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    /// Output verbosity for these flags.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}
