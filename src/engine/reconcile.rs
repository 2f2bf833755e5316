//! engine::reconcile
//!
//! Applies a fetch plan's deferred operations after `git fetch` returns.
//!
//! # Architecture
//!
//! The reconciler re-reads local refs (the fetch has just moved tracking
//! refs and tags) and then works through two independent lists:
//!
//! 1. Branch candidates: create missing branches, fast-forward existing ones
//!    when the local tip is an ancestor of the fetched tip, report the rest
//!    as diverged (or ahead, when the fetched tip is already contained).
//! 2. Deletions: prune `refs/gg-old/*`, then compare-and-delete each entry
//!    of `deleted_refs`. Local branches are first copied into the graveyard
//!    and lose their upstream configuration.
//!
//! # Invariants
//!
//! - The checked-out branch is never created, moved or deleted; at most its
//!   upstream configuration is cleared
//! - Every mutation is conditioned on the value the engine last observed
//! - Every operation is attempted; failures are collected, not raised
//! - Graveyard pruning precedes graveyard writes

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{GitError, Upstream, VcsExecutor};
use crate::ui::output::{self, Verbosity};

use super::plan::{BranchCandidate, FetchPlan, Source};
use super::snapshot::{RefSnapshot, SnapshotError};

/// Errors that prevent reconciliation from starting.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Could not re-read local refs after the fetch.
    #[error("failed to read local refs after fetch: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Could not determine the checked-out branch.
    #[error("failed to read HEAD: {0}")]
    Head(#[source] GitError),
}

/// A single failed ref operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefFailure {
    /// The ref the operation targeted.
    pub refname: RefName,
    /// The operation that failed.
    pub operation: &'static str,
    /// Error message.
    pub message: String,
}

impl std::fmt::Display for RefFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.refname, self.message)
    }
}

/// A branch left alone because it does not fast-forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// The branch.
    pub branch: BranchName,
    /// Its local tip.
    pub local_oid: Oid,
    /// The fetched tip.
    pub remote_oid: Oid,
    /// The local tip already contains the fetched tip.
    pub ahead: bool,
}

/// What reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Branches created.
    pub created: Vec<BranchName>,
    /// Branches fast-forwarded.
    pub fast_forwarded: Vec<BranchName>,
    /// Branches already at the fetched value.
    pub up_to_date: Vec<BranchName>,
    /// Branches that do not fast-forward.
    pub diverged: Vec<Divergence>,
    /// The checked-out branch, when it was a candidate.
    pub skipped_current: Option<BranchName>,
    /// Old graveyard entries removed.
    pub pruned: Vec<RefName>,
    /// Refs deleted (tracking refs and branches).
    pub deleted: Vec<RefName>,
    /// Branches moved into the graveyard.
    pub graveyard: Vec<BranchName>,
    /// Branches whose upstream configuration was cleared.
    pub upstream_cleared: Vec<BranchName>,
    /// Operations that failed.
    pub failures: Vec<RefFailure>,
}

impl ReconcileReport {
    /// Whether every attempted operation succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply `plan`'s deferred operations.
///
/// # Errors
///
/// Only fails when local refs or HEAD cannot be read. Individual ref
/// failures are recorded in [`ReconcileReport::failures`].
pub fn reconcile<V>(
    executor: &V,
    plan: &FetchPlan,
    source: &Source,
    verbosity: Verbosity,
) -> Result<ReconcileReport, ReconcileError>
where
    V: VcsExecutor + ?Sized,
{
    let local = RefSnapshot::capture(
        executor
            .list_local_refs()
            .map_err(SnapshotError::from)?
            .into_iter()
            .map(Ok),
    )?;
    let current = executor.current_branch().map_err(ReconcileError::Head)?;

    let mut rec = Reconciler {
        executor,
        local: &local,
        current: current.as_ref(),
        source,
        verbosity,
        report: ReconcileReport::default(),
    };

    for candidate in &plan.deferred.branches {
        rec.reconcile_branch(candidate);
    }

    if !plan.deferred.deleted_refs.is_empty() {
        rec.prune_graveyard();
        for (refname, expected) in &plan.deferred.deleted_refs {
            rec.delete(refname, expected);
        }
    }

    Ok(rec.report)
}

struct Reconciler<'a, V: VcsExecutor + ?Sized> {
    executor: &'a V,
    local: &'a RefSnapshot,
    current: Option<&'a BranchName>,
    source: &'a Source,
    verbosity: Verbosity,
    report: ReconcileReport,
}

impl<V: VcsExecutor + ?Sized> Reconciler<'_, V> {
    fn fail(&mut self, refname: &RefName, operation: &'static str, err: impl std::fmt::Display) {
        let failure = RefFailure {
            refname: refname.clone(),
            operation,
            message: err.to_string(),
        };
        output::warn(&failure, self.verbosity);
        self.report.failures.push(failure);
    }

    fn is_current(&self, branch: &BranchName) -> bool {
        self.current == Some(branch)
    }

    // =========================================================================
    // Branch candidates
    // =========================================================================

    fn reconcile_branch(&mut self, candidate: &BranchCandidate) {
        let branch = &candidate.branch;
        let branch_ref = RefName::for_branch(branch);

        let Some(fetched) = self.local.get(&candidate.fetched_ref) else {
            self.fail(
                &candidate.fetched_ref,
                "read",
                "fetched ref is missing after fetch",
            );
            return;
        };

        match self.local.get(&branch_ref) {
            Some(local_oid) if local_oid == fetched => {
                self.report.up_to_date.push(branch.clone());
            }
            _ if self.is_current(branch) => {
                output::debug(
                    format!("skipping checked-out branch {}", branch),
                    self.verbosity,
                );
                self.report.skipped_current = Some(branch.clone());
            }
            None => self.create(candidate, fetched),
            Some(local_oid) => self.fast_forward(branch, &branch_ref, local_oid, fetched),
        }
    }

    fn create(&mut self, candidate: &BranchCandidate, start: &Oid) {
        let upstream = self.source.remote().map(|remote| Upstream {
            remote: remote.name.clone(),
            merge: candidate.remote_ref.clone(),
        });

        match self
            .executor
            .create_branch(&candidate.branch, start, upstream.as_ref())
        {
            Ok(()) => {
                output::debug(
                    format!("created {} at {}", candidate.branch, start.short(7)),
                    self.verbosity,
                );
                self.report.created.push(candidate.branch.clone());
            }
            Err(e) => self.fail(&RefName::for_branch(&candidate.branch), "create", e),
        }
    }

    fn fast_forward(
        &mut self,
        branch: &BranchName,
        branch_ref: &RefName,
        local: &Oid,
        fetched: &Oid,
    ) {
        match self.executor.is_ancestor(local, fetched) {
            Ok(true) => match self.executor.update_ref_cas(branch_ref, fetched, Some(local)) {
                Ok(()) => {
                    output::debug(
                        format!(
                            "fast-forwarded {} {}..{}",
                            branch,
                            local.short(7),
                            fetched.short(7)
                        ),
                        self.verbosity,
                    );
                    self.report.fast_forwarded.push(branch.clone());
                }
                Err(e) => self.fail(branch_ref, "fast-forward", e),
            },
            Ok(false) => {
                let ahead = matches!(self.executor.is_ancestor(fetched, local), Ok(true));
                let relation = if ahead { "is ahead of" } else { "has diverged from" };
                output::warn(
                    format!(
                        "{} {} {} ({} vs {}); leaving it alone",
                        branch,
                        relation,
                        self.source.fetch_target(),
                        local.short(7),
                        fetched.short(7)
                    ),
                    self.verbosity,
                );
                self.report.diverged.push(Divergence {
                    branch: branch.clone(),
                    local_oid: local.clone(),
                    remote_oid: fetched.clone(),
                    ahead,
                });
            }
            Err(e) => self.fail(branch_ref, "ancestry check", e),
        }
    }

    // =========================================================================
    // Deletions
    // =========================================================================

    fn prune_graveyard(&mut self) {
        let old: Vec<(RefName, Oid)> = self
            .local
            .iter()
            .filter(|(name, _)| name.is_graveyard_ref())
            .map(|(name, oid)| (name.clone(), oid.clone()))
            .collect();

        for (refname, oid) in old {
            match self.executor.delete_ref_cas(&refname, &oid) {
                Ok(()) => self.report.pruned.push(refname),
                Err(e) => self.fail(&refname, "prune", e),
            }
        }
    }

    fn delete(&mut self, refname: &RefName, expected: &Oid) {
        let Some(branch) = refname.branch() else {
            match self.executor.delete_ref_cas(refname, expected) {
                Ok(()) => self.report.deleted.push(refname.clone()),
                Err(e) => self.fail(refname, "delete", e),
            }
            return;
        };

        if self.is_current(&branch) {
            output::warn(
                format!(
                    "{} was deleted on {} but is checked out; keeping it and removing its upstream",
                    branch,
                    self.source.fetch_target()
                ),
                self.verbosity,
            );
            self.clear_upstream(refname, &branch);
            return;
        }

        let graveyard = RefName::for_graveyard(&branch);
        if let Err(e) = self.executor.update_ref_cas(&graveyard, expected, None) {
            self.fail(&graveyard, "move to graveyard", e);
            return;
        }

        if let Err(e) = self.executor.delete_ref_cas(refname, expected) {
            self.fail(refname, "delete", e);
            if let Err(e) = self.executor.delete_ref_cas(&graveyard, expected) {
                self.fail(&graveyard, "remove graveyard copy", e);
            }
            return;
        }

        output::debug(
            format!(
                "{} was deleted on {}; moved to {}",
                branch,
                self.source.fetch_target(),
                graveyard
            ),
            self.verbosity,
        );
        self.report.deleted.push(refname.clone());
        self.report.graveyard.push(branch.clone());
        self.clear_upstream(refname, &branch);
    }

    fn clear_upstream(&mut self, refname: &RefName, branch: &BranchName) {
        match self.executor.clear_upstream(branch) {
            Ok(()) => self.report.upstream_cleared.push(branch.clone()),
            Err(e) => self.fail(refname, "clear upstream", e),
        }
    }
}
