//! engine::pull
//!
//! The pull lifecycle: Resolve -> Snapshot -> Plan -> Fetch -> Reconcile.
//!
//! # Architecture
//!
//! ```text
//! resolve_source ─► RefSnapshot(local) ─┐
//!                   RefSnapshot(remote) ┴► build_fetch_plan ─► fetch ─► reconcile
//! ```
//!
//! Everything up to and including the fetch is all-or-nothing: an error
//! aborts before a single ref is touched. Reconciliation is best-effort and
//! its failures are reported together at the end, alongside any tag
//! conflicts the plan recorded.
//!
//! # Example
//!
//! ```
//! use ggsync::core::refspec::Remote;
//! use ggsync::engine::pull::{pull, PullOptions};
//! use ggsync::git::mock::MockRepo;
//! use ggsync::ui::output::Verbosity;
//!
//! let repo = MockRepo::new();
//! let c1 = repo.commit(&[]);
//! repo.add_remote(Remote::with_default_refspec("origin", "https://example.com/r.git"));
//! repo.set_server_ref("https://example.com/r.git", "refs/heads/feature", &c1);
//!
//! let report = pull(&repo, &repo, &PullOptions::default(), Verbosity::Quiet).unwrap();
//! assert_eq!(report.reconcile.unwrap().created.len(), 1);
//! assert_eq!(repo.local_ref("refs/heads/feature"), Some(c1));
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::core::types::Fingerprint;
use crate::git::{ConfigReader, GitError, VcsExecutor};
use crate::ui::output::{self, Verbosity};

use super::plan::{build_fetch_plan, FetchPlan, PlanError, PlanRequest, Source, TagConflict};
use super::reconcile::{reconcile, ReconcileError, ReconcileReport, RefFailure};
use super::snapshot::{RefSnapshot, SnapshotError};

/// Remote used when nothing else names one.
pub const DEFAULT_REMOTE: &str = "origin";

/// Errors from a pull.
#[derive(Debug, Error)]
pub enum PullError {
    /// Could not read remotes or branch configuration.
    #[error("failed to read git configuration: {0}")]
    Config(#[source] GitError),

    /// No source was given and the fallback remote is not configured.
    #[error("no remote named '{name}' is configured")]
    UnknownRemote {
        /// The remote name that was looked up.
        name: String,
    },

    /// Could not capture a snapshot.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The selection could not be resolved.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// `git fetch` failed; nothing was reconciled.
    #[error("fetch from {source_name} failed: {error}")]
    Fetch {
        /// Remote name or URL.
        source_name: String,
        /// Underlying error.
        #[source]
        error: GitError,
    },

    /// Reconciliation could not start.
    #[error(transparent)]
    PostFetch(#[from] ReconcileError),

    /// One or more tags differ from the source and were not overwritten.
    #[error(
        "{} tag(s) differ from the source; rerun with --force-tags to overwrite: {}",
        .conflicts.len(),
        join(.conflicts)
    )]
    TagConflicts {
        /// The conflicting tags.
        conflicts: Vec<TagConflict>,
        /// Everything else the pull did.
        report: Box<PullReport>,
    },

    /// One or more ref operations failed during reconciliation.
    #[error("{} ref operation(s) failed: {}", .failures.len(), join(.failures))]
    Reconcile {
        /// The failed operations.
        failures: Vec<RefFailure>,
        /// Everything else the pull did.
        report: Box<PullReport>,
    },
}

impl PullError {
    /// The partial report, for errors raised after reconciliation.
    pub fn report(&self) -> Option<&PullReport> {
        match self {
            PullError::TagConflicts { report, .. } | PullError::Reconcile { report, .. } => {
                Some(report)
            }
            _ => None,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Options for one pull.
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Remote name or URL; resolved from configuration when absent.
    pub source: Option<String>,
    /// Fallback remote when neither `source` nor the current branch names one.
    /// Defaults to [`DEFAULT_REMOTE`].
    pub default_remote: Option<String>,
    /// Ref selection.
    pub request: PlanRequest,
    /// Plan only; do not fetch or reconcile.
    pub dry_run: bool,
}

/// The outcome of a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Remote name or URL pulled from.
    pub source: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Fingerprint of local refs before the pull.
    pub local_fingerprint: Fingerprint,
    /// The plan that was (or would be) executed.
    pub plan: FetchPlan,
    /// Whether `git fetch` ran.
    pub fetched: bool,
    /// Reconciliation results; absent for dry runs.
    pub reconcile: Option<ReconcileReport>,
}

/// Decide where to pull from.
///
/// An explicit argument naming a configured remote selects that remote; any
/// other explicit argument is treated as a URL. Without an argument, the
/// checked-out branch's `branch.<name>.remote` is used, then
/// `default_remote`.
///
/// # Errors
///
/// Returns `UnknownRemote` when the implicit choice is not a configured
/// remote.
pub fn resolve_source<V, C>(
    executor: &V,
    config: &C,
    explicit: Option<&str>,
    default_remote: &str,
) -> Result<Source, PullError>
where
    V: VcsExecutor + ?Sized,
    C: ConfigReader + ?Sized,
{
    let mut remotes = config.list_remotes().map_err(PullError::Config)?;

    if let Some(arg) = explicit {
        return Ok(match remotes.remove(arg) {
            Some(remote) => Source::NamedRemote(remote),
            None => Source::RawUrl(arg.to_string()),
        });
    }

    let tracked = match executor.current_branch().map_err(PullError::Config)? {
        Some(branch) => config
            .value(&format!("branch.{}.remote", branch))
            .map_err(PullError::Config)?
            .filter(|remote| remote != "."),
        None => None,
    };

    let name = tracked.unwrap_or_else(|| default_remote.to_string());
    remotes
        .remove(&name)
        .map(Source::NamedRemote)
        .ok_or(PullError::UnknownRemote { name })
}

/// Run a pull.
///
/// # Errors
///
/// Hard errors (configuration, snapshot, plan, fetch) are returned before any
/// ref is mutated. After reconciliation, returns `TagConflicts` when the plan
/// held tag conflicts, or `Reconcile` when any ref operation failed; both
/// carry the full report.
pub fn pull<V, C>(
    executor: &V,
    config: &C,
    options: &PullOptions,
    verbosity: Verbosity,
) -> Result<PullReport, PullError>
where
    V: VcsExecutor + ?Sized,
    C: ConfigReader + ?Sized,
{
    // 1. Resolve
    let default_remote = options.default_remote.as_deref().unwrap_or(DEFAULT_REMOTE);
    let source = resolve_source(executor, config, options.source.as_deref(), default_remote)?;
    let remotes = config.list_remotes().map_err(PullError::Config)?;
    output::debug(format!("pulling from {}", source), verbosity);

    // 2. Snapshot
    let local = RefSnapshot::capture(
        executor
            .list_local_refs()
            .map_err(SnapshotError::from)?
            .into_iter()
            .map(Ok),
    )?;
    let remote_refs = RefSnapshot::capture(
        executor
            .list_remote_refs(source.fetch_target())
            .map_err(SnapshotError::from)?
            .into_iter()
            .map(Ok),
    )?;
    output::debug(
        format!(
            "local refs: {} ({}), remote refs: {} ({})",
            local.len(),
            local.fingerprint().short(),
            remote_refs.len(),
            remote_refs.fingerprint().short()
        ),
        verbosity,
    );

    // 3. Plan
    let plan = build_fetch_plan(&options.request, &source, &remotes, &local, &remote_refs)?;
    for conflict in &plan.conflicts {
        output::warn(conflict, verbosity);
    }

    let mut report = PullReport {
        source: source.fetch_target().to_string(),
        dry_run: options.dry_run,
        local_fingerprint: local.fingerprint(),
        plan,
        fetched: false,
        reconcile: None,
    };

    if options.dry_run {
        return finish(report);
    }

    // 4. Fetch
    if report.plan.needs_fetch() {
        let refspecs = report.plan.refspec_args();
        output::debug(
            format!("fetch {} {}", source.fetch_target(), refspecs.join(" ")),
            verbosity,
        );
        executor
            .fetch(source.fetch_target(), &refspecs)
            .map_err(|error| PullError::Fetch {
                source_name: source.fetch_target().to_string(),
                error,
            })?;
        report.fetched = true;
    } else {
        output::debug("nothing to fetch", verbosity);
    }

    // 5. Reconcile
    report.reconcile = Some(reconcile(executor, &report.plan, &source, verbosity)?);
    finish(report)
}

fn finish(report: PullReport) -> Result<PullReport, PullError> {
    if !report.plan.conflicts.is_empty() {
        return Err(PullError::TagConflicts {
            conflicts: report.plan.conflicts.clone(),
            report: Box::new(report),
        });
    }

    let failures = report
        .reconcile
        .as_ref()
        .map(|r| r.failures.clone())
        .unwrap_or_default();
    if !failures.is_empty() {
        return Err(PullError::Reconcile {
            failures,
            report: Box::new(report),
        });
    }

    Ok(report)
}
