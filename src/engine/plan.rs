//! engine::plan
//!
//! Fetch plan builder.
//!
//! # Architecture
//!
//! The builder turns the user's selection (explicit names, a pattern, or
//! everything) into a [`FetchPlan`]: the refspecs to hand to `git fetch`,
//! the branches to reconcile afterwards, the refs whose deletion should be
//! attempted, and any tag conflicts. It reads only the two snapshots and the
//! configured remotes; nothing is mutated.
//!
//! Each resolved ref lands in exactly one typed partition:
//!
//! ```text
//! remote branch            -> refspec + BranchCandidate (Create | FastForward)
//! branch only in prev      -> deleted_refs (tracking ref, plus branch if orphaned)
//! tag missing locally      -> refspec + TagUpdate
//! tag differing, forced    -> +refspec + TagUpdate
//! tag differing, unforced  -> TagConflict
//! tag equal                -> nothing
//! ```
//!
//! # Invariants
//!
//! - Hard errors are returned before any refspec is emitted
//! - A differing tag is never fetched without `force_tags`
//! - Only a named remote contributes deletion candidates

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::core::refspec::{glob_match, FetchRefspec, Remote};
use crate::core::types::{BranchName, Oid, RefName, TypeError, BRANCH_PREFIX, TAG_PREFIX};

use super::orphan::is_ref_orphaned;
use super::reverse::reverse_fetch_refs;
use super::snapshot::RefSnapshot;

/// Errors that abort a pull before anything is fetched.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A requested ref does not exist on the source.
    #[error("ref '{refname}' not found on {source_name}")]
    RefNotFound {
        /// The ref as requested or resolved.
        refname: String,
        /// Remote name or URL.
        source_name: String,
    },

    /// Explicit refs and a pattern were given together.
    #[error("cannot combine explicit refs with a pattern")]
    AmbiguousSelection,

    /// A requested name is not a valid ref.
    #[error("invalid ref name: {0}")]
    InvalidRefName(#[from] TypeError),
}

/// Where a pull fetches from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A configured remote; tracking refs and upstream config apply.
    NamedRemote(Remote),
    /// An arbitrary URL; fetched branches land under `refs/gg-fetch/`.
    RawUrl(String),
}

impl Source {
    /// The argument passed to `git fetch` / `git ls-remote`.
    pub fn fetch_target(&self) -> &str {
        match self {
            Source::NamedRemote(remote) => &remote.name,
            Source::RawUrl(url) => url,
        }
    }

    /// The remote, for a named source.
    pub fn remote(&self) -> Option<&Remote> {
        match self {
            Source::NamedRemote(remote) => Some(remote),
            Source::RawUrl(_) => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::NamedRemote(remote) => write!(f, "remote '{}'", remote.name),
            Source::RawUrl(url) => write!(f, "{}", url),
        }
    }
}

/// The user's ref selection.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    /// Explicit ref names (short or fully qualified).
    pub refs: Vec<String>,
    /// Glob over ref names.
    pub pattern: Option<String>,
    /// Overwrite local tags that differ from the remote.
    pub force_tags: bool,
}

/// How a branch candidate relates to the local repository at plan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// No local branch yet.
    Create,
    /// A local branch exists and may be fast-forwarded.
    FastForward,
}

/// A branch to reconcile after the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchCandidate {
    /// Local branch name.
    pub branch: BranchName,
    /// The branch ref on the source.
    pub remote_ref: RefName,
    /// Local ref the fetch stores the remote value in.
    pub fetched_ref: RefName,
    /// Value advertised by the source at plan time.
    pub remote_oid: Oid,
    /// Create or fast-forward.
    pub kind: CandidateKind,
}

/// Operations deferred until the fetch completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeferredFetchOps {
    /// Branches to create or fast-forward.
    pub branches: Vec<BranchCandidate>,
    /// Refs to compare-and-delete, with the value captured at plan time.
    pub deleted_refs: BTreeMap<RefName, Oid>,
}

/// A tag that will be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUpdate {
    /// The tag ref.
    pub tag: RefName,
    /// Local value, when the tag exists locally.
    pub local_oid: Option<Oid>,
    /// Value on the source.
    pub remote_oid: Oid,
}

/// A tag whose local and remote values differ without `force_tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagConflict {
    /// The tag ref.
    pub tag: RefName,
    /// Local value.
    pub local_oid: Oid,
    /// Value on the source.
    pub remote_oid: Oid,
}

impl std::fmt::Display for TagConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tag {} differs (local {}, remote {})",
            self.tag.short_name(),
            self.local_oid.short(7),
            self.remote_oid.short(7)
        )
    }
}

/// The resolved, classified plan for one pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    /// Fetch arguments, in resolution order.
    pub refspecs: Vec<FetchRefspec>,
    /// Work for the reconciler.
    pub deferred: DeferredFetchOps,
    /// Tags the fetch will create or overwrite.
    pub tag_updates: Vec<TagUpdate>,
    /// Tags left alone because they differ.
    pub conflicts: Vec<TagConflict>,
}

impl FetchPlan {
    /// Whether `git fetch` has anything to do.
    pub fn needs_fetch(&self) -> bool {
        !self.refspecs.is_empty()
    }

    /// The refspecs as command-line arguments.
    pub fn refspec_args(&self) -> Vec<String> {
        self.refspecs.iter().map(ToString::to_string).collect()
    }

    /// Whether the plan has nothing to fetch, reconcile or delete.
    pub fn is_empty(&self) -> bool {
        self.refspecs.is_empty()
            && self.deferred.branches.is_empty()
            && self.deferred.deleted_refs.is_empty()
            && self.conflicts.is_empty()
    }
}

/// Build the fetch plan for `request` against `source`.
///
/// `local` and `remote_refs` are the snapshots captured before any mutation;
/// `remotes` are all configured remotes (used for orphan detection).
///
/// # Errors
///
/// - [`PlanError::AmbiguousSelection`] for explicit refs plus a pattern
/// - [`PlanError::RefNotFound`] when a requested ref is on neither the
///   source nor in its last-observed state
/// - [`PlanError::InvalidRefName`] for a malformed explicit name
pub fn build_fetch_plan(
    request: &PlanRequest,
    source: &Source,
    remotes: &BTreeMap<String, Remote>,
    local: &RefSnapshot,
    remote_refs: &RefSnapshot,
) -> Result<FetchPlan, PlanError> {
    let prev = match source {
        Source::NamedRemote(remote) => reverse_fetch_refs(remote, local),
        Source::RawUrl(_) => RefSnapshot::default(),
    };

    let selected = select_refs(request, source, &prev, remote_refs)?;

    let mut plan = FetchPlan::default();
    for refname in selected {
        if let Some(branch) = refname.branch() {
            classify_branch(
                &mut plan,
                source,
                remotes,
                local,
                remote_refs,
                &prev,
                refname,
                branch,
            )?;
        } else {
            classify_tag(&mut plan, request, source, local, remote_refs, refname)?;
        }
    }

    Ok(plan)
}

// =============================================================================
// Selection
// =============================================================================

fn not_found(refname: impl Into<String>, source: &Source) -> PlanError {
    PlanError::RefNotFound {
        refname: refname.into(),
        source_name: source.fetch_target().to_string(),
    }
}

fn is_branch_or_tag(refname: &RefName) -> bool {
    refname.is_branch_ref() || refname.is_tag_ref()
}

/// Resolve the selection into an ordered, duplicate-free list of
/// `refs/heads/*` and `refs/tags/*` names.
fn select_refs(
    request: &PlanRequest,
    source: &Source,
    prev: &RefSnapshot,
    remote_refs: &RefSnapshot,
) -> Result<Vec<RefName>, PlanError> {
    let prev_only = prev
        .iter()
        .map(|(name, _)| name)
        .filter(|name| name.is_branch_ref() && !remote_refs.contains(name));

    let candidates: Vec<RefName> = match (&request.refs[..], &request.pattern) {
        ([_, ..], Some(_)) => return Err(PlanError::AmbiguousSelection),
        ([], None) => remote_refs
            .iter()
            .map(|(name, _)| name)
            .filter(|name| is_branch_or_tag(name))
            .chain(prev_only)
            .cloned()
            .collect(),
        ([], Some(pattern)) => remote_refs
            .iter()
            .map(|(name, _)| name)
            .filter(|name| is_branch_or_tag(name) && glob_match(pattern, name.short_name()))
            .chain(prev_only.filter(|name| glob_match(pattern, name.as_str())))
            .cloned()
            .collect(),
        (names, None) => names
            .iter()
            .map(|name| resolve_explicit(name, source, prev, remote_refs))
            .collect::<Result<_, _>>()?,
    };

    let mut seen = BTreeSet::new();
    Ok(candidates
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect())
}

/// First match wins: fully-qualified branch/tag, then a branch on the source
/// (or last observed there), then a tag on the source.
fn resolve_explicit(
    name: &str,
    source: &Source,
    prev: &RefSnapshot,
    remote_refs: &RefSnapshot,
) -> Result<RefName, PlanError> {
    if name.starts_with(BRANCH_PREFIX) || name.starts_with(TAG_PREFIX) {
        return Ok(RefName::new(name)?);
    }

    if let Ok(branch) = BranchName::new(name) {
        let refname = RefName::for_branch(&branch);
        if remote_refs.contains(&refname) || prev.contains(&refname) {
            return Ok(refname);
        }
    }

    if let Ok(tag) = RefName::for_tag(name) {
        if remote_refs.contains(&tag) {
            return Ok(tag);
        }
    }

    Err(not_found(name, source))
}

// =============================================================================
// Classification
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn classify_branch(
    plan: &mut FetchPlan,
    source: &Source,
    remotes: &BTreeMap<String, Remote>,
    local: &RefSnapshot,
    remote_refs: &RefSnapshot,
    prev: &RefSnapshot,
    refname: RefName,
    branch: BranchName,
) -> Result<(), PlanError> {
    if let Some(remote_oid) = remote_refs.get(&refname) {
        let tracking = source.remote().and_then(|remote| remote.map_fetch(&refname));
        let (spec, fetched_ref) = match tracking {
            Some(tracking) => (FetchRefspec::new(refname.as_str(), "", false), tracking),
            None => {
                let landing = RefName::for_url_fetch(&branch);
                (
                    FetchRefspec::new(refname.as_str(), landing.as_str(), true),
                    landing,
                )
            }
        };

        let kind = if local.contains(&RefName::for_branch(&branch)) {
            CandidateKind::FastForward
        } else {
            CandidateKind::Create
        };

        plan.refspecs.push(spec);
        plan.deferred.branches.push(BranchCandidate {
            branch,
            remote_ref: refname,
            fetched_ref,
            remote_oid: remote_oid.clone(),
            kind,
        });
        return Ok(());
    }

    let Some(remote) = source.remote().filter(|_| prev.contains(&refname)) else {
        return Err(not_found(refname.as_str(), source));
    };

    if let Some(tracking) = remote.map_fetch(&refname) {
        if let Some(oid) = local.get(&tracking) {
            plan.deferred.deleted_refs.insert(tracking, oid.clone());
        }
    }
    if is_ref_orphaned(remotes, local, &remote.name, &refname) {
        if let Some(oid) = local.get(&refname) {
            plan.deferred.deleted_refs.insert(refname, oid.clone());
        }
    }
    Ok(())
}

fn classify_tag(
    plan: &mut FetchPlan,
    request: &PlanRequest,
    source: &Source,
    local: &RefSnapshot,
    remote_refs: &RefSnapshot,
    tag: RefName,
) -> Result<(), PlanError> {
    let remote_oid = remote_refs
        .get(&tag)
        .ok_or_else(|| not_found(tag.as_str(), source))?;

    let force = match local.get(&tag) {
        None => false,
        Some(local_oid) if local_oid == remote_oid => return Ok(()),
        Some(_) if request.force_tags => true,
        Some(local_oid) => {
            plan.conflicts.push(TagConflict {
                tag,
                local_oid: local_oid.clone(),
                remote_oid: remote_oid.clone(),
            });
            return Ok(());
        }
    };

    plan.refspecs
        .push(FetchRefspec::new(tag.as_str(), tag.as_str(), force));
    plan.tag_updates.push(TagUpdate {
        local_oid: local.get(&tag).cloned(),
        remote_oid: remote_oid.clone(),
        tag,
    });
    Ok(())
}
