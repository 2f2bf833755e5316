//! git::traits
//!
//! The two collaborator seams the pull engine is written against.
//!
//! - [`VcsExecutor`] runs fetches, lists refs, answers ancestry questions and
//!   performs every ref mutation. All mutations are conditioned on an
//!   expected old value (compare-and-set / compare-and-delete).
//! - [`ConfigReader`] exposes configured remotes and arbitrary config keys.
//!
//! [`crate::git::Git`] implements both against a real repository;
//! [`crate::git::mock::MockRepo`] implements both in memory.

use std::collections::BTreeMap;

use crate::core::refspec::Remote;
use crate::core::types::{BranchName, Oid, RefName};

use super::GitError;

/// A ref with its name and target OID, as produced by a listing.
///
/// `peeled` marks the `^{}` entries of `git ls-remote` output: the commit an
/// annotated tag points at, which supersedes the tag object hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The OID the ref points to
    pub oid: Oid,
    /// Whether this is a tag dereference entry
    pub peeled: bool,
}

impl RefEntry {
    /// A plain (non-dereferenced) entry.
    pub fn new(name: RefName, oid: Oid) -> Self {
        Self {
            name,
            oid,
            peeled: false,
        }
    }

    /// A tag dereference entry.
    pub fn peeled(name: RefName, oid: Oid) -> Self {
        Self {
            name,
            oid,
            peeled: true,
        }
    }
}

/// Upstream tracking configuration for a branch
/// (`branch.<name>.remote` / `branch.<name>.merge`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Remote name.
    pub remote: String,
    /// Ref on the remote the branch merges from.
    pub merge: RefName,
}

/// Repository operations needed to synchronize refs with a remote.
pub trait VcsExecutor {
    /// Run a fetch from `source` (remote name or URL) with the given refspecs.
    fn fetch(&self, source: &str, refspecs: &[String]) -> Result<(), GitError>;

    /// Enumerate local refs under `refs/`.
    fn list_local_refs(&self) -> Result<Vec<RefEntry>, GitError>;

    /// Enumerate the refs advertised by `source`.
    fn list_remote_refs(&self, source: &str) -> Result<Vec<RefEntry>, GitError>;

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own
    /// ancestor).
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError>;

    /// Create (or overwrite) a branch at `start`, optionally writing its
    /// upstream configuration.
    fn create_branch(
        &self,
        branch: &BranchName,
        start: &Oid,
        upstream: Option<&Upstream>,
    ) -> Result<(), GitError>;

    /// Point `refname` at `new_oid` if it currently equals `expected_old`.
    /// `None` means the ref must not exist yet.
    fn update_ref_cas(
        &self,
        refname: &RefName,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
    ) -> Result<(), GitError>;

    /// Delete `refname` if it currently equals `expected_old`.
    fn delete_ref_cas(&self, refname: &RefName, expected_old: &Oid) -> Result<(), GitError>;

    /// The checked-out branch, if HEAD points at one (born or unborn).
    fn current_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// Remove `branch.<name>.remote` and `branch.<name>.merge`.
    fn clear_upstream(&self, branch: &BranchName) -> Result<(), GitError>;
}

/// Read access to repository configuration.
pub trait ConfigReader {
    /// All configured remotes, keyed by name.
    fn list_remotes(&self) -> Result<BTreeMap<String, Remote>, GitError>;

    /// Look up a single config value (`branch.main.remote`).
    fn value(&self, key: &str) -> Result<Option<String>, GitError>;
}
