//! engine::snapshot
//!
//! Point-in-time `RefName -> Oid` maps.
//!
//! # Architecture
//!
//! A pull captures two snapshots before any mutation: one of the local
//! repository and one of the source's advertised refs. Both are read-only
//! for the rest of the run. Annotated tags appear twice in a listing (the
//! tag object and its `^{}` dereference); the snapshot records the
//! dereferenced commit so local and remote tags compare by what they point
//! at.
//!
//! # Invariants
//!
//! - A `(ref, peeled)` pair appears at most once in the input stream
//! - Capture either returns the complete map or an error, never a partial map

use std::collections::btree_map::{self, BTreeMap};

use thiserror::Error;

use crate::core::types::{Fingerprint, Oid, RefName};
use crate::git::{GitError, RefEntry};

/// Errors from capturing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The listing produced the same ref (or tag dereference) twice.
    #[error("duplicate hash for {refname} (dereferenced: {peeled})")]
    DuplicateHash {
        /// The repeated ref.
        refname: RefName,
        /// Whether the repeated entry was a tag dereference.
        peeled: bool,
    },

    /// The underlying listing failed.
    #[error("failed to list refs: {0}")]
    Listing(#[from] GitError),
}

/// An immutable map from ref name to hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefSnapshot {
    refs: BTreeMap<RefName, Oid>,
}

impl RefSnapshot {
    /// Capture a snapshot from a listing.
    ///
    /// # Errors
    ///
    /// Returns the first listing error, or `DuplicateHash` when an entry
    /// repeats.
    pub fn capture<I>(entries: I) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = Result<RefEntry, GitError>>,
    {
        let mut direct: BTreeMap<RefName, Oid> = BTreeMap::new();
        let mut peeled: BTreeMap<RefName, Oid> = BTreeMap::new();

        for entry in entries {
            let entry = entry?;
            let target = if entry.peeled {
                &mut peeled
            } else {
                &mut direct
            };
            match target.entry(entry.name) {
                btree_map::Entry::Occupied(slot) => {
                    return Err(SnapshotError::DuplicateHash {
                        refname: slot.key().clone(),
                        peeled: entry.peeled,
                    });
                }
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(entry.oid);
                }
            }
        }

        direct.extend(peeled);
        Ok(Self { refs: direct })
    }

    /// Build a snapshot from already-resolved pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (RefName, Oid)>) -> Self {
        Self {
            refs: pairs.into_iter().collect(),
        }
    }

    /// The hash of `refname`, if present.
    pub fn get(&self, refname: &RefName) -> Option<&Oid> {
        self.refs.get(refname)
    }

    /// Whether `refname` is present.
    pub fn contains(&self, refname: &RefName) -> bool {
        self.refs.contains_key(refname)
    }

    /// All entries in ref-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&RefName, &Oid)> {
        self.refs.iter()
    }

    /// Number of refs.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Content fingerprint of the whole snapshot.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(self.refs.iter())
    }
}
