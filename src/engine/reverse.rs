//! engine::reverse
//!
//! Reconstructs what a remote looked like at the last fetch.
//!
//! Remote-tracking refs are the local image of a remote's refs, produced by
//! the remote's fetch refspecs. Running those refspecs backwards over the
//! local snapshot yields the remote refs we last observed. The result is
//! only used to notice refs the remote has since deleted; it is never
//! authoritative for anything the remote still advertises.

use crate::core::refspec::Remote;
use crate::core::types::RefName;

use super::snapshot::RefSnapshot;

/// Map `remote`'s tracking refs in `local` back to remote ref names.
///
/// Non-wildcard refspecs contribute `src -> local[dst]` when `dst` exists.
/// Wildcard refspecs contribute every local ref matching `dst`, except the
/// symbolic `refs/remotes/<remote>/HEAD` alias. When several refspecs map
/// to the same source, the first one wins.
pub fn reverse_fetch_refs(remote: &Remote, local: &RefSnapshot) -> RefSnapshot {
    let head_alias = remote.head_alias();
    let mut pairs = Vec::new();

    for spec in &remote.fetch {
        if spec.dst.is_empty() {
            continue;
        }

        if !spec.is_wildcard() {
            let Ok(dst) = RefName::new(spec.dst.as_str()) else {
                continue;
            };
            let Ok(src) = RefName::new(spec.src.as_str()) else {
                continue;
            };
            if let Some(oid) = local.get(&dst) {
                pairs.push((src, oid.clone()));
            }
            continue;
        }

        for (name, oid) in local.iter() {
            if name.as_str() == head_alias {
                continue;
            }
            let Some(src) = spec.map_to_source(name.as_str()) else {
                continue;
            };
            if let Ok(src) = RefName::new(src) {
                pairs.push((src, oid.clone()));
            }
        }
    }

    // `from_pairs` keeps the last value per key; reverse so the first
    // refspec wins.
    RefSnapshot::from_pairs(pairs.into_iter().rev())
}
