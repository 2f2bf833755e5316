//! engine::orphan
//!
//! Decides whether a remote was the last source of a branch it deleted.

use std::collections::BTreeMap;

use crate::core::refspec::Remote;
use crate::core::types::RefName;

use super::snapshot::RefSnapshot;

/// Whether `refname` (a `refs/heads/` ref on the remote side) is orphaned
/// now that `current_remote` no longer advertises it.
///
/// True only when both hold:
///
/// - the local ref of the same name still equals the value `current_remote`'s
///   tracking ref last recorded, so there is no local work on top of it
/// - no other configured remote maps `refname` to a tracking ref that exists
///   in `local`
///
/// An unknown `current_remote` is never a sole source.
pub fn is_ref_orphaned(
    remotes: &BTreeMap<String, Remote>,
    local: &RefSnapshot,
    current_remote: &str,
    refname: &RefName,
) -> bool {
    let Some(current) = remotes.get(current_remote) else {
        return false;
    };
    let Some(tracking) = current.map_fetch(refname) else {
        return false;
    };

    match (local.get(refname), local.get(&tracking)) {
        (Some(local_oid), Some(tracked_oid)) if local_oid == tracked_oid => {}
        _ => return false,
    }

    !remotes
        .values()
        .filter(|remote| remote.name != current.name)
        .filter_map(|remote| remote.map_fetch(refname))
        .any(|other| local.contains(&other))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Oid;

    fn oid(n: u8) -> Oid {
        Oid::new(format!("{:040x}", n)).unwrap()
    }

    fn name(s: &str) -> RefName {
        RefName::new(s).unwrap()
    }

    fn remotes(names: &[&str]) -> BTreeMap<String, Remote> {
        names
            .iter()
            .map(|n| (n.to_string(), Remote::with_default_refspec(*n, format!("u/{n}"))))
            .collect()
    }

    fn local(pairs: &[(&str, u8)]) -> RefSnapshot {
        RefSnapshot::from_pairs(pairs.iter().map(|(n, o)| (name(n), oid(*o))))
    }

    #[test]
    fn sole_tracker_with_unchanged_branch_is_orphaned() {
        let snap = local(&[
            ("refs/heads/old-topic", 1),
            ("refs/remotes/origin/old-topic", 1),
        ]);
        assert!(is_ref_orphaned(
            &remotes(&["origin"]),
            &snap,
            "origin",
            &name("refs/heads/old-topic")
        ));
    }

    #[test]
    fn local_commits_prevent_orphaning() {
        let snap = local(&[
            ("refs/heads/old-topic", 2),
            ("refs/remotes/origin/old-topic", 1),
        ]);
        assert!(!is_ref_orphaned(
            &remotes(&["origin"]),
            &snap,
            "origin",
            &name("refs/heads/old-topic")
        ));
    }

    #[test]
    fn missing_local_branch_is_not_orphaned() {
        let snap = local(&[("refs/remotes/origin/old-topic", 1)]);
        assert!(!is_ref_orphaned(
            &remotes(&["origin"]),
            &snap,
            "origin",
            &name("refs/heads/old-topic")
        ));
    }

    #[test]
    fn other_remote_still_tracking_prevents_orphaning() {
        let snap = local(&[
            ("refs/heads/shared", 1),
            ("refs/remotes/origin/shared", 1),
            ("refs/remotes/mirror/shared", 1),
        ]);
        assert!(!is_ref_orphaned(
            &remotes(&["origin", "mirror"]),
            &snap,
            "origin",
            &name("refs/heads/shared")
        ));
    }

    #[test]
    fn other_remote_without_tracking_ref_does_not_count() {
        let snap = local(&[
            ("refs/heads/shared", 1),
            ("refs/remotes/origin/shared", 1),
            ("refs/remotes/mirror/main", 1),
        ]);
        assert!(is_ref_orphaned(
            &remotes(&["origin", "mirror"]),
            &snap,
            "origin",
            &name("refs/heads/shared")
        ));
    }

    #[test]
    fn unknown_remote_is_never_sole_source() {
        let snap = local(&[("refs/heads/x", 1), ("refs/remotes/origin/x", 1)]);
        assert!(!is_ref_orphaned(
            &remotes(&["origin"]),
            &snap,
            "https://example.com/r.git",
            &name("refs/heads/x")
        ));
    }
}
