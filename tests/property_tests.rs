//! Property-based tests for the pull engine.
//!
//! These tests drive `engine::pull` over randomly generated histories in a
//! [`MockRepo`] and check the safety and idempotence guarantees.

use proptest::prelude::*;

use ggsync::core::refspec::{glob_match, Remote};
use ggsync::core::types::{BranchName, Oid, RefName};
use ggsync::engine::{self, PullOptions};
use ggsync::git::mock::MockRepo;
use ggsync::git::VcsExecutor;
use ggsync::ui::output::Verbosity;

const ORIGIN: &str = "https://example.com/origin.git";
const BRANCHES: [&str; 4] = ["alpha", "beta", "feature/x", "release-1.0"];

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..30).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            if name.starts_with('-')
                || name.starts_with('/')
                || name.ends_with('/')
                || name.contains("//")
            {
                None
            } else {
                Some(name)
            }
        },
    )
}

/// Per branch: position of the local tip and of the server tip, if any.
fn branch_states() -> impl Strategy<Value = Vec<(Option<usize>, Option<usize>)>> {
    prop::collection::vec(
        (prop::option::of(0..HISTORY_LEN), prop::option::of(0..HISTORY_LEN)),
        BRANCHES.len(),
    )
}

const HISTORY_LEN: usize = 9;

/// Six commits on a trunk plus three on a side line forked from the second.
fn history(repo: &MockRepo) -> Vec<Oid> {
    let mut commits = Vec::with_capacity(HISTORY_LEN);
    let root = repo.commit(&[]);
    commits.push(root);
    for _ in 1..6 {
        let parent = commits[commits.len() - 1].clone();
        commits.push(repo.commit(&[&parent]));
    }
    let mut side = commits[1].clone();
    for _ in 0..3 {
        side = repo.commit(&[&side]);
        commits.push(side.clone());
    }
    commits
}

fn setup(states: &[(Option<usize>, Option<usize>)]) -> (MockRepo, Vec<Oid>) {
    let repo = MockRepo::new();
    repo.add_remote(Remote::with_default_refspec("origin", ORIGIN));
    let commits = history(&repo);
    repo.set_server_ref(ORIGIN, "refs/heads/main", &commits[0]);

    for (branch, (local, server)) in BRANCHES.iter().zip(states) {
        if let Some(i) = local {
            repo.set_local_ref(&format!("refs/heads/{branch}"), &commits[*i]);
        }
        if let Some(i) = server {
            repo.set_server_ref(ORIGIN, &format!("refs/heads/{branch}"), &commits[*i]);
        }
    }
    (repo, commits)
}

fn pull(repo: &MockRepo) {
    engine::pull(repo, repo, &PullOptions::default(), Verbosity::Quiet)
        .expect("pull should succeed");
}

proptest! {
    /// A local branch only ever moves forward, and only to the server's tip.
    #[test]
    fn branches_only_fast_forward(states in branch_states()) {
        let (repo, commits) = setup(&states);

        pull(&repo);

        for (branch, (local, server)) in BRANCHES.iter().zip(&states) {
            let after = repo.local_ref(&format!("refs/heads/{branch}"));
            match (local, server) {
                (Some(l), Some(s)) => {
                    let (l, s) = (&commits[*l], &commits[*s]);
                    if repo.is_ancestor(l, s).unwrap() {
                        prop_assert_eq!(after.as_ref(), Some(s));
                    } else {
                        prop_assert_eq!(after.as_ref(), Some(l));
                    }
                }
                (None, Some(s)) => prop_assert_eq!(after.as_ref(), Some(&commits[*s])),
                (Some(l), None) => prop_assert_eq!(after.as_ref(), Some(&commits[*l])),
                (None, None) => prop_assert_eq!(after, None),
            }
        }
    }

    /// Pulling again without server changes mutates nothing.
    #[test]
    fn second_pull_is_a_no_op(
        states in branch_states(),
        removed in prop::collection::vec(any::<bool>(), BRANCHES.len()),
    ) {
        let (repo, _) = setup(&states);
        pull(&repo);

        for (branch, remove) in BRANCHES.iter().zip(&removed) {
            if *remove {
                repo.remove_server_ref(ORIGIN, &format!("refs/heads/{branch}"));
            }
        }
        pull(&repo);
        let settled = repo.mutation_count();

        pull(&repo);

        prop_assert_eq!(repo.mutation_count(), settled);
    }

    /// A branch deleted on the only remote survives in the graveyard.
    #[test]
    fn deleted_branches_are_never_lost(states in branch_states()) {
        let (repo, _) = setup(&states);
        pull(&repo);
        let before: Vec<Option<Oid>> = BRANCHES
            .iter()
            .map(|b| repo.local_ref(&format!("refs/heads/{b}")))
            .collect();

        for branch in BRANCHES {
            repo.remove_server_ref(ORIGIN, &format!("refs/heads/{branch}"));
        }
        pull(&repo);

        for (branch, tip) in BRANCHES.iter().zip(before) {
            let Some(tip) = tip else { continue };
            let kept = repo.local_ref(&format!("refs/heads/{branch}"));
            let buried = repo.local_ref(&format!("refs/gg-old/{branch}"));
            prop_assert!(kept.as_ref() == Some(&tip) || buried.as_ref() == Some(&tip));
        }
    }

    /// The default refspec maps every branch to a tracking ref and back.
    #[test]
    fn default_refspec_maps_both_ways(name in valid_branch_name()) {
        let remote = Remote::with_default_refspec("origin", ORIGIN);
        let Ok(branch) = BranchName::new(&name) else {
            return Ok(());
        };
        let refname = RefName::for_branch(&branch);

        let tracking = remote.map_fetch(&refname).unwrap();

        prop_assert_eq!(tracking.as_str(), format!("refs/remotes/origin/{name}"));
        prop_assert_eq!(
            remote.fetch[0].map_to_source(tracking.as_str()),
            Some(refname.as_str().to_string())
        );
    }

    /// `*` matches any string, and a literal pattern matches only itself.
    #[test]
    fn glob_literals_and_star(name in valid_branch_name()) {
        prop_assert!(glob_match("*", &name));
        prop_assert!(glob_match(&name, &name));
        let other = format!("{name}x");
        prop_assert!(!glob_match(&name, &other));
    }
}
