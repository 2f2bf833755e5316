//! Integration tests for `engine::pull` against real git repositories.
//!
//! Each test builds an "upstream" repository and a clone of it in temp
//! directories, changes the upstream with plain git commands, and pulls into
//! the clone through [`Git`].

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use ggsync::engine::{self, PlanRequest, PullError, PullOptions, PullReport};
use ggsync::git::Git;
use ggsync::ui::output::Verbosity;

/// Run git in `dir`, panicking on failure, and return trimmed stdout.
fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Like [`run_git`], but a failing command yields `None`.
fn try_git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn configure_identity(dir: &Path) {
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
}

/// An upstream repository plus a clone of it.
struct Fixture {
    _dir: TempDir,
    upstream: std::path::PathBuf,
    clone: std::path::PathBuf,
}

impl Fixture {
    /// Upstream with one commit on `main`, then `extra` run on the upstream
    /// before cloning.
    fn new(extra: impl FnOnce(&Fixture)) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let upstream = dir.path().join("upstream");
        let clone = dir.path().join("clone");
        std::fs::create_dir(&upstream).unwrap();

        run_git(&upstream, &["init", "-b", "main"]);
        configure_identity(&upstream);

        let fixture = Self {
            _dir: dir,
            upstream,
            clone,
        };
        fixture.commit_upstream("README.md", "# Upstream\n");
        extra(&fixture);

        run_git(
            fixture._dir.path(),
            &[
                "clone",
                "--quiet",
                fixture.upstream.to_str().unwrap(),
                fixture.clone.to_str().unwrap(),
            ],
        );
        configure_identity(&fixture.clone);
        fixture
    }

    /// Commit a file on the upstream's current branch.
    fn commit_upstream(&self, file: &str, content: &str) -> String {
        commit(&self.upstream, file, content)
    }

    /// Commit a file on `branch` of the upstream, returning to `main`.
    fn commit_upstream_on(&self, branch: &str, file: &str, content: &str) -> String {
        if try_git(&self.upstream, &["rev-parse", "--verify", "-q", branch]).is_some() {
            run_git(&self.upstream, &["checkout", "-q", branch]);
        } else {
            run_git(&self.upstream, &["checkout", "-q", "-b", branch]);
        }
        let oid = self.commit_upstream(file, content);
        run_git(&self.upstream, &["checkout", "-q", "main"]);
        oid
    }

    fn upstream_git(&self, args: &[&str]) -> String {
        run_git(&self.upstream, args)
    }

    fn clone_git(&self, args: &[&str]) -> String {
        run_git(&self.clone, args)
    }

    /// Value of a ref in the clone.
    fn local_ref(&self, name: &str) -> Option<String> {
        try_git(&self.clone, &["rev-parse", "--verify", "-q", name])
    }

    /// A git config value in the clone.
    fn local_config(&self, key: &str) -> Option<String> {
        try_git(&self.clone, &["config", "--get", key])
    }

    /// Every ref in the clone with its value.
    fn ref_listing(&self) -> String {
        self.clone_git(&["for-each-ref", "--format=%(refname) %(objectname)"])
    }

    fn pull(&self) -> Result<PullReport, PullError> {
        self.pull_with(PullOptions::default())
    }

    fn pull_with(&self, options: PullOptions) -> Result<PullReport, PullError> {
        let git = Git::open(&self.clone).expect("failed to open clone");
        engine::pull(&git, &git, &options, Verbosity::Quiet)
    }
}

fn commit(dir: &Path, file: &str, content: &str) -> String {
    std::fs::write(dir.join(file), content).unwrap();
    run_git(dir, &["add", file]);
    run_git(dir, &["commit", "-q", "-m", &format!("update {}", file)]);
    run_git(dir, &["rev-parse", "HEAD"])
}

// =============================================================================
// Branches
// =============================================================================

#[test]
fn new_remote_branch_is_created_with_tracking() {
    let fx = Fixture::new(|_| {});
    let tip = fx.commit_upstream_on("feature", "feature.txt", "one\n");

    let report = fx.pull().expect("pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/feature"), Some(tip.clone()));
    assert_eq!(fx.local_ref("refs/remotes/origin/feature"), Some(tip));
    assert_eq!(
        fx.local_config("branch.feature.remote").as_deref(),
        Some("origin")
    );
    assert_eq!(
        fx.local_config("branch.feature.merge").as_deref(),
        Some("refs/heads/feature")
    );

    let rec = report.reconcile.unwrap();
    assert!(rec.created.iter().any(|b| b.as_str() == "feature"));
}

#[test]
fn advanced_branch_is_fast_forwarded() {
    let fx = Fixture::new(|fx| {
        fx.commit_upstream_on("dev", "dev.txt", "one\n");
    });
    fx.pull().expect("first pull should succeed");
    let tip = fx.commit_upstream_on("dev", "dev.txt", "two\n");

    let report = fx.pull().expect("second pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/dev"), Some(tip));
    let rec = report.reconcile.unwrap();
    assert!(rec.fast_forwarded.iter().any(|b| b.as_str() == "dev"));
}

#[test]
fn diverged_branch_is_left_alone() {
    let fx = Fixture::new(|fx| {
        fx.commit_upstream_on("dev", "dev.txt", "one\n");
    });
    fx.pull().expect("first pull should succeed");

    fx.clone_git(&["checkout", "-q", "dev"]);
    let local_tip = commit(&fx.clone, "local.txt", "mine\n");
    fx.clone_git(&["checkout", "-q", "main"]);
    let remote_tip = fx.commit_upstream_on("dev", "dev.txt", "theirs\n");

    let report = fx.pull().expect("divergence is not an error");

    assert_eq!(fx.local_ref("refs/heads/dev"), Some(local_tip));
    assert_eq!(fx.local_ref("refs/remotes/origin/dev"), Some(remote_tip));
    let rec = report.reconcile.unwrap();
    assert_eq!(rec.diverged.len(), 1);
    assert_eq!(rec.diverged[0].branch.as_str(), "dev");
}

#[test]
fn checked_out_branch_is_not_moved() {
    let fx = Fixture::new(|_| {});
    let before = fx.local_ref("refs/heads/main");
    let tip = fx.commit_upstream("README.md", "# Changed\n");

    let report = fx.pull().expect("pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/main"), before);
    assert_eq!(fx.local_ref("refs/remotes/origin/main"), Some(tip));
    let rec = report.reconcile.unwrap();
    assert_eq!(
        rec.skipped_current.as_ref().map(|b| b.as_str()),
        Some("main")
    );
}

// =============================================================================
// Deletions
// =============================================================================

#[test]
fn deleted_remote_branch_moves_to_graveyard() {
    let fx = Fixture::new(|fx| {
        fx.commit_upstream_on("old-topic", "topic.txt", "one\n");
    });
    fx.pull().expect("first pull should succeed");
    let tip = fx.local_ref("refs/heads/old-topic").expect("branch created");
    assert_eq!(
        fx.local_config("branch.old-topic.remote").as_deref(),
        Some("origin")
    );

    fx.upstream_git(&["branch", "-q", "-D", "old-topic"]);
    let report = fx.pull().expect("second pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/old-topic"), None);
    assert_eq!(fx.local_ref("refs/remotes/origin/old-topic"), None);
    assert_eq!(fx.local_ref("refs/gg-old/old-topic"), Some(tip));
    assert_eq!(fx.local_config("branch.old-topic.remote"), None);
    assert_eq!(fx.local_config("branch.old-topic.merge"), None);

    let rec = report.reconcile.unwrap();
    assert!(rec.graveyard.iter().any(|b| b.as_str() == "old-topic"));
}

#[test]
fn deleted_branch_with_local_work_is_kept() {
    let fx = Fixture::new(|fx| {
        fx.commit_upstream_on("old-topic", "topic.txt", "one\n");
    });
    fx.pull().expect("first pull should succeed");

    fx.clone_git(&["checkout", "-q", "old-topic"]);
    let local_tip = commit(&fx.clone, "local.txt", "mine\n");
    fx.clone_git(&["checkout", "-q", "main"]);
    fx.upstream_git(&["branch", "-q", "-D", "old-topic"]);

    fx.pull().expect("second pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/old-topic"), Some(local_tip));
    assert_eq!(fx.local_ref("refs/remotes/origin/old-topic"), None);
    assert_eq!(fx.local_ref("refs/gg-old/old-topic"), None);
}

// =============================================================================
// Tags
// =============================================================================

#[test]
fn new_tag_is_fetched() {
    let fx = Fixture::new(|_| {});
    let tip = fx.commit_upstream("README.md", "# v1\n");
    fx.upstream_git(&["tag", "v1"]);

    fx.pull().expect("pull should succeed");

    assert_eq!(fx.local_ref("refs/tags/v1"), Some(tip));
}

#[test]
fn differing_tag_is_reported_and_other_refs_still_update() {
    let fx = Fixture::new(|fx| {
        fx.upstream_git(&["tag", "v1"]);
        fx.commit_upstream_on("dev", "dev.txt", "one\n");
    });
    fx.pull().expect("first pull should succeed");
    let original = fx.local_ref("refs/tags/v1").expect("tag fetched");

    let moved = fx.commit_upstream("README.md", "# retagged\n");
    fx.upstream_git(&["tag", "-f", "v1", &moved]);
    let dev_tip = fx.commit_upstream_on("dev", "dev.txt", "two\n");

    let err = fx.pull().expect_err("differing tag should fail the pull");

    match &err {
        PullError::TagConflicts { conflicts, report } => {
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].tag.as_str(), "refs/tags/v1");
            let rec = report.reconcile.as_ref().unwrap();
            assert!(rec.fast_forwarded.iter().any(|b| b.as_str() == "dev"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("--force-tags"));
    assert_eq!(fx.local_ref("refs/tags/v1"), Some(original));
    assert_eq!(fx.local_ref("refs/heads/dev"), Some(dev_tip));
}

#[test]
fn force_tags_overwrites_differing_tag() {
    let fx = Fixture::new(|fx| {
        fx.upstream_git(&["tag", "v1"]);
    });
    fx.pull().expect("first pull should succeed");
    let moved = fx.commit_upstream("README.md", "# retagged\n");
    fx.upstream_git(&["tag", "-f", "v1", &moved]);

    fx.pull_with(PullOptions {
        request: PlanRequest {
            force_tags: true,
            ..PlanRequest::default()
        },
        ..PullOptions::default()
    })
    .expect("forced pull should succeed");

    assert_eq!(fx.local_ref("refs/tags/v1"), Some(moved));
}

// =============================================================================
// Idempotence and selection
// =============================================================================

#[test]
fn second_pull_changes_nothing() {
    let fx = Fixture::new(|fx| {
        fx.commit_upstream_on("feature", "feature.txt", "one\n");
        fx.commit_upstream_on("gone", "gone.txt", "one\n");
        fx.upstream_git(&["tag", "light"]);
        fx.upstream_git(&["tag", "-a", "annotated", "-m", "release"]);
    });
    fx.pull().expect("first pull should succeed");
    fx.upstream_git(&["branch", "-q", "-D", "gone"]);
    fx.commit_upstream_on("feature", "feature.txt", "two\n");
    fx.pull().expect("second pull should succeed");

    let before = fx.ref_listing();
    let report = fx.pull().expect("third pull should succeed");

    assert_eq!(fx.ref_listing(), before);
    assert!(report.plan.tag_updates.is_empty());
    assert!(report.plan.deferred.deleted_refs.is_empty());
    let rec = report.reconcile.unwrap();
    assert!(rec.created.is_empty());
    assert!(rec.fast_forwarded.is_empty());
    assert!(rec.pruned.is_empty());
    assert!(rec.graveyard.is_empty());
}

#[test]
fn dry_run_mutates_nothing() {
    let fx = Fixture::new(|_| {});
    fx.commit_upstream_on("feature", "feature.txt", "one\n");
    let before = fx.ref_listing();

    let report = fx
        .pull_with(PullOptions {
            dry_run: true,
            ..PullOptions::default()
        })
        .expect("dry run should succeed");

    assert_eq!(fx.ref_listing(), before);
    assert!(report.dry_run);
    assert!(report.reconcile.is_none());
    assert!(report
        .plan
        .deferred
        .branches
        .iter()
        .any(|c| c.branch.as_str() == "feature"));
}

#[test]
fn explicit_ref_limits_the_pull() {
    let fx = Fixture::new(|_| {});
    let wanted = fx.commit_upstream_on("wanted", "a.txt", "a\n");
    fx.commit_upstream_on("ignored", "b.txt", "b\n");

    fx.pull_with(PullOptions {
        request: PlanRequest {
            refs: vec!["wanted".to_string()],
            ..PlanRequest::default()
        },
        ..PullOptions::default()
    })
    .expect("pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/wanted"), Some(wanted));
    assert_eq!(fx.local_ref("refs/heads/ignored"), None);
}

#[test]
fn missing_explicit_ref_fails_before_fetching() {
    let fx = Fixture::new(|_| {});
    let before = fx.ref_listing();

    let err = fx
        .pull_with(PullOptions {
            request: PlanRequest {
                refs: vec!["no-such-branch".to_string()],
                ..PlanRequest::default()
            },
            ..PullOptions::default()
        })
        .expect_err("missing ref should fail");

    assert!(err.to_string().contains("no-such-branch"));
    assert_eq!(fx.ref_listing(), before);
}

#[test]
fn raw_url_source_creates_branch_without_tracking() {
    let fx = Fixture::new(|_| {});
    let tip = fx.commit_upstream_on("feature", "feature.txt", "one\n");
    let url = format!("file://{}", fx.upstream.display());

    fx.pull_with(PullOptions {
        source: Some(url),
        request: PlanRequest {
            refs: vec!["feature".to_string()],
            ..PlanRequest::default()
        },
        ..PullOptions::default()
    })
    .expect("pull should succeed");

    assert_eq!(fx.local_ref("refs/heads/feature"), Some(tip));
    assert_eq!(fx.local_config("branch.feature.remote"), None);
}
