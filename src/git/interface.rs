//! git::interface
//!
//! The production [`VcsExecutor`] and [`ConfigReader`].
//!
//! Local reads and all ref mutations go through `git2`. The two network
//! operations, `fetch` and `ls-remote`, run the `git` executable so the
//! user's configured transports and credential helpers are honored.
//!
//! # Error Handling
//!
//! [`GitError`] separates the outcomes the engine reacts to from opaque
//! failures:
//! - [`GitError::StaleRef`]: a compare-and-set precondition no longer holds
//! - [`GitError::RefNotFound`]: a compare-and-delete target is already gone
//! - [`GitError::CommandFailed`]: a `git` subprocess exited unsuccessfully
//! - [`GitError::Git2`]: anything else libgit2 reports, with context
//!
//! # Example
//!
//! ```ignore
//! use ggsync::git::{Git, VcsExecutor};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let refs = git.list_local_refs()?;
//! println!("{} local refs", refs.len());
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::refspec::{FetchRefspec, Remote};
use crate::core::types::{BranchName, Oid, RefName, TypeError};

use super::traits::{ConfigReader, RefEntry, Upstream, VcsExecutor};

/// Reflog message for every ref this tool writes.
const REFLOG_MESSAGE: &str = "gg: pull";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository contains the path.
    #[error("not a git repository: {}", .path.display())]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// `gg pull` needs a working tree to know the checked-out branch.
    #[error("bare repository not supported")]
    BareRepo,

    /// The ref to delete does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The missing ref
        refname: String,
    },

    /// The ref moved between the snapshot and the mutation.
    #[error("{refname} changed since it was read: expected {expected}, found {actual}")]
    StaleRef {
        /// The ref being updated
        refname: String,
        /// Value the caller captured (`<none>` for create-only)
        expected: String,
        /// Value found now (`<none>` if absent)
        actual: String,
    },

    /// A commit the operation needs is not in the object database.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The missing object
        oid: String,
    },

    /// A name read from git is not a valid ref, branch or object id.
    #[error(transparent)]
    InvalidName(#[from] TypeError),

    /// A ref listing line could not be parsed.
    #[error("malformed ref listing line: {line:?}")]
    MalformedListing {
        /// The offending line
        line: String,
    },

    /// A `git` subprocess failed.
    #[error("{command} failed: {message}")]
    CommandFailed {
        /// The command that was run (e.g. "git fetch")
        command: String,
        /// Exit status or stderr
        message: String,
    },

    /// libgit2 reported an error.
    #[error("{context}: {}", .source.message())]
    Git2 {
        /// What was being done
        context: String,
        /// The libgit2 error
        #[source]
        source: git2::Error,
    },
}

impl GitError {
    /// Compare-and-set mismatch; `None` renders as `<none>`.
    pub fn stale(refname: &RefName, expected: Option<&Oid>, actual: Option<&str>) -> Self {
        GitError::StaleRef {
            refname: refname.to_string(),
            expected: expected.map_or_else(|| "<none>".to_string(), Oid::to_string),
            actual: actual.unwrap_or("<none>").to_string(),
        }
    }
}

/// Wrap a libgit2 error with what was being done.
fn git2_err(context: impl Into<String>) -> impl FnOnce(git2::Error) -> GitError {
    let context = context.into();
    move |source| GitError::Git2 { context, source }
}

/// Parse `git ls-remote` / `git show-ref --dereference` output.
///
/// Each line is `<hash>\t<ref>`. Lines ending in `^{}` become peeled
/// entries for the tag they name. Refs whose names git itself would refuse
/// are skipped.
///
/// # Example
///
/// ```
/// use ggsync::git::parse_ls_remote;
///
/// let out = "\
/// 1111111111111111111111111111111111111111\tHEAD
/// 1111111111111111111111111111111111111111\trefs/heads/main
/// 2222222222222222222222222222222222222222\trefs/tags/v1
/// 1111111111111111111111111111111111111111\trefs/tags/v1^{}
/// ";
/// let entries = parse_ls_remote(out).unwrap();
/// assert_eq!(entries.len(), 4);
/// assert!(entries[3].peeled);
/// assert_eq!(entries[3].name.as_str(), "refs/tags/v1");
/// ```
pub fn parse_ls_remote(output: &str) -> Result<Vec<RefEntry>, GitError> {
    let mut entries = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = || GitError::MalformedListing {
            line: line.to_string(),
        };
        let (hash, name) = line.split_once(['\t', ' ']).ok_or_else(malformed)?;
        let oid = Oid::new(hash.trim()).map_err(|_| malformed())?;

        let name = name.trim();
        let (name, peeled) = match name.strip_suffix("^{}") {
            Some(tag) => (tag, true),
            None => (name, false),
        };
        let Ok(name) = RefName::new(name) else {
            continue;
        };

        entries.push(RefEntry { name, oid, peeled });
    }
    Ok(entries)
}

/// A repository with a working tree.
pub struct Git {
    repo: git2::Repository,
    work_dir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("git_dir", &self.repo.path())
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl Git {
    /// Open the repository containing `path` (any directory inside it).
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working tree
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(Self { repo, work_dir })
    }

    /// The `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// The working tree root.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.work_dir);
        cmd
    }

    /// Run `git <args>` and capture stdout.
    fn capture(&self, args: &[&str]) -> Result<String, GitError> {
        let command = format!("git {}", args.first().copied().unwrap_or_default());
        let output = self
            .git_command()
            .args(args)
            .output()
            .map_err(|e| GitError::CommandFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Direct value of `refname` (symbolic refs resolved), or `None`.
    fn read_ref(&self, refname: &RefName) -> Result<Option<String>, GitError> {
        let reference = match self.repo.find_reference(refname.as_str()) {
            Ok(reference) => reference,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(git2_err(format!("reading {}", refname))(e)),
        };
        let target = reference
            .resolve()
            .map_err(git2_err(format!("resolving {}", refname)))?
            .target();
        Ok(target.map(|oid| oid.to_string()))
    }

    fn git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(git2_err(format!("parsing {}", oid)))
    }

    fn unset(config: &mut git2::Config, key: &str) -> Result<(), GitError> {
        match config.remove(key) {
            Err(e) if e.code() != git2::ErrorCode::NotFound => {
                Err(git2_err(format!("unsetting {}", key))(e))
            }
            _ => Ok(()),
        }
    }

    fn config(&self) -> Result<git2::Config, GitError> {
        self.repo.config().map_err(git2_err("opening git config"))
    }
}

impl VcsExecutor for Git {
    fn fetch(&self, source: &str, refspecs: &[String]) -> Result<(), GitError> {
        // Progress and errors stream straight to the user's terminal
        let status = self
            .git_command()
            .args(["fetch", "--no-tags", source])
            .args(refspecs)
            .status()
            .map_err(|e| GitError::CommandFailed {
                command: "git fetch".to_string(),
                message: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                command: "git fetch".to_string(),
                message: status.to_string(),
            })
        }
    }

    fn list_local_refs(&self) -> Result<Vec<RefEntry>, GitError> {
        let references = self
            .repo
            .references()
            .map_err(git2_err("listing refs"))?;

        let mut entries = Vec::new();
        for reference in references {
            let reference = reference.map_err(git2_err("listing refs"))?;
            let Some(name) = reference.name().and_then(|n| RefName::new(n).ok()) else {
                continue;
            };

            // Dangling symbolic refs have nothing to report
            let Ok(resolved) = reference.resolve() else {
                continue;
            };
            let Some(target) = resolved.target() else {
                continue;
            };
            entries.push(RefEntry::new(name.clone(), Oid::new(target.to_string())?));

            if name.is_tag_ref() {
                if let Ok(commit) = resolved.peel_to_commit() {
                    if commit.id() != target {
                        let peeled = Oid::new(commit.id().to_string())?;
                        entries.push(RefEntry::peeled(name, peeled));
                    }
                }
            }
        }
        Ok(entries)
    }

    fn list_remote_refs(&self, source: &str) -> Result<Vec<RefEntry>, GitError> {
        parse_ls_remote(&self.capture(&["ls-remote", "--quiet", source])?)
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        self.repo
            .graph_descendant_of(Self::git2_oid(descendant)?, Self::git2_oid(ancestor)?)
            .map_err(git2_err(format!("comparing {} and {}", ancestor, descendant)))
    }

    fn create_branch(
        &self,
        branch: &BranchName,
        start: &Oid,
        upstream: Option<&Upstream>,
    ) -> Result<(), GitError> {
        let commit = self
            .repo
            .find_commit(Self::git2_oid(start)?)
            .map_err(|_| GitError::ObjectNotFound {
                oid: start.to_string(),
            })?;

        self.repo
            .branch(branch.as_str(), &commit, true)
            .map_err(git2_err(format!("creating branch {}", branch)))?;

        if let Some(upstream) = upstream {
            let mut config = self.config()?;
            for (key, value) in [
                (format!("branch.{}.remote", branch), upstream.remote.as_str()),
                (format!("branch.{}.merge", branch), upstream.merge.as_str()),
            ] {
                config
                    .set_str(&key, value)
                    .map_err(git2_err(format!("setting {}", key)))?;
            }
        }
        Ok(())
    }

    fn update_ref_cas(
        &self,
        refname: &RefName,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
    ) -> Result<(), GitError> {
        let current = self.read_ref(refname)?;
        if current.as_deref() != expected_old.map(Oid::as_str) {
            return Err(GitError::stale(refname, expected_old, current.as_deref()));
        }

        let new = Self::git2_oid(new_oid)?;
        let written = match expected_old {
            // reference_matching re-checks the old value under the ref lock
            Some(expected) => self.repo.reference_matching(
                refname.as_str(),
                new,
                true,
                Self::git2_oid(expected)?,
                REFLOG_MESSAGE,
            ),
            None => self
                .repo
                .reference(refname.as_str(), new, false, REFLOG_MESSAGE),
        };
        written.map_err(git2_err(format!("updating {}", refname)))?;

        Ok(())
    }

    fn delete_ref_cas(&self, refname: &RefName, expected_old: &Oid) -> Result<(), GitError> {
        let mut reference = match self.repo.find_reference(refname.as_str()) {
            Ok(reference) => reference,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                return Err(GitError::RefNotFound {
                    refname: refname.to_string(),
                })
            }
            Err(e) => return Err(git2_err(format!("reading {}", refname))(e)),
        };

        // delete() re-checks this loaded value under the ref lock
        let actual = reference.target().map(|oid| oid.to_string());
        if actual.as_deref() != Some(expected_old.as_str()) {
            return Err(GitError::stale(refname, Some(expected_old), actual.as_deref()));
        }

        reference
            .delete()
            .map_err(git2_err(format!("deleting {}", refname)))
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(git2_err("reading HEAD"))?;

        // Unborn branches are still checked out
        match head.symbolic_target() {
            Some(target) => Ok(RefName::new(target)?.branch()),
            None => Ok(None),
        }
    }

    fn clear_upstream(&self, branch: &BranchName) -> Result<(), GitError> {
        let mut config = self.config()?;
        Self::unset(&mut config, &format!("branch.{}.remote", branch))?;
        Self::unset(&mut config, &format!("branch.{}.merge", branch))
    }
}

impl ConfigReader for Git {
    fn list_remotes(&self) -> Result<BTreeMap<String, Remote>, GitError> {
        let names = self.repo.remotes().map_err(git2_err("listing remotes"))?;

        let mut remotes = BTreeMap::new();
        for name in names.iter().flatten() {
            let remote = self
                .repo
                .find_remote(name)
                .map_err(git2_err(format!("reading remote {}", name)))?;
            let fetch = remote
                .refspecs()
                .filter(|spec| matches!(spec.direction(), git2::Direction::Fetch))
                .filter_map(|spec| {
                    Some(FetchRefspec::new(
                        spec.src()?,
                        spec.dst().unwrap_or_default(),
                        spec.is_force(),
                    ))
                })
                .collect();

            remotes.insert(
                name.to_string(),
                Remote {
                    name: name.to_string(),
                    url: remote.url().unwrap_or_default().to_string(),
                    fetch,
                },
            );
        }

        Ok(remotes)
    }

    fn value(&self, key: &str) -> Result<Option<String>, GitError> {
        match self.config()?.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(git2_err(format!("reading {}", key))(e)),
        }
    }
}
