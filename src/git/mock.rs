//! git::mock
//!
//! In-memory repository for deterministic testing.
//!
//! # Design
//!
//! `MockRepo` implements [`VcsExecutor`] and [`ConfigReader`] over plain maps:
//! local refs, a commit parent graph, configured remotes, git config keys,
//! and one "server" ref table per remote URL. Fetch applies refspecs the way
//! git does (an empty destination updates the remote-tracking ref named by
//! the remote's own refspecs). Failures can be injected per ref or for the
//! next fetch, and every effective mutation is counted so tests can assert
//! that a second pull changes nothing.
//!
//! # Example
//!
//! ```
//! use ggsync::core::refspec::Remote;
//! use ggsync::git::mock::MockRepo;
//! use ggsync::git::VcsExecutor;
//!
//! let repo = MockRepo::new();
//! let c1 = repo.commit(&[]);
//! let c2 = repo.commit(&[&c1]);
//! repo.add_remote(Remote::with_default_refspec("origin", "https://example.com/r.git"));
//! repo.set_server_ref("https://example.com/r.git", "refs/heads/main", &c2);
//!
//! assert!(repo.is_ancestor(&c1, &c2).unwrap());
//! assert_eq!(repo.list_remote_refs("origin").unwrap().len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::core::refspec::{FetchRefspec, Remote};
use crate::core::types::{BranchName, Oid, RefName};

use super::traits::{ConfigReader, RefEntry, Upstream, VcsExecutor};
use super::GitError;

#[derive(Debug, Default)]
struct MockState {
    refs: BTreeMap<RefName, Oid>,
    peeled: BTreeMap<RefName, Oid>,
    parents: HashMap<Oid, Vec<Oid>>,
    next_commit: u64,
    head: Option<BranchName>,
    remotes: BTreeMap<String, Remote>,
    config: BTreeMap<String, String>,
    servers: HashMap<String, BTreeMap<RefName, Oid>>,
    failing_refs: HashSet<RefName>,
    fail_next_fetch: bool,
    fetches: Vec<(String, Vec<String>)>,
    mutations: usize,
}

impl MockState {
    fn set_ref(&mut self, name: RefName, oid: Oid) {
        if self.refs.get(&name) != Some(&oid) {
            self.mutations += 1;
            self.refs.insert(name, oid);
        }
    }

    fn check_writable(&self, name: &RefName) -> Result<(), GitError> {
        if self.failing_refs.contains(name) {
            return Err(GitError::CommandFailed {
                command: "git update-ref".to_string(),
                message: format!("injected failure for {}", name),
            });
        }
        Ok(())
    }

    fn remove_config(&mut self, key: &str) {
        if self.config.remove(key).is_some() {
            self.mutations += 1;
        }
    }
}

/// An in-memory repository.
#[derive(Debug, Default)]
pub struct MockRepo {
    state: Mutex<MockState>,
}

impl MockRepo {
    /// Create an empty repository with no remotes and HEAD detached.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Record a new commit with the given parents and return its id.
    pub fn commit(&self, parents: &[&Oid]) -> Oid {
        let mut state = self.state();
        state.next_commit += 1;
        let oid = Oid::new(format!("{:040x}", state.next_commit))
            .unwrap_or_else(|_| unreachable!("40 hex digits"));
        state
            .parents
            .insert(oid.clone(), parents.iter().map(|p| (*p).clone()).collect());
        oid
    }

    /// Set a local ref without counting it as a mutation.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid ref name.
    pub fn set_local_ref(&self, name: &str, oid: &Oid) {
        let name = RefName::new(name).expect("valid ref name");
        self.state().refs.insert(name, oid.clone());
    }

    /// Record the commit an annotated local tag peels to.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid ref name.
    pub fn set_local_peeled(&self, name: &str, oid: &Oid) {
        let name = RefName::new(name).expect("valid ref name");
        self.state().peeled.insert(name, oid.clone());
    }

    /// Configure a remote.
    pub fn add_remote(&self, remote: Remote) {
        self.state().remotes.insert(remote.name.clone(), remote);
    }

    /// Set a ref on the server behind `url`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid ref name.
    pub fn set_server_ref(&self, url: &str, name: &str, oid: &Oid) {
        let name = RefName::new(name).expect("valid ref name");
        self.state()
            .servers
            .entry(url.to_string())
            .or_default()
            .insert(name, oid.clone());
    }

    /// Remove a ref from the server behind `url`.
    pub fn remove_server_ref(&self, url: &str, name: &str) {
        if let Some(server) = self.state().servers.get_mut(url) {
            server.retain(|r, _| r.as_str() != name);
        }
    }

    /// Point HEAD at a branch (which need not exist).
    ///
    /// # Panics
    ///
    /// Panics if `branch` is not a valid branch name.
    pub fn checkout(&self, branch: &str) {
        self.state().head = Some(BranchName::new(branch).expect("valid branch name"));
    }

    /// Set a git config value without counting it as a mutation.
    pub fn set_config(&self, key: &str, value: &str) {
        self.state().config.insert(key.to_string(), value.to_string());
    }

    /// Make every mutation of `name` fail.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid ref name.
    pub fn fail_mutations_of(&self, name: &str) {
        let name = RefName::new(name).expect("valid ref name");
        self.state().failing_refs.insert(name);
    }

    /// Make the next fetch fail.
    pub fn fail_next_fetch(&self) {
        self.state().fail_next_fetch = true;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current value of a local ref.
    pub fn local_ref(&self, name: &str) -> Option<Oid> {
        self.state()
            .refs
            .iter()
            .find(|(r, _)| r.as_str() == name)
            .map(|(_, oid)| oid.clone())
    }

    /// Current value of a config key.
    pub fn config_value(&self, key: &str) -> Option<String> {
        self.state().config.get(key).cloned()
    }

    /// Number of effective ref/config mutations so far.
    pub fn mutation_count(&self) -> usize {
        self.state().mutations
    }

    /// Every fetch performed, as `(source, refspecs)`.
    pub fn fetch_log(&self) -> Vec<(String, Vec<String>)> {
        self.state().fetches.clone()
    }
}

impl VcsExecutor for MockRepo {
    fn fetch(&self, source: &str, refspecs: &[String]) -> Result<(), GitError> {
        let mut state = self.state();
        state.fetches.push((source.to_string(), refspecs.to_vec()));

        if std::mem::take(&mut state.fail_next_fetch) {
            return Err(GitError::CommandFailed {
                command: "git fetch".to_string(),
                message: "injected failure".to_string(),
            });
        }

        let remote = state.remotes.get(source).cloned();
        let url = remote
            .as_ref()
            .map_or_else(|| source.to_string(), |r| r.url.clone());
        let server = state
            .servers
            .get(&url)
            .cloned()
            .ok_or_else(|| GitError::CommandFailed {
                command: "git fetch".to_string(),
                message: format!("repository '{}' not found", url),
            })?;

        for spec in refspecs {
            let spec: FetchRefspec = spec.parse().map_err(|e| GitError::CommandFailed {
                command: "git fetch".to_string(),
                message: format!("{}", e),
            })?;
            let src = RefName::new(spec.src.as_str())?;
            let oid = server.get(&src).ok_or_else(|| GitError::CommandFailed {
                command: "git fetch".to_string(),
                message: format!("couldn't find remote ref {}", src),
            })?;

            let dst = if spec.dst.is_empty() {
                remote.as_ref().and_then(|r| r.map_fetch(&src))
            } else {
                Some(RefName::new(spec.dst.as_str())?)
            };
            let Some(dst) = dst else {
                continue;
            };

            if let Some(current) = state.refs.get(&dst) {
                if current != oid && dst.is_tag_ref() && !spec.force {
                    return Err(GitError::CommandFailed {
                        command: "git fetch".to_string(),
                        message: format!("! [rejected] {} (would clobber existing tag)", dst),
                    });
                }
            }
            state.set_ref(dst, oid.clone());
        }

        Ok(())
    }

    fn list_local_refs(&self) -> Result<Vec<RefEntry>, GitError> {
        let state = self.state();
        let mut entries: Vec<RefEntry> = state
            .refs
            .iter()
            .map(|(name, oid)| RefEntry::new(name.clone(), oid.clone()))
            .collect();
        entries.extend(
            state
                .peeled
                .iter()
                .filter(|(name, _)| state.refs.contains_key(*name))
                .map(|(name, oid)| RefEntry::peeled(name.clone(), oid.clone())),
        );
        Ok(entries)
    }

    fn list_remote_refs(&self, source: &str) -> Result<Vec<RefEntry>, GitError> {
        let state = self.state();
        let url = state
            .remotes
            .get(source)
            .map_or(source, |r| r.url.as_str());
        let server = state.servers.get(url).ok_or_else(|| GitError::CommandFailed {
            command: "git ls-remote".to_string(),
            message: format!("repository '{}' not found", url),
        })?;
        Ok(server
            .iter()
            .map(|(name, oid)| RefEntry::new(name.clone(), oid.clone()))
            .collect())
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        let state = self.state();
        let mut queue = VecDeque::from([descendant.clone()]);
        let mut seen = HashSet::new();

        while let Some(oid) = queue.pop_front() {
            if &oid == ancestor {
                return Ok(true);
            }
            if !seen.insert(oid.clone()) {
                continue;
            }
            if let Some(parents) = state.parents.get(&oid) {
                queue.extend(parents.iter().cloned());
            }
        }
        Ok(false)
    }

    fn create_branch(
        &self,
        branch: &BranchName,
        start: &Oid,
        upstream: Option<&Upstream>,
    ) -> Result<(), GitError> {
        let mut state = self.state();
        let refname = RefName::for_branch(branch);
        state.check_writable(&refname)?;
        if !state.parents.contains_key(start) {
            return Err(GitError::ObjectNotFound {
                oid: start.to_string(),
            });
        }

        state.set_ref(refname, start.clone());
        if let Some(upstream) = upstream {
            state
                .config
                .insert(format!("branch.{}.remote", branch), upstream.remote.clone());
            state
                .config
                .insert(format!("branch.{}.merge", branch), upstream.merge.to_string());
        }
        Ok(())
    }

    fn update_ref_cas(
        &self,
        refname: &RefName,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
    ) -> Result<(), GitError> {
        let mut state = self.state();
        state.check_writable(refname)?;

        let current = state.refs.get(refname);
        if current != expected_old {
            return Err(GitError::stale(
                refname,
                expected_old,
                current.map(Oid::as_str),
            ));
        }

        state.set_ref(refname.clone(), new_oid.clone());
        Ok(())
    }

    fn delete_ref_cas(&self, refname: &RefName, expected_old: &Oid) -> Result<(), GitError> {
        let mut state = self.state();
        state.check_writable(refname)?;

        match state.refs.get(refname) {
            None => Err(GitError::RefNotFound {
                refname: refname.to_string(),
            }),
            Some(actual) if actual != expected_old => Err(GitError::stale(
                refname,
                Some(expected_old),
                Some(actual.as_str()),
            )),
            Some(_) => {
                state.refs.remove(refname);
                state.peeled.remove(refname);
                state.mutations += 1;
                Ok(())
            }
        }
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        Ok(self.state().head.clone())
    }

    fn clear_upstream(&self, branch: &BranchName) -> Result<(), GitError> {
        let mut state = self.state();
        state.remove_config(&format!("branch.{}.remote", branch));
        state.remove_config(&format!("branch.{}.merge", branch));
        Ok(())
    }
}

impl ConfigReader for MockRepo {
    fn list_remotes(&self) -> Result<BTreeMap<String, Remote>, GitError> {
        Ok(self.state().remotes.clone())
    }

    fn value(&self, key: &str) -> Result<Option<String>, GitError> {
        Ok(self.state().config.get(key).cloned())
    }
}
