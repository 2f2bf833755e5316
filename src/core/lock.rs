//! core::lock
//!
//! Exclusive repository lock for `gg pull`.
//!
//! # Architecture
//!
//! Reconciliation reads local refs, then mutates them. Two concurrent pulls
//! in the same repository would each see the other's half-applied state, so
//! a pull that fetches holds an OS-level lock on `<git_dir>/gg/lock` for its
//! whole duration. Compare-and-set ref updates still guard against every
//! other writer (plain `git` commands do not take this lock).
//!
//! The holder writes its process id into the lock file so that a second
//! `gg pull` can say who it is waiting on. The id is informational only;
//! the OS lock is what excludes.
//!
//! # Invariants
//!
//! - The lock is released on drop
//! - Acquisition never blocks
//!
//! # Example
//!
//! ```no_run
//! use ggsync::core::lock::RepoLock;
//! use std::path::Path;
//!
//! let mut lock = RepoLock::acquire(Path::new("/repo/.git")).unwrap();
//! // ... mutate refs ...
//! lock.release().unwrap();
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another gg process{} ({})", holder_suffix(.holder), .path.display())]
    AlreadyLocked {
        /// The lock file.
        path: PathBuf,
        /// Process id recorded by the holder, when readable.
        holder: Option<u32>,
    },

    /// The lock file or its directory could not be created.
    #[error("cannot create {}: {source}", .path.display())]
    CreateFailed {
        /// File or directory being created.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The OS refused the lock for a reason other than contention.
    #[error("failed to lock {}: {source}", .path.display())]
    AcquireFailed {
        /// The lock file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Unlocking failed.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(#[source] std::io::Error),
}

fn holder_suffix(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}

/// An exclusive lock on the repository, held until dropped.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    // Some while held
    file: Option<File>,
}

impl RepoLock {
    /// Path of the lock file for a repository.
    pub fn lock_path(git_dir: &Path) -> PathBuf {
        git_dir.join("gg").join("lock")
    }

    /// Take the repository lock or fail immediately.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be taken
    pub fn acquire(git_dir: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path(git_dir);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| LockError::CreateFailed {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::CreateFailed {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                record_holder(&mut file);
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::AlreadyLocked {
                    holder: read_holder(&mut file),
                    path,
                })
            }
            Err(source) => Err(LockError::AcquireFailed { path, source }),
        }
    }

    /// The lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release before drop. Releasing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LockError::ReleaseFailed` if the OS unlock fails.
    pub fn release(&mut self) -> Result<(), LockError> {
        match self.file.take() {
            Some(file) => file.unlock().map_err(LockError::ReleaseFailed),
            None => Ok(()),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

// The pid is a courtesy for the error message, so write failures are ignored.
fn record_holder(file: &mut File) {
    let _ = file
        .set_len(0)
        .and_then(|()| file.seek(SeekFrom::Start(0)))
        .and_then(|_| write!(file, "{}", std::process::id()));
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}
