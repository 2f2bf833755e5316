//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! The engine never talks to git directly. It is written against the
//! [`VcsExecutor`] and [`ConfigReader`] traits, which this module implements
//! twice:
//!
//! - [`Git`]: a real repository. Local reads and ref mutations go through
//!   `git2`; `fetch` and `ls-remote` shell out to the `git` executable so that
//!   the user's transports, credentials and remote helpers apply.
//! - [`mock::MockRepo`]: an in-memory repository for deterministic tests.
//!
//! # Invariants
//!
//! - All ref mutations are conditioned on an expected old value
//! - All operations return strong types (Oid, BranchName, RefName)

mod interface;
pub mod mock;
mod traits;

pub use interface::{parse_ls_remote, Git, GitError};
pub use traits::{ConfigReader, RefEntry, Upstream, VcsExecutor};
