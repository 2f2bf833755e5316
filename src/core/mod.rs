//! core
//!
//! Core domain types, refspecs, configuration and locking.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName, Fingerprint
//! - [`refspec`] - Fetch refspecs, remotes and ref-name globbing
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Exclusive repository lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod config;
pub mod lock;
pub mod refspec;
pub mod types;
