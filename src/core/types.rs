//! core::types
//!
//! Strong types for the ref namespaces the pull engine reasons about.
//!
//! # Types
//!
//! - [`BranchName`] - Validated branch short name (`feature/foo`)
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated fully-qualified ref (`refs/heads/feature/foo`)
//! - [`Fingerprint`] - Stable hash over a set of refs
//!
//! # Namespaces
//!
//! | Prefix              | Meaning                                   |
//! |---------------------|-------------------------------------------|
//! | `refs/heads/`       | local branches                            |
//! | `refs/tags/`        | tags                                      |
//! | `refs/remotes/`     | remote-tracking refs                      |
//! | `refs/gg-old/`      | graveyard for branches deleted on a remote |
//! | `refs/gg-fetch/`    | landing zone for fetches from a raw URL   |
//!
//! # Examples
//!
//! ```
//! use ggsync::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert!(refname.is_branch_ref());
//! assert_eq!(refname.short_name(), "feature/my-branch");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix of local branch refs.
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Prefix of tag refs.
pub const TAG_PREFIX: &str = "refs/tags/";

/// Prefix of remote-tracking refs.
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Graveyard namespace for branches whose last remote source deleted them.
pub const GRAVEYARD_PREFIX: &str = "refs/gg-old/";

/// Landing namespace for branches fetched from a raw URL.
pub const URL_FETCH_PREFIX: &str = "refs/gg-fetch/";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Conversions shared by the validated string newtypes. Deserialization
/// goes through `new`, so a value read from JSON is always valid.
macro_rules! validated_string {
    ($ty:ident) => {
        impl $ty {
            /// The underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Check `name` against `git check-ref-format` rules shared by branch and
/// ref names. Returns a description of the first violation.
fn check_ref_format(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("cannot be empty".into());
    }
    if name.starts_with('/') {
        return Err("cannot start with '/'".into());
    }
    if name.ends_with('/') {
        return Err("cannot end with '/'".into());
    }
    if name.ends_with('.') {
        return Err("cannot end with '.'".into());
    }

    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Err(format!("cannot contain '{bad}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err("cannot contain control characters".into());
    }

    for component in name.split('/').filter(|c| !c.is_empty()) {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }

    Ok(())
}

/// A validated Git branch name (the part after `refs/heads/`).
///
/// # Example
///
/// ```
/// use ggsync::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-flag").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        check_ref_format(&name)
            .map_err(|msg| TypeError::InvalidBranchName(format!("branch name {msg}")))?;
        Ok(Self(name))
    }
}

validated_string!(BranchName);

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase so equality is exact-string.
///
/// # Example
///
/// ```
/// use ggsync::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex string.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }
}

validated_string!(Oid);

/// A validated, fully-qualified Git reference name.
///
/// Equality is exact-string. The predicates classify a ref by namespace.
///
/// # Example
///
/// ```
/// use ggsync::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("topic").unwrap();
/// assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/topic");
/// assert_eq!(RefName::for_graveyard(&branch).as_str(), "refs/gg-old/topic");
///
/// let tag = RefName::new("refs/tags/v1.0").unwrap();
/// assert!(tag.is_tag_ref());
/// assert_eq!(tag.short_name(), "v1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.ends_with(".lock") {
            return Err(TypeError::InvalidRefName(
                "ref name cannot end with '.lock'".into(),
            ));
        }
        check_ref_format(&name)
            .map_err(|msg| TypeError::InvalidRefName(format!("ref name {msg}")))?;
        Ok(Self(name))
    }

    /// Ref for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("{BRANCH_PREFIX}{branch}"))
    }

    /// Ref for a tag (`refs/tags/<name>`).
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if `name` is not a valid tag name.
    pub fn for_tag(name: &str) -> Result<Self, TypeError> {
        Self::new(format!("{TAG_PREFIX}{name}"))
    }

    /// Graveyard ref for a branch (`refs/gg-old/<branch>`).
    pub fn for_graveyard(branch: &BranchName) -> Self {
        Self(format!("{GRAVEYARD_PREFIX}{branch}"))
    }

    /// Landing ref for a branch fetched from a raw URL
    /// (`refs/gg-fetch/heads/<branch>`).
    pub fn for_url_fetch(branch: &BranchName) -> Self {
        Self(format!("{URL_FETCH_PREFIX}heads/{branch}"))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a local branch.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with(BRANCH_PREFIX)
    }

    /// Check if this ref is a tag.
    pub fn is_tag_ref(&self) -> bool {
        self.0.starts_with(TAG_PREFIX)
    }

    /// Check if this ref lives in the graveyard namespace.
    pub fn is_graveyard_ref(&self) -> bool {
        self.0.starts_with(GRAVEYARD_PREFIX)
    }

    /// The branch this ref names, if it is under `refs/heads/`.
    pub fn branch(&self) -> Option<BranchName> {
        self.strip_prefix(BRANCH_PREFIX)
            .and_then(|name| BranchName::new(name).ok())
    }

    /// Name with its namespace removed: `refs/heads/x` and `refs/tags/x`
    /// become `x`. Other refs are returned unchanged.
    pub fn short_name(&self) -> &str {
        self.strip_prefix(BRANCH_PREFIX)
            .or_else(|| self.strip_prefix(TAG_PREFIX))
            .unwrap_or(&self.0)
    }
}

validated_string!(RefName);

/// A stable hash over a set of ref values.
///
/// Two snapshots with the same fingerprint hold exactly the same refs at
/// the same hashes, so comparing fingerprints before and after a pull tells
/// whether anything moved.
///
/// # Example
///
/// ```
/// use ggsync::core::types::{Fingerprint, Oid, RefName};
///
/// let main = RefName::new("refs/heads/main").unwrap();
/// let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
///
/// let fp1 = Fingerprint::compute([(&main, &oid)]);
/// let fp2 = Fingerprint::compute([(&main, &oid)]);
/// assert_eq!(fp1, fp2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from `(refname, oid)` pairs.
    ///
    /// Pairs are sorted by ref name before hashing, so input order does not
    /// matter.
    pub fn compute<'a>(refs: impl IntoIterator<Item = (&'a RefName, &'a Oid)>) -> Self {
        let mut sorted: Vec<_> = refs.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (refname, oid) in sorted {
            hasher.update(refname.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(oid.as_str().as_bytes());
            hasher.update(b"\n");
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for diagnostics.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
