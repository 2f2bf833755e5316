//! core::refspec
//!
//! Fetch refspecs, remotes, and ref-name pattern matching.
//!
//! A fetch refspec maps refs on the remote (`src`) to refs in the local
//! repository (`dst`), e.g. `+refs/heads/*:refs/remotes/origin/*`. Each side
//! may carry at most one `*`, and both sides must agree on whether they do.
//!
//! # Example
//!
//! ```
//! use ggsync::core::refspec::FetchRefspec;
//!
//! let spec: FetchRefspec = "+refs/heads/*:refs/remotes/origin/*".parse().unwrap();
//! assert!(spec.force);
//! assert_eq!(
//!     spec.map_to_destination("refs/heads/main").as_deref(),
//!     Some("refs/remotes/origin/main")
//! );
//! assert_eq!(
//!     spec.map_to_source("refs/remotes/origin/main").as_deref(),
//!     Some("refs/heads/main")
//! );
//! ```

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{RefName, REMOTES_PREFIX};

/// Errors from parsing a refspec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefspecError {
    #[error("refspec {0:?} has no ':' separator")]
    MissingSeparator(String),

    #[error("refspec {0:?} has an empty source")]
    EmptySource(String),

    #[error("refspec {0:?} has more than one '*' on a side")]
    TooManyWildcards(String),

    #[error("refspec {0:?} uses '*' on only one side")]
    UnbalancedWildcard(String),
}

/// One fetch refspec of a remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRefspec {
    /// Pattern on the remote side.
    pub src: String,
    /// Pattern on the local side.
    pub dst: String,
    /// Whether non-fast-forward updates are allowed (`+` prefix).
    pub force: bool,
}

impl FetchRefspec {
    /// Create a refspec from its parts.
    pub fn new(src: impl Into<String>, dst: impl Into<String>, force: bool) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force,
        }
    }

    /// Whether this refspec carries a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.src.contains('*')
    }

    /// Map a remote ref to the local ref this refspec stores it in.
    pub fn map_to_destination(&self, src_ref: &str) -> Option<String> {
        substitute(&self.src, &self.dst, src_ref)
    }

    /// Map a local ref back to the remote ref it was fetched from.
    pub fn map_to_source(&self, dst_ref: &str) -> Option<String> {
        substitute(&self.dst, &self.src, dst_ref)
    }
}

impl FromStr for FetchRefspec {
    type Err = RefspecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (force, rest) = match s.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (src, dst) = rest
            .split_once(':')
            .ok_or_else(|| RefspecError::MissingSeparator(s.to_string()))?;
        if src.is_empty() {
            return Err(RefspecError::EmptySource(s.to_string()));
        }

        let src_stars = src.matches('*').count();
        let dst_stars = dst.matches('*').count();
        if src_stars > 1 || dst_stars > 1 {
            return Err(RefspecError::TooManyWildcards(s.to_string()));
        }
        if !dst.is_empty() && src_stars != dst_stars {
            return Err(RefspecError::UnbalancedWildcard(s.to_string()));
        }

        Ok(Self::new(src, dst, force))
    }
}

impl std::fmt::Display for FetchRefspec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.force {
            write!(f, "+")?;
        }
        write!(f, "{}:{}", self.src, self.dst)
    }
}

/// Match `name` against a single-wildcard `from` pattern and substitute the
/// captured part into `to`.
fn substitute(from: &str, to: &str, name: &str) -> Option<String> {
    if to.is_empty() {
        return None;
    }
    match from.split_once('*') {
        None => (from == name).then(|| to.to_string()),
        Some((prefix, suffix)) => {
            let middle = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
            if middle.is_empty() {
                return None;
            }
            Some(to.replacen('*', middle, 1))
        }
    }
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remote {
    /// Remote name (`origin`).
    pub name: String,
    /// Fetch URL.
    pub url: String,
    /// Fetch refspecs in configuration order.
    pub fetch: Vec<FetchRefspec>,
}

impl Remote {
    /// A remote with git's default fetch refspec
    /// (`+refs/heads/*:refs/remotes/<name>/*`).
    pub fn with_default_refspec(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        let fetch = vec![FetchRefspec::new(
            "refs/heads/*",
            format!("{REMOTES_PREFIX}{name}/*"),
            true,
        )];
        Self {
            name,
            url: url.into(),
            fetch,
        }
    }

    /// The local ref that the first matching refspec stores `remote_ref` in.
    pub fn map_fetch(&self, remote_ref: &RefName) -> Option<RefName> {
        self.fetch
            .iter()
            .find_map(|spec| spec.map_to_destination(remote_ref.as_str()))
            .and_then(|dst| RefName::new(dst).ok())
    }

    /// The symbolic `refs/remotes/<name>/HEAD` alias.
    pub fn head_alias(&self) -> String {
        format!("{REMOTES_PREFIX}{}/HEAD", self.name)
    }
}

/// Shell-style glob match used for `--pattern`.
///
/// `*` matches any run of characters (including `/`), `?` matches exactly
/// one character. Everything else matches literally.
///
/// ```
/// use ggsync::core::refspec::glob_match;
///
/// assert!(glob_match("feature/*", "feature/login"));
/// assert!(glob_match("v1.?", "v1.2"));
/// assert!(!glob_match("v1.?", "v1.10"));
/// ```
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn forced_wildcard() {
            let spec: FetchRefspec = "+refs/heads/*:refs/remotes/origin/*".parse().unwrap();
            assert!(spec.force);
            assert!(spec.is_wildcard());
            assert_eq!(spec.src, "refs/heads/*");
            assert_eq!(spec.dst, "refs/remotes/origin/*");
        }

        #[test]
        fn exact_refspec() {
            let spec: FetchRefspec = "refs/heads/main:refs/remotes/origin/main".parse().unwrap();
            assert!(!spec.force);
            assert!(!spec.is_wildcard());
        }

        #[test]
        fn empty_destination_allowed() {
            let spec: FetchRefspec = "refs/heads/main:".parse().unwrap();
            assert!(spec.dst.is_empty());
            assert_eq!(spec.map_to_destination("refs/heads/main"), None);
        }

        #[test]
        fn errors() {
            assert!(matches!(
                "refs/heads/main".parse::<FetchRefspec>(),
                Err(RefspecError::MissingSeparator(_))
            ));
            assert!(matches!(
                ":refs/x".parse::<FetchRefspec>(),
                Err(RefspecError::EmptySource(_))
            ));
            assert!(matches!(
                "refs/*/*:refs/x/*".parse::<FetchRefspec>(),
                Err(RefspecError::TooManyWildcards(_))
            ));
            assert!(matches!(
                "refs/heads/*:refs/x".parse::<FetchRefspec>(),
                Err(RefspecError::UnbalancedWildcard(_))
            ));
        }

        #[test]
        fn display_matches_git_syntax() {
            let spec = FetchRefspec::new("refs/tags/v1", "refs/tags/v1", true);
            assert_eq!(spec.to_string(), "+refs/tags/v1:refs/tags/v1");
            let spec = FetchRefspec::new("refs/heads/a", "", false);
            assert_eq!(spec.to_string(), "refs/heads/a:");
        }
    }

    mod mapping {
        use super::*;

        fn origin() -> FetchRefspec {
            FetchRefspec::new("refs/heads/*", "refs/remotes/origin/*", true)
        }

        #[test]
        fn wildcard_both_ways() {
            let spec = origin();
            assert_eq!(
                spec.map_to_destination("refs/heads/a/b").as_deref(),
                Some("refs/remotes/origin/a/b")
            );
            assert_eq!(
                spec.map_to_source("refs/remotes/origin/a/b").as_deref(),
                Some("refs/heads/a/b")
            );
        }

        #[test]
        fn wildcard_non_matching() {
            let spec = origin();
            assert_eq!(spec.map_to_destination("refs/tags/v1"), None);
            assert_eq!(spec.map_to_source("refs/remotes/upstream/main"), None);
            assert_eq!(spec.map_to_source("refs/remotes/origin/"), None);
        }

        #[test]
        fn wildcard_with_suffix() {
            let spec = FetchRefspec::new("refs/heads/*/tip", "refs/mirror/*/tip", false);
            assert_eq!(
                spec.map_to_destination("refs/heads/x/tip").as_deref(),
                Some("refs/mirror/x/tip")
            );
            assert_eq!(spec.map_to_destination("refs/heads/x/base"), None);
        }

        #[test]
        fn exact_mapping() {
            let spec = FetchRefspec::new("refs/heads/main", "refs/remotes/origin/main", false);
            assert_eq!(
                spec.map_to_destination("refs/heads/main").as_deref(),
                Some("refs/remotes/origin/main")
            );
            assert_eq!(spec.map_to_destination("refs/heads/other"), None);
        }

        #[test]
        fn remote_map_fetch_uses_first_match() {
            let remote = Remote {
                name: "origin".into(),
                url: "https://example.com/repo.git".into(),
                fetch: vec![
                    FetchRefspec::new("refs/heads/main", "refs/remotes/origin/trunk", false),
                    FetchRefspec::new("refs/heads/*", "refs/remotes/origin/*", true),
                ],
            };
            let main = RefName::new("refs/heads/main").unwrap();
            let topic = RefName::new("refs/heads/topic").unwrap();
            assert_eq!(
                remote.map_fetch(&main).unwrap().as_str(),
                "refs/remotes/origin/trunk"
            );
            assert_eq!(
                remote.map_fetch(&topic).unwrap().as_str(),
                "refs/remotes/origin/topic"
            );
        }

        #[test]
        fn default_refspec_remote() {
            let remote = Remote::with_default_refspec("mirror", "/srv/mirror.git");
            assert_eq!(remote.fetch[0].to_string(), "+refs/heads/*:refs/remotes/mirror/*");
            assert_eq!(remote.head_alias(), "refs/remotes/mirror/HEAD");
        }
    }

    mod glob {
        use super::*;

        #[test]
        fn literal() {
            assert!(glob_match("main", "main"));
            assert!(!glob_match("main", "mainline"));
        }

        #[test]
        fn star_crosses_slashes() {
            assert!(glob_match("feature/*", "feature/a/b"));
            assert!(glob_match("*", ""));
            assert!(glob_match("refs/heads/*-wip", "refs/heads/x/y-wip"));
            assert!(!glob_match("refs/heads/*-wip", "refs/heads/x/y-done"));
        }

        #[test]
        fn question_mark() {
            assert!(glob_match("v?", "v1"));
            assert!(!glob_match("v?", "v"));
        }

        #[test]
        fn backtracking() {
            assert!(glob_match("*a*b", "xaxxab"));
            assert!(!glob_match("*a*b", "xaxxa"));
        }
    }
}
