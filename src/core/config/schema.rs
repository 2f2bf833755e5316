//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GG_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gg/config.toml`
//! 3. `~/.gg/config.toml`
//!
//! # Repo Config
//!
//! Located at `<git_dir>/gg/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., a remote name must be usable in a ref name).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// default_remote = "origin"
/// force_tags = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Remote used when the checked-out branch has no upstream
    pub default_remote: Option<String>,

    /// Overwrite differing local tags on every pull
    pub force_tags: Option<bool>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.default_remote {
            validate_remote_name("default_remote", remote)?;
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "upstream"
/// force_tags = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote name (overrides the global default)
    pub remote: Option<String>,

    /// Overwrite differing local tags on every pull
    pub force_tags: Option<bool>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            validate_remote_name("remote", remote)?;
        }
        Ok(())
    }
}

/// Remote names end up inside `refs/remotes/<name>/...`, so they follow the
/// same rules as a branch name.
fn validate_remote_name(key: &str, remote: &str) -> Result<(), ConfigError> {
    if remote.is_empty() {
        return Err(ConfigError::InvalidValue(format!("{} cannot be empty", key)));
    }
    BranchName::new(remote)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(format!("invalid {} '{}': {}", key, remote, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global {
        use super::*;

        #[test]
        fn parses_all_keys() {
            let config: GlobalConfig = toml::from_str(
                r#"
                default_remote = "upstream"
                force_tags = true
                "#,
            )
            .unwrap();

            assert_eq!(config.default_remote.as_deref(), Some("upstream"));
            assert_eq!(config.force_tags, Some(true));
            assert!(config.validate().is_ok());
        }

        #[test]
        fn empty_is_default() {
            let config: GlobalConfig = toml::from_str("").unwrap();
            assert_eq!(config, GlobalConfig::default());
        }

        #[test]
        fn rejects_unknown_fields() {
            let result: Result<GlobalConfig, _> = toml::from_str("trunk = \"main\"");
            assert!(result.is_err());
        }

        #[test]
        fn rejects_bad_remote() {
            let config = GlobalConfig {
                default_remote: Some("bad remote".into()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
    }

    mod repo {
        use super::*;

        #[test]
        fn rejects_empty_remote() {
            let config = RepoConfig {
                remote: Some(String::new()),
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("remote cannot be empty"));
        }

        #[test]
        fn accepts_valid_remote() {
            let config = RepoConfig {
                remote: Some("fork".into()),
                force_tags: Some(false),
            };
            assert!(config.validate().is_ok());
        }
    }
}
