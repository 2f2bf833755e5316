//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! gg has two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! Remotes and branch tracking are read from git's own configuration through
//! [`crate::git::ConfigReader`]; these files only hold gg's defaults.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$GG_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gg/config.toml`
//! 3. `~/.gg/config.toml`
//!
//! # Repo Config Location
//!
//! `<git_dir>/gg/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use ggsync::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! println!("Remote: {}", config.default_remote());
//! println!("Force tags: {}", config.force_tags());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::engine::pull::DEFAULT_REMOTE;

/// Environment variable naming the global config file.
pub const CONFIG_ENV: &str = "GG_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// This struct provides accessor methods that apply precedence rules
/// automatically. Repo config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo)
    pub repo: Option<RepoConfig>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the repo config file (if loaded)
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads that repository's config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or fail
    /// validation. Missing config files are not an error (defaults are used).
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let candidates = global_candidates(
            std::env::var(CONFIG_ENV).ok(),
            std::env::var("XDG_CONFIG_HOME").ok(),
            dirs::home_dir(),
        );
        let global_path = candidates.into_iter().find(|p| p.exists());
        Self::load_from(global_path.as_deref(), git_dir)
    }

    /// Load configuration from an explicit global config path.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_from(
        global_path: Option<&Path>,
        git_dir: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let global: GlobalConfig = match global_path {
            Some(path) => read_toml(path)?,
            None => GlobalConfig::default(),
        };

        let repo_path = git_dir
            .map(Self::repo_config_path)
            .filter(|path| path.exists());
        let repo = repo_path
            .as_deref()
            .map(read_toml::<RepoConfig>)
            .transpose()?;

        // Validate loaded configs
        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(Config {
            global,
            repo,
            global_path: global_path.map(Path::to_path_buf),
            repo_path,
        })
    }

    /// Get the path for repo config.
    ///
    /// Returns `<git_dir>/gg/config.toml`.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("gg").join("config.toml")
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Get the fallback remote name.
    ///
    /// Defaults to "origin" if not configured.
    pub fn default_remote(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.remote.as_deref())
            .or(self.global.default_remote.as_deref())
            .unwrap_or(DEFAULT_REMOTE)
    }

    /// Check if differing tags are overwritten by default.
    ///
    /// Defaults to `false` if not configured.
    pub fn force_tags(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.force_tags)
            .or(self.global.force_tags)
            .unwrap_or(false)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

/// Global config locations in search order.
fn global_candidates(
    env_path: Option<String>,
    xdg_home: Option<String>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = env_path.filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(path));
    }
    if let Some(xdg) = xdg_home.filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(xdg).join("gg/config.toml"));
    }
    if let Some(home) = home {
        candidates.push(home.join(".gg/config.toml"));
    }
    candidates
}

/// Read and parse a config file.
fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
