//! Application configuration
//!
//! Configuration loaded from a `.gh-pick-tracker.toml` file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration loaded from `.gh-pick-tracker.toml`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// GitHub Enterprise host (None = github.com)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Branch the tracked pull requests are merged into
    #[serde(default = "default_source_branch")]
    pub source_branch: String,

    /// Override for the tracked-state file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// How far back the first discovery looks when no fetch has run yet
    #[serde(default = "default_initial_lookback_days")]
    pub initial_lookback_days: i64,
}

fn default_source_branch() -> String {
    "main".to_string()
}

fn default_initial_lookback_days() -> i64 {
    30
}

impl AppConfig {
    /// Create a config for `owner/repo` with defaults for everything else
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            host: None,
            source_branch: default_source_branch(),
            state_file: None,
            initial_lookback_days: default_initial_lookback_days(),
        }
    }

    /// Create a config from an `owner/name` repository spec
    pub fn from_repository_spec(spec: &str) -> Result<Self> {
        let (owner, repo) = parse_repository_spec(spec)?;
        Ok(Self::new(owner, repo))
    }

    /// Parse a config from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Load the config
    ///
    /// An explicit `path` must exist and parse. Without one, the standard
    /// locations are searched and `Ok(None)` is returned if none exists.
    pub fn load(path: Option<&Path>) -> Result<Option<Self>> {
        let content = match path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?,
            ),
            None => crate::load_config_file(),
        };

        match content {
            Some(content) => {
                let config = Self::from_toml(&content)?;
                log::info!("Loaded app config for {}", config.repository());
                Ok(Some(config))
            }
            None => {
                log::debug!("No config file found");
                Ok(None)
            }
        }
    }

    /// Replace owner and repo from an `owner/name` spec
    pub fn set_repository(&mut self, spec: &str) -> Result<()> {
        let (owner, repo) = parse_repository_spec(spec)?;
        self.owner = owner;
        self.repo = repo;
        Ok(())
    }

    /// `owner/repo`
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Location of the tracked-state file
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => crate::paths::state_path(),
        }
    }
}

fn parse_repository_spec(spec: &str) -> Result<(String, String)> {
    match spec.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("Invalid repository '{}', expected OWNER/NAME", spec),
    }
}
