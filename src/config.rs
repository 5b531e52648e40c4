//! agm home directory, configuration file and skill identifier encoding.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.agent-management/
//! ├── config.json           # System, registry URL, AI tool overrides
//! ├── registry/             # Clone of the team registry repo
//! └── repo/
//!     ├── skills.json       # Installed skills + versions
//!     └── github__user__repo__skill/
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// An AI tool type and the candidate skill directories it may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiToolConfig {
    #[serde(rename = "type")]
    pub tool_type: String,
    #[serde(rename = "skillDirs")]
    pub skill_dirs: Vec<String>,
}

/// Contents of config.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(rename = "aiTools", default, skip_serializing_if = "Option::is_none")]
    pub ai_tools: Option<Vec<AiToolConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system: std::env::consts::OS.to_string(),
            registry: None,
            ai_tools: None,
        }
    }
}

/// Paths of the agm home directory.
///
/// Constructed once at startup with [`AgmHome::init`] and handed to every
/// component that needs to touch the local repository.
#[derive(Debug, Clone)]
pub struct AgmHome {
    home_dir: PathBuf,
    repo_dir: PathBuf,
    config_file: PathBuf,
}

impl AgmHome {
    /// Default location: `~/.agent-management`.
    pub fn default_location() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".agent-management"))
    }

    /// Create the directory layout under `root` and write a default
    /// config.json if none exists yet.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let home_dir = root.into();
        let repo_dir = home_dir.join("repo");
        let config_file = home_dir.join("config.json");

        fs::create_dir_all(&repo_dir)
            .with_context(|| format!("Cannot create directory {}", repo_dir.display()))?;

        let home = Self {
            home_dir,
            repo_dir,
            config_file,
        };

        if !home.config_file.exists() {
            tracing::debug!(path = %home.config_file.display(), "writing default config");
            home.save_config(&Config::default())?;
        }

        Ok(home)
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// The global skill repository directory.
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Where the team registry repository is cloned.
    pub fn registry_dir(&self) -> PathBuf {
        self.home_dir.join("registry")
    }

    /// On-disk location of a skill's copy in the local repository.
    pub fn repo_path(&self, id: &str) -> PathBuf {
        self.repo_dir.join(safe_name(id))
    }

    /// Read config.json.
    pub fn load_config(&self) -> Result<Config> {
        let content = fs::read_to_string(&self.config_file)
            .with_context(|| format!("Failed to read {}", self.config_file.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.config_file.display()))
    }

    fn save_config(&self, config: &Config) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content)
            .with_context(|| format!("Failed to write {}", self.config_file.display()))?;
        Ok(())
    }

    /// Configured registry URL, if any.
    pub fn registry_url(&self) -> Option<String> {
        self.load_config()
            .ok()
            .and_then(|c| c.registry)
            .filter(|url| !url.trim().is_empty())
    }

    /// Persist the registry URL, keeping the rest of the config.
    pub fn set_registry_url(&self, url: &str) -> Result<()> {
        let mut config = self.load_config().unwrap_or_default();
        config.registry = Some(url.to_string());
        self.save_config(&config)
    }

    /// User-configured AI tools, or `None` when the built-in list applies.
    pub fn ai_tools(&self) -> Option<Vec<AiToolConfig>> {
        self.load_config()
            .ok()
            .and_then(|c| c.ai_tools)
            .filter(|tools| !tools.is_empty())
    }
}

/// Convert a skill ID to a filesystem-safe directory name.
///
/// `github:user/repo/path` becomes `github__user__repo__path`.
pub fn safe_name(id: &str) -> String {
    match id.split_once(':') {
        Some((source, rest)) => format!("{}__{}", source, rest.replace('/', "__")),
        None => id.replace('/', "__"),
    }
}

/// Inverse of [`safe_name`].
#[cfg(test)]
pub fn parse_safe_name(safe: &str) -> String {
    match safe.split_once("__") {
        Some((source, rest)) => format!("{}:{}", source, rest.replace("__", "/")),
        None => safe.to_string(),
    }
}

/// Name used for a skill's link inside a project skill directory: the last
/// path segment of the locator.
pub fn link_name(id: &str) -> &str {
    let locator = id.split_once(':').map(|(_, rest)| rest).unwrap_or(id);
    locator.rsplit('/').next().unwrap_or(locator)
}
