//! Installed-skill registry backed by `repo/skills.json`.
//!
//! The file maps skill ID to `{commitId?, type, path?}`. It is re-read on
//! every operation and rewritten on every mutation; there is no cache.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a skill came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    Github,
    Local,
    Registry,
}

impl SkillSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillSource::Github => "github",
            SkillSource::Local => "local",
            SkillSource::Registry => "registry",
        }
    }

    /// Build a skill ID: `<source>:<locator>`.
    pub fn skill_id(&self, locator: &str) -> String {
        format!("{}:{}", self.as_str(), locator)
    }
}

impl fmt::Display for SkillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub id: String,
    pub source: SkillSource,
    pub commit_id: Option<String>,
    /// Subdirectory inside the source repository.
    pub path: Option<String>,
}

impl Skill {
    /// First seven characters of the commit id.
    pub fn short_commit(&self) -> Option<&str> {
        self.commit_id.as_deref().map(short_id)
    }
}

/// First seven characters of a commit id, cut on a char boundary.
pub fn short_id(commit: &str) -> &str {
    match commit.char_indices().nth(7) {
        Some((end, _)) => &commit[..end],
        None => commit,
    }
}

/// Stored form; the ID is the map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSkill {
    #[serde(rename = "commitId", default, skip_serializing_if = "Option::is_none")]
    commit_id: Option<String>,
    #[serde(rename = "type")]
    source: SkillSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

pub struct SkillRegistry {
    versions_file: PathBuf,
}

impl SkillRegistry {
    /// Registry stored as `skills.json` inside `repo_dir`.
    pub fn new(repo_dir: &Path) -> Self {
        Self {
            versions_file: repo_dir.join("skills.json"),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, StoredSkill>> {
        if !self.versions_file.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.versions_file)
            .with_context(|| format!("Failed to read {}", self.versions_file.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.versions_file.display()))
    }

    fn save(&self, skills: &BTreeMap<String, StoredSkill>) -> Result<()> {
        if let Some(parent) = self.versions_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(skills)?;
        fs::write(&self.versions_file, content)
            .with_context(|| format!("Failed to write {}", self.versions_file.display()))?;
        Ok(())
    }

    /// Insert or overwrite a skill. Empty commit ids and paths are not stored.
    pub fn add(
        &self,
        id: &str,
        source: SkillSource,
        commit_id: Option<&str>,
        path: Option<&str>,
    ) -> Result<()> {
        let mut skills = self.load()?;
        skills.insert(
            id.to_string(),
            StoredSkill {
                commit_id: commit_id.filter(|c| !c.is_empty()).map(str::to_string),
                source,
                path: path.filter(|p| !p.is_empty()).map(str::to_string),
            },
        );
        tracing::debug!(id, %source, "registry add");
        self.save(&skills)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let mut skills = self.load()?;
        if skills.remove(id).is_some() {
            tracing::debug!(id, "registry remove");
            self.save(&skills)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Skill>> {
        Ok(self
            .load()?
            .remove(id)
            .map(|stored| to_skill(id.to_string(), stored)))
    }

    /// Update the commit id of an existing skill; no-op if absent.
    pub fn update_version(&self, id: &str, commit_id: &str) -> Result<()> {
        let mut skills = self.load()?;
        if let Some(stored) = skills.get_mut(id) {
            stored.commit_id = Some(commit_id.to_string()).filter(|c| !c.is_empty());
            tracing::debug!(id, commit_id, "registry update version");
            self.save(&skills)?;
        }
        Ok(())
    }

    /// All registered skills, sorted by ID.
    pub fn list(&self) -> Result<Vec<Skill>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|(id, stored)| to_skill(id, stored))
            .collect())
    }
}

fn to_skill(id: String, stored: StoredSkill) -> Skill {
    Skill {
        id,
        source: stored.source,
        commit_id: stored.commit_id,
        path: stored.path,
    }
}
