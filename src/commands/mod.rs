//! Interactive flows behind the main menu and the CLI flags.

pub mod import;
pub mod link;
pub mod manage;
pub mod show_config;
pub mod sync;

use std::path::PathBuf;

use crate::config::AgmHome;
use crate::git::Git;
use crate::links;
use crate::project::{ProjectDetector, ProjectInfo};
use crate::registry::SkillRegistry;

/// Everything a flow needs, built once in `main` and passed down.
pub struct Context {
    pub home: AgmHome,
    pub registry: SkillRegistry,
    pub git: Git,
    /// Directory scanned for AI tool folders.
    pub cwd: PathBuf,
}

impl Context {
    pub fn new(home: AgmHome, cwd: PathBuf) -> Self {
        let registry = SkillRegistry::new(home.repo_dir());
        Self {
            home,
            registry,
            git: Git::new(),
            cwd,
        }
    }

    /// AI tools present in the working directory.
    pub fn detect_projects(&self) -> Vec<ProjectInfo> {
        ProjectDetector::new(&self.cwd, self.home.ai_tools()).detect_all()
    }

    /// Remove a skill's link from each project. Returns how many were removed.
    pub fn unlink_everywhere(&self, id: &str, projects: &[ProjectInfo]) -> usize {
        projects
            .iter()
            .filter(|p| match links::remove_link(&p.skill_dir, id) {
                Ok(removed) => removed,
                Err(e) => {
                    tracing::warn!(id, tool = %p.tool_type, error = %e, "could not remove link");
                    false
                }
            })
            .count()
    }
}
