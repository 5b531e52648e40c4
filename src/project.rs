//! Detect AI tool skill directories in a project.

use std::path::{Path, PathBuf};

use crate::config::AiToolConfig;

/// Built-in AI tools: `(type, candidate skill dirs)`, tried in order.
const DEFAULT_AI_TOOLS: &[(&str, &[&str])] = &[
    (
        "antigravity",
        &[".gemini/antigravity/global_skills/skills", ".agent/skills"],
    ),
    ("github", &[".copilot/skills", ".github/skills"]),
    ("cursor", &[".cursor/skills"]),
    ("claude", &[".claude/skills"]),
    ("codex", &[".codex/skills", ".agents/skills"]),
];

pub fn default_ai_tools() -> Vec<AiToolConfig> {
    DEFAULT_AI_TOOLS
        .iter()
        .map(|(tool_type, dirs)| AiToolConfig {
            tool_type: tool_type.to_string(),
            skill_dirs: dirs.iter().map(|d| d.to_string()).collect(),
        })
        .collect()
}

/// A detected tool in a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub tool_type: String,
    pub root: PathBuf,
    pub skill_dir: PathBuf,
}

pub struct ProjectDetector {
    cwd: PathBuf,
    ai_tools: Vec<AiToolConfig>,
}

impl ProjectDetector {
    /// Detector for `cwd`; `ai_tools` of `None` selects the built-in list.
    pub fn new(cwd: &Path, ai_tools: Option<Vec<AiToolConfig>>) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            ai_tools: ai_tools.unwrap_or_else(default_ai_tools),
        }
    }

    /// Every tool with a candidate skill dir whose parent exists. The skill
    /// dir itself may not exist yet. At most one entry per tool.
    pub fn detect_all(&self) -> Vec<ProjectInfo> {
        self.ai_tools
            .iter()
            .filter_map(|tool| {
                tool.skill_dirs
                    .iter()
                    .map(|dir| self.cwd.join(dir))
                    .find(|full| full.parent().map(Path::is_dir).unwrap_or(false))
                    .map(|skill_dir| ProjectInfo {
                        tool_type: tool.tool_type.clone(),
                        root: self.cwd.clone(),
                        skill_dir,
                    })
            })
            .collect()
    }
}
