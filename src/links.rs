//! Reconcile skill links inside a project's tool skill directory.
//!
//! Links are symlinks on Unix and directory junctions on Windows. Presence is
//! always checked without following the link, so a dangling link still
//! counts as present.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{link_name, AgmHome};
use crate::registry::Skill;
use crate::skill_dir::has_manifest;

/// Path of a skill's link inside `skill_dir`.
pub fn link_path(skill_dir: &Path, id: &str) -> PathBuf {
    skill_dir.join(link_name(id))
}

/// What a skill's link points at: its repository copy, or the recorded
/// subdirectory inside it.
pub fn link_target(home: &AgmHome, skill: &Skill) -> PathBuf {
    let repo_path = home.repo_path(&skill.id);
    match skill.path.as_deref() {
        Some(sub) => repo_path.join(sub),
        None => repo_path,
    }
}

/// Anything at `path`, without following links.
fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

pub fn is_linked(skill_dir: &Path, id: &str) -> bool {
    entry_exists(&link_path(skill_dir, id))
}

/// IDs of `skills` that currently have an entry in `skill_dir`.
pub fn linked_skills(skills: &[Skill], skill_dir: &Path) -> BTreeSet<String> {
    skills
        .iter()
        .filter(|s| is_linked(skill_dir, &s.id))
        .map(|s| s.id.clone())
        .collect()
}

/// Link a skill into `skill_dir`. Returns `false` when something already
/// occupies the link name.
pub fn create_link(home: &AgmHome, skill: &Skill, skill_dir: &Path) -> Result<bool> {
    fs::create_dir_all(skill_dir)
        .with_context(|| format!("Failed to create {}", skill_dir.display()))?;

    let link = link_path(skill_dir, &skill.id);
    if entry_exists(&link) {
        return Ok(false);
    }

    let target = link_target(home, skill);
    make_link(&target, &link).with_context(|| format!("Failed to link {}", skill.id))?;
    tracing::debug!(link = %link.display(), target = %target.display(), "created link");
    Ok(true)
}

/// Remove a skill's link from `skill_dir`. Returns `false` if none existed.
pub fn remove_link(skill_dir: &Path, id: &str) -> Result<bool> {
    let link = link_path(skill_dir, id);
    if !entry_exists(&link) {
        return Ok(false);
    }
    remove_entry(&link).with_context(|| format!("Failed to unlink {}", id))?;
    tracing::debug!(link = %link.display(), "removed link");
    Ok(true)
}

/// Names of symlinks in `skill_dir` whose target no longer resolves.
pub fn find_broken_links(skill_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(skill_dir) else {
        return Vec::new();
    };

    let mut broken: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let path = entry.path();
            let is_link = fs::symlink_metadata(&path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            is_link && fs::metadata(&path).is_err()
        })
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    broken.sort();
    broken
}

/// Delete the named entries from `skill_dir`.
pub fn remove_entries(skill_dir: &Path, names: &[String]) -> Result<()> {
    for name in names {
        let path = skill_dir.join(name);
        remove_entry(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Real (non-link) skill directories in `skill_dir` that agm does not manage.
pub fn find_foreign_skills(skill_dir: &Path, skills: &[Skill]) -> Vec<String> {
    let Ok(entries) = fs::read_dir(skill_dir) else {
        return Vec::new();
    };

    let managed: BTreeSet<&str> = skills.iter().map(|s| link_name(&s.id)).collect();

    let mut foreign: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            fs::symlink_metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false)
        })
        .filter(|entry| has_manifest(&entry.path()))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !managed.contains(name.as_str()))
        .collect();
    foreign.sort();
    foreign
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_link(target: &Path, link: &Path) -> io::Result<()> {
    let output = std::process::Command::new("cmd")
        .args(["/c", "mklink", "/J"])
        .arg(link)
        .arg(target)
        .output()?;
    if output.status.success() {
        return Ok(());
    }
    let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if message.is_empty() {
        message = String::from_utf8_lossy(&output.stdout).trim().to_string();
    }
    Err(io::Error::new(io::ErrorKind::Other, message))
}

#[cfg(unix)]
fn remove_entry(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(windows)]
fn remove_entry(path: &Path) -> io::Result<()> {
    // junctions are directories
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::SkillSource;
    use tempfile::TempDir;

    fn skill(id: &str, path: Option<&str>) -> Skill {
        Skill {
            id: id.to_string(),
            source: SkillSource::Github,
            commit_id: None,
            path: path.map(str::to_string),
        }
    }

    fn setup() -> (TempDir, AgmHome, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let home = AgmHome::init(tmp.path().join("agm")).unwrap();
        let skill_dir = tmp.path().join("project/.claude/skills");
        (tmp, home, skill_dir)
    }

    #[test]
    fn test_create_link_points_at_subpath() {
        let (_tmp, home, skill_dir) = setup();
        let s = skill("github:user/repo/skills/tester", Some("skills/tester"));
        let target = home.repo_path(&s.id).join("skills/tester");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("SKILL.md"), "x").unwrap();

        assert!(create_link(&home, &s, &skill_dir).unwrap());
        let link = skill_dir.join("tester");
        assert_eq!(fs::read_link(&link).unwrap(), target);
        assert!(link.join("SKILL.md").is_file());

        // second call is a no-op
        assert!(!create_link(&home, &s, &skill_dir).unwrap());
        assert!(is_linked(&skill_dir, &s.id));
    }

    #[test]
    fn test_remove_link() {
        let (_tmp, home, skill_dir) = setup();
        let s = skill("local:figma-mcp", None);
        fs::create_dir_all(home.repo_path(&s.id)).unwrap();
        create_link(&home, &s, &skill_dir).unwrap();

        assert!(remove_link(&skill_dir, &s.id).unwrap());
        assert!(!is_linked(&skill_dir, &s.id));
        assert!(home.repo_path(&s.id).is_dir());
        assert!(!remove_link(&skill_dir, &s.id).unwrap());
    }

    #[test]
    fn test_remove_link_removes_plain_file() {
        let (_tmp, _home, skill_dir) = setup();
        fs::create_dir_all(&skill_dir).unwrap();
        fs::write(skill_dir.join("team-skill"), "placeholder").unwrap();

        assert!(remove_link(&skill_dir, "registry:team-skill").unwrap());
        assert!(!skill_dir.join("team-skill").exists());
    }

    #[test]
    fn test_broken_links_detected() {
        let (tmp, home, skill_dir) = setup();
        let s = skill("local:gone", None);
        create_link(&home, &s, &skill_dir).unwrap();

        let ok_target = tmp.path().join("ok");
        fs::create_dir_all(&ok_target).unwrap();
        std::os::unix::fs::symlink(&ok_target, skill_dir.join("fine")).unwrap();

        assert_eq!(find_broken_links(&skill_dir), vec!["gone".to_string()]);

        remove_entries(&skill_dir, &["gone".to_string()]).unwrap();
        assert!(find_broken_links(&skill_dir).is_empty());
        assert!(skill_dir.join("fine").exists());
    }

    #[test]
    fn test_foreign_skills_exclude_links_and_managed() {
        let (tmp, home, skill_dir) = setup();
        let managed = skill("local:managed", None);
        let managed_repo = home.repo_path(&managed.id);
        fs::create_dir_all(&managed_repo).unwrap();
        fs::write(managed_repo.join("SKILL.md"), "m").unwrap();
        create_link(&home, &managed, &skill_dir).unwrap();

        fs::create_dir_all(skill_dir.join("handmade")).unwrap();
        fs::write(skill_dir.join("handmade/SKILL.md"), "h").unwrap();
        fs::create_dir_all(skill_dir.join("no-manifest")).unwrap();

        let external = tmp.path().join("external");
        fs::create_dir_all(&external).unwrap();
        fs::write(external.join("SKILL.md"), "e").unwrap();
        std::os::unix::fs::symlink(&external, skill_dir.join("linked-elsewhere")).unwrap();

        assert_eq!(
            find_foreign_skills(&skill_dir, &[managed]),
            vec!["handmade".to_string()]
        );
    }

    #[test]
    fn test_linked_skills() {
        let (_tmp, home, skill_dir) = setup();
        let a = skill("local:a", None);
        let b = skill("local:b", None);
        fs::create_dir_all(home.repo_path(&a.id)).unwrap();
        create_link(&home, &a, &skill_dir).unwrap();

        let linked = linked_skills(&[a.clone(), b], &skill_dir);
        assert_eq!(linked.into_iter().collect::<Vec<_>>(), vec![a.id]);
    }

    #[test]
    fn test_scans_of_missing_dir_are_empty() {
        let (tmp, _home, _skill_dir) = setup();
        let missing = tmp.path().join("missing");
        assert!(find_broken_links(&missing).is_empty());
        assert!(find_foreign_skills(&missing, &[]).is_empty());
    }
}
