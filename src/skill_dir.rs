//! Skill directory helpers: manifest scanning, front matter, copying.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File that marks a directory as a skill.
pub const MANIFEST_FILE: &str = "SKILL.md";

/// The subset of SKILL.md front matter shown in selection lists.
#[derive(Debug, Default, Deserialize)]
pub struct SkillFrontMatter {
    #[serde(default)]
    pub description: Option<String>,
}

/// Whether `dir` contains a SKILL.md file.
pub fn has_manifest(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file()
}

/// Direct, non-hidden subdirectories of `root` that contain SKILL.md,
/// sorted by name. Only one level deep.
pub fn scan_skill_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(root)
        .with_context(|| format!("Error reading directory {}", root.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');

        if !hidden && path.is_dir() && has_manifest(&path) {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

/// Final path component as a string.
pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Split YAML front matter (between leading `---` lines) from the body.
fn extract_yaml_frontmatter(content: &str) -> Option<&str> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

/// Parse the front matter of `dir/SKILL.md`, if it has any.
pub fn read_front_matter(dir: &Path) -> Option<SkillFrontMatter> {
    let content = fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
    let yaml = extract_yaml_frontmatter(&content)?;
    serde_yaml::from_str(yaml).ok()
}

/// One-line description from the skill's front matter.
pub fn read_description(dir: &Path) -> Option<String> {
    read_front_matter(dir)?
        .description
        .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|d| !d.is_empty())
}

/// Copy directory contents recursively.
///
/// Symlinks are recreated as links rather than followed. A failed copy
/// removes `dst` so no partial tree is left behind.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let result = copy_tree(src, dst);
    if result.is_err() {
        if let Err(e) = remove_dir_if_exists(dst) {
            tracing::warn!(path = %dst.display(), error = %e, "could not clean up partial copy");
        }
    }
    result
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

    for entry in fs::read_dir(src).with_context(|| format!("Failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            copy_link(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("Failed to copy {}", src_path.display()))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src).with_context(|| format!("Failed to read link {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("Failed to link {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_link(src: &Path, _dst: &Path) -> Result<()> {
    tracing::debug!(path = %src.display(), "skipping symlink");
    Ok(())
}

/// Remove a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Expand `~` and make a user-entered path absolute.
pub fn resolve_path(input: &str) -> Result<PathBuf> {
    let expanded = shellexpand::tilde(input.trim());
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Cannot resolve current directory")?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_skill_dirs_one_level() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(&root.join("skill-a").join("SKILL.md"), "a");
        write(&root.join("skill-b").join("nested").join("SKILL.md"), "nested");
        write(&root.join(".hidden-skill").join("SKILL.md"), "hidden");
        write(&root.join("README.md"), "not a dir");

        let found: Vec<String> = scan_skill_dirs(root)
            .unwrap()
            .iter()
            .map(|p| dir_name(p))
            .collect();
        assert_eq!(found, vec!["skill-a"]);
    }

    #[test]
    fn test_scan_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_skill_dirs(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn test_copy_dir_copies_nested_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write(&src.join("SKILL.md"), "root");
        write(&src.join("nested").join("notes.txt"), "nested-content");

        copy_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("SKILL.md")).unwrap(), "root");
        assert_eq!(
            fs::read_to_string(dst.join("nested").join("notes.txt")).unwrap(),
            "nested-content"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_keeps_symlinks_as_links() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("skill");
        let dst = tmp.path().join("out");
        write(&src.join("SKILL.md"), "root");
        std::os::unix::fs::symlink("..", src.join("up")).unwrap();
        std::os::unix::fs::symlink("SKILL.md", src.join("alias.md")).unwrap();

        copy_dir(&src, &dst).unwrap();

        let up = dst.join("up");
        assert!(fs::symlink_metadata(&up).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&up).unwrap(), Path::new(".."));
        assert_eq!(fs::read_to_string(dst.join("alias.md")).unwrap(), "root");
        assert_eq!(fs::read_dir(&dst).unwrap().count(), 3);
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_tree() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("out");

        assert!(copy_dir(&tmp.path().join("missing"), &dst).is_err());
        assert!(!dst.exists());
    }

    #[test]
    fn test_read_description_from_front_matter() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp.path().join("SKILL.md"),
            "---\nname: tester\ndescription: >\n  Runs the test\n  suite\n---\n\n# Tester\n",
        );
        assert_eq!(
            read_description(tmp.path()).as_deref(),
            Some("Runs the test suite")
        );
        assert!(read_front_matter(tmp.path()).is_some());
    }

    #[test]
    fn test_read_description_without_front_matter() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("SKILL.md"), "# Just markdown\n");
        assert!(read_description(tmp.path()).is_none());
    }

    #[test]
    fn test_remove_dir_if_exists_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gone");
        write(&dir.join("file"), "x");
        remove_dir_if_exists(&dir).unwrap();
        assert!(!dir.exists());
        remove_dir_if_exists(&dir).unwrap();
    }

    #[test]
    fn test_resolve_path_makes_absolute() {
        let resolved = resolve_path("some/relative").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("some/relative"));
    }
}
