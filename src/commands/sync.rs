//! Sync the local repository with the team registry repo.
//!
//! The registry is cloned into `~/.agent-management/registry` (pulled on
//! later runs). Every direct subdirectory holding a SKILL.md becomes a
//! `registry:<name>` skill copied into the local repository. Registry
//! skills that disappear upstream are removed, along with their links.

use anyhow::{Context as _, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::Context;
use crate::config::link_name;
use crate::git::normalize_url;
use crate::project::ProjectInfo;
use crate::registry::{Skill, SkillSource};
use crate::skill_dir::{copy_dir, dir_name, remove_dir_if_exists, scan_skill_dirs};
use crate::tui::{style, Prompter};

/// How sync interacts with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// From the menu: may ask for the registry URL and confirm replacements.
    Interactive,
    /// `--sync`: never prompts.
    Unattended,
}

/// A skill found in the registry checkout.
#[derive(Debug, Clone)]
pub struct UpstreamSkill {
    pub name: String,
    pub dir: PathBuf,
    /// Last commit touching the skill's directory.
    pub commit_id: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Differently-sourced skills replaced by a registry skill.
    pub replaced: usize,
    /// Links removed while replacing those skills.
    pub replaced_links: usize,
    /// Registry skills skipped because the user kept the existing source.
    pub skipped: usize,
    pub removed: usize,
    /// Links removed for skills no longer in the registry.
    pub link_cleanup: usize,
}

pub fn run(ctx: &Context, prompter: &mut dyn Prompter, mode: SyncMode) -> Result<()> {
    sync_registry(ctx, prompter, mode).map(|_| ())
}

/// Returns `None` when nothing was applied: no registry URL, or no skills
/// in the checkout.
fn sync_registry(
    ctx: &Context,
    prompter: &mut dyn Prompter,
    mode: SyncMode,
) -> Result<Option<SyncReport>> {
    let registry_url = match ctx.home.registry_url() {
        Some(url) => url,
        None => match mode {
            SyncMode::Unattended => {
                println!(
                    "{}",
                    style::error("No registry configured. Run agm and choose 'Set up registry' first.")
                );
                return Ok(None);
            }
            SyncMode::Interactive => match ask_registry_url(ctx, prompter)? {
                Some(url) => url,
                None => return Ok(None),
            },
        },
    };

    ctx.git.check_version()?;

    let info = normalize_url(&registry_url);
    let registry_dir = ctx.home.registry_dir();

    if registry_dir.join(".git").exists() {
        println!("{}", style::info("Pulling latest changes..."));
        ctx.git
            .pull(&registry_dir)
            .context("Failed to pull registry")?;
    } else {
        println!("{}", style::info("Cloning registry..."));
        remove_dir_if_exists(&registry_dir)?;
        ctx.git
            .clone_full(&info.url, &registry_dir, info.branch.as_deref())
            .context("Failed to clone registry")?;
    }

    let scan_root = match info.path.as_deref() {
        Some(sub) => registry_dir.join(sub),
        None => registry_dir.clone(),
    };
    let upstream = collect_upstream(ctx, &registry_dir, &scan_root)?;
    if upstream.is_empty() {
        println!(
            "{}",
            style::warning("No skills found in registry (no SKILL.md files).")
        );
        return Ok(None);
    }

    let projects = ctx.detect_projects();
    let report = match mode {
        SyncMode::Interactive => apply_upstream(ctx, &upstream, &projects, |name, existing| {
            confirm_replace(&mut *prompter, name, existing)
        })?,
        SyncMode::Unattended => apply_upstream(ctx, &upstream, &projects, |_, _| Ok(true))?,
    };

    print_report(&report);
    Ok(Some(report))
}

fn ask_registry_url(ctx: &Context, prompter: &mut dyn Prompter) -> Result<Option<String>> {
    let Some(input) = prompter.input(
        "Registry URL",
        "GitHub repo containing your team's skills",
        "https://github.com/org/skills",
    )?
    else {
        return Ok(None);
    };

    let url = input.trim();
    if url.is_empty() {
        return Ok(None);
    }

    ctx.home
        .set_registry_url(url)
        .context("Failed to save registry URL")?;
    println!("{}", style::success(&format!("Registry saved: {}", url)));
    Ok(Some(url.to_string()))
}

fn confirm_replace(prompter: &mut dyn Prompter, name: &str, existing: &[Skill]) -> Result<bool> {
    let ids: Vec<&str> = existing.iter().map(|s| s.id.as_str()).collect();
    let title = format!(
        "{} is already installed as {}. Replace with the registry version?",
        name,
        ids.join(", ")
    );
    Ok(prompter.confirm(&title)?.unwrap_or(false))
}

/// Skills in `scan_root` with the commit that last touched each of them.
/// A missing `scan_root` yields no skills.
fn collect_upstream(ctx: &Context, registry_dir: &Path, scan_root: &Path) -> Result<Vec<UpstreamSkill>> {
    if !scan_root.is_dir() {
        tracing::debug!(path = %scan_root.display(), "registry path not found");
        return Ok(Vec::new());
    }
    let dirs = scan_skill_dirs(scan_root)?;

    Ok(dirs
        .into_iter()
        .map(|dir| {
            let rel = dir
                .strip_prefix(registry_dir)
                .unwrap_or(dir.as_path())
                .to_string_lossy()
                .replace('\\', "/");
            let commit_id = ctx.git.path_commit_id(registry_dir, &rel).unwrap_or_else(|e| {
                tracing::warn!(path = %rel, error = %e, "could not read commit for registry skill");
                String::new()
            });
            UpstreamSkill {
                name: dir_name(&dir),
                dir,
                commit_id,
            }
        })
        .collect())
}

/// Bring the local repository in line with `upstream`.
///
/// `approve` is asked before a differently-sourced skill with the same link
/// name is replaced; returning `false` skips that registry skill.
pub fn apply_upstream<F>(
    ctx: &Context,
    upstream: &[UpstreamSkill],
    projects: &[ProjectInfo],
    mut approve: F,
) -> Result<SyncReport>
where
    F: FnMut(&str, &[Skill]) -> Result<bool>,
{
    let mut report = SyncReport::default();

    'skills: for skill in upstream {
        let id = SkillSource::Registry.skill_id(&skill.name);

        let duplicates: Vec<Skill> = ctx
            .registry
            .list()?
            .into_iter()
            .filter(|s| s.id != id && link_name(&s.id) == skill.name)
            .collect();

        if !duplicates.is_empty() {
            if !approve(&skill.name, &duplicates)? {
                println!(
                    "{}",
                    style::muted(&format!("  = {} (kept existing source)", skill.name))
                );
                report.skipped += 1;
                continue;
            }
            for dup in &duplicates {
                if let Err(e) = remove_dir_if_exists(&ctx.home.repo_path(&dup.id)) {
                    tracing::warn!(id = %dup.id, error = %e, "could not remove replaced skill");
                    println!(
                        "{}",
                        style::error(&format!("Failed to replace {}: {:#}", dup.id, e))
                    );
                    continue 'skills;
                }
                report.replaced_links += ctx.unlink_everywhere(&dup.id, projects);
                ctx.registry.remove(&dup.id)?;
                report.replaced += 1;
                println!(
                    "{}",
                    style::warning(&format!("  ~ {}: replaced {} with registry", skill.name, dup.id))
                );
            }
        }

        let existing = ctx.registry.get(&id)?;
        let dest = ctx.home.repo_path(&id);

        if let Err(e) = refresh_copy(&skill.dir, &dest) {
            tracing::warn!(%id, error = %e, "skipping registry skill");
            println!(
                "{}",
                style::error(&format!("Failed to copy {}: {:#}", skill.name, e))
            );
            continue;
        }

        ctx.registry
            .add(&id, SkillSource::Registry, Some(&skill.commit_id), None)?;

        match existing {
            None => {
                println!("{}", style::success(&format!("  + {} (new)", skill.name)));
                report.added += 1;
            }
            Some(prev) if prev.commit_id.as_deref().unwrap_or("") != skill.commit_id => {
                println!("{}", style::success(&format!("  ↑ {} (updated)", skill.name)));
                report.updated += 1;
            }
            Some(_) => report.unchanged += 1,
        }
    }

    let upstream_ids: BTreeSet<String> = upstream
        .iter()
        .map(|s| SkillSource::Registry.skill_id(&s.name))
        .collect();

    for stale in ctx
        .registry
        .list()?
        .into_iter()
        .filter(|s| s.source == SkillSource::Registry && !upstream_ids.contains(&s.id))
    {
        if let Err(e) = remove_dir_if_exists(&ctx.home.repo_path(&stale.id)) {
            tracing::warn!(id = %stale.id, error = %e, "could not remove stale skill");
            println!(
                "{}",
                style::error(&format!("Failed to remove {}: {:#}", stale.id, e))
            );
            continue;
        }
        report.link_cleanup += ctx.unlink_everywhere(&stale.id, projects);
        ctx.registry.remove(&stale.id)?;
        report.removed += 1;
        println!(
            "{}",
            style::warning(&format!(
                "  - {} (removed from registry)",
                link_name(&stale.id)
            ))
        );
    }

    Ok(report)
}

fn refresh_copy(src: &Path, dest: &Path) -> Result<()> {
    remove_dir_if_exists(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_dir(src, dest)
}

fn print_report(report: &SyncReport) {
    println!();
    println!(
        "{}",
        style::success(&format!(
            "Sync complete: {} new, {} updated, {} unchanged",
            report.added, report.updated, report.unchanged
        ))
    );

    if report.replaced > 0 {
        println!(
            "{}",
            style::info(&format!(
                "{} duplicate source skill(s) replaced by registry",
                report.replaced
            ))
        );
        if report.replaced_links > 0 {
            println!(
                "{}",
                style::info(&format!(
                    "{} linked skill entry(s) removed for replaced sources",
                    report.replaced_links
                ))
            );
        }
    }
    if report.skipped > 0 {
        println!(
            "{}",
            style::info(&format!(
                "{} registry skill(s) skipped to keep existing sources",
                report.skipped
            ))
        );
    }
    if report.removed > 0 {
        println!(
            "{}",
            style::info(&format!(
                "{} skill(s) removed (no longer in registry)",
                report.removed
            ))
        );
        if report.link_cleanup > 0 {
            println!(
                "{}",
                style::info(&format!(
                    "{} linked skill entry(s) removed from detected project tools",
                    report.link_cleanup
                ))
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, write_skill};
    use tempfile::TempDir;

    fn upstream(root: &Path, skills: &[(&str, &str)]) -> Vec<UpstreamSkill> {
        skills
            .iter()
            .map(|(name, commit)| {
                let dir = root.join(name);
                if !dir.exists() {
                    write_skill(&dir, name);
                }
                UpstreamSkill {
                    name: name.to_string(),
                    dir,
                    commit_id: commit.to_string(),
                }
            })
            .collect()
    }

    fn approve_all(_: &str, _: &[Skill]) -> Result<bool> {
        Ok(true)
    }

    #[test]
    fn test_first_sync_adds_and_second_is_idempotent() {
        let (_tmp, ctx) = context();
        let upstream_root = TempDir::new().unwrap();
        let skills = upstream(upstream_root.path(), &[("alpha", "c1"), ("beta", "c2")]);

        let first = apply_upstream(&ctx, &skills, &[], approve_all).unwrap();
        assert_eq!(first.added, 2);
        assert!(ctx.home.repo_path("registry:alpha").join("SKILL.md").is_file());

        let stored = ctx.registry.get("registry:beta").unwrap().unwrap();
        assert_eq!(stored.source, SkillSource::Registry);
        assert_eq!(stored.commit_id.as_deref(), Some("c2"));
        assert_eq!(stored.path, None);

        let second = apply_upstream(&ctx, &skills, &[], approve_all).unwrap();
        assert_eq!(
            second,
            SyncReport {
                unchanged: 2,
                ..SyncReport::default()
            }
        );
    }

    #[test]
    fn test_changed_commit_counts_as_update_and_refreshes_copy() {
        let (_tmp, ctx) = context();
        let upstream_root = TempDir::new().unwrap();
        let skills = upstream(upstream_root.path(), &[("alpha", "c1")]);
        apply_upstream(&ctx, &skills, &[], approve_all).unwrap();

        fs::write(upstream_root.path().join("alpha/extra.md"), "new file").unwrap();
        let skills = upstream(upstream_root.path(), &[("alpha", "c9")]);
        let report = apply_upstream(&ctx, &skills, &[], approve_all).unwrap();

        assert_eq!(report.updated, 1);
        assert!(ctx.home.repo_path("registry:alpha").join("extra.md").is_file());
        assert_eq!(
            ctx.registry.get("registry:alpha").unwrap().unwrap().commit_id.as_deref(),
            Some("c9")
        );
    }

    #[test]
    fn test_skill_gone_upstream_is_removed_with_links() {
        let (_tmp, ctx) = context();
        let upstream_root = TempDir::new().unwrap();
        apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("alpha", "c1"), ("beta", "c2")]),
            &[],
            approve_all,
        )
        .unwrap();

        let skill_dir = ctx.cwd.join(".claude/skills");
        fs::create_dir_all(&skill_dir).unwrap();
        fs::write(skill_dir.join("beta"), "placeholder").unwrap();
        let projects = ctx.detect_projects();

        let report = apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("alpha", "c1")]),
            &projects,
            approve_all,
        )
        .unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.link_cleanup, 1);
        assert!(ctx.registry.get("registry:beta").unwrap().is_none());
        assert!(!ctx.home.repo_path("registry:beta").exists());
        assert!(!skill_dir.join("beta").exists());
    }

    #[test]
    fn test_registry_replaces_same_named_skill() {
        let (_tmp, ctx) = context();
        let github_id = "github:user/repo/team-skill";
        write_skill(&ctx.home.repo_path(github_id), "from github");
        ctx.registry
            .add(github_id, SkillSource::Github, Some("abc"), Some("team-skill"))
            .unwrap();
        ctx.registry
            .add("local:unrelated", SkillSource::Local, None, None)
            .unwrap();

        let skill_dir = ctx.cwd.join(".cursor/skills");
        fs::create_dir_all(&skill_dir).unwrap();
        fs::write(skill_dir.join("team-skill"), "placeholder").unwrap();
        let projects = ctx.detect_projects();

        let upstream_root = TempDir::new().unwrap();
        let mut asked = Vec::new();
        let report = apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("team-skill", "c1")]),
            &projects,
            |name, existing| {
                asked.push((name.to_string(), existing.len()));
                Ok(true)
            },
        )
        .unwrap();

        assert_eq!(asked, vec![("team-skill".to_string(), 1)]);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.replaced_links, 1);
        assert_eq!(report.added, 1);
        assert!(ctx.registry.get(github_id).unwrap().is_none());
        assert!(!ctx.home.repo_path(github_id).exists());
        assert!(ctx.registry.get("registry:team-skill").unwrap().is_some());
        assert!(ctx.registry.get("local:unrelated").unwrap().is_some());
    }

    #[test]
    fn test_declined_replacement_keeps_existing_source() {
        let (_tmp, ctx) = context();
        ctx.registry
            .add("local:team-skill", SkillSource::Local, None, None)
            .unwrap();
        write_skill(&ctx.home.repo_path("local:team-skill"), "mine");

        let upstream_root = TempDir::new().unwrap();
        let report = apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("team-skill", "c1")]),
            &[],
            |_, _| Ok(false),
        )
        .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.added, 0);
        assert!(ctx.registry.get("local:team-skill").unwrap().is_some());
        assert!(ctx.registry.get("registry:team-skill").unwrap().is_none());
        assert!(ctx.home.repo_path("local:team-skill").is_dir());
    }

    #[test]
    fn test_non_registry_skills_survive_removal_pass() {
        let (_tmp, ctx) = context();
        ctx.registry
            .add("github:user/repo", SkillSource::Github, Some("abc"), None)
            .unwrap();

        let upstream_root = TempDir::new().unwrap();
        let report = apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("alpha", "c1")]),
            &[],
            approve_all,
        )
        .unwrap();

        assert_eq!(report.removed, 0);
        assert!(ctx.registry.get("github:user/repo").unwrap().is_some());
    }

    #[test]
    fn test_unattended_without_registry_does_nothing() {
        let (_tmp, ctx) = context();
        let mut prompter = crate::tui::testing::ScriptedPrompter::default();
        run(&ctx, &mut prompter, SyncMode::Unattended).unwrap();
        assert!(prompter.asked.is_empty());
        assert!(!ctx.home.registry_dir().exists());
    }

    #[test]
    fn test_interactive_cancelled_url_prompt() {
        let (_tmp, ctx) = context();
        let mut prompter = crate::tui::testing::ScriptedPrompter::new([
            crate::tui::testing::Answer::Input("   ".to_string()),
        ]);
        run(&ctx, &mut prompter, SyncMode::Interactive).unwrap();
        assert_eq!(prompter.asked, vec!["Registry URL".to_string()]);
        assert!(ctx.home.registry_url().is_none());
    }

    #[test]
    fn test_stale_skill_that_cannot_be_removed_does_not_abort() {
        let (_tmp, ctx) = context();
        let upstream_root = TempDir::new().unwrap();
        ctx.registry
            .add("registry:beta", SkillSource::Registry, Some("c2"), None)
            .unwrap();
        ctx.registry
            .add("registry:gamma", SkillSource::Registry, Some("c3"), None)
            .unwrap();
        // A plain file where the copy should be makes removal fail.
        fs::write(ctx.home.repo_path("registry:beta"), "not a dir").unwrap();
        write_skill(&ctx.home.repo_path("registry:gamma"), "gamma");

        let report = apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("alpha", "c1")]),
            &[],
            approve_all,
        )
        .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.removed, 1);
        assert!(ctx.registry.get("registry:beta").unwrap().is_some());
        assert!(ctx.registry.get("registry:gamma").unwrap().is_none());
        assert!(!ctx.home.repo_path("registry:gamma").exists());
    }

    #[test]
    fn test_duplicate_that_cannot_be_removed_skips_only_that_skill() {
        let (_tmp, ctx) = context();
        let github_id = "github:user/repo/team-skill";
        ctx.registry
            .add(github_id, SkillSource::Github, Some("abc"), Some("team-skill"))
            .unwrap();
        fs::write(ctx.home.repo_path(github_id), "not a dir").unwrap();

        let upstream_root = TempDir::new().unwrap();
        let report = apply_upstream(
            &ctx,
            &upstream(upstream_root.path(), &[("team-skill", "c1"), ("zeta", "c2")]),
            &[],
            approve_all,
        )
        .unwrap();

        assert_eq!(report.replaced, 0);
        assert_eq!(report.added, 1);
        assert!(ctx.registry.get(github_id).unwrap().is_some());
        assert!(ctx.registry.get("registry:team-skill").unwrap().is_none());
        assert!(ctx.registry.get("registry:zeta").unwrap().is_some());
    }

    #[test]
    fn test_missing_scan_root_finds_no_skills() {
        let (tmp, ctx) = context();
        let found = collect_upstream(&ctx, tmp.path(), &tmp.path().join("skills")).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_sync_from_git_registry() {
        let Some(origin) = crate::git::testing::Origin::new() else {
            return;
        };
        origin.write("alpha/SKILL.md", "alpha");
        origin.write("beta/SKILL.md", "beta");
        origin.write("docs/README.md", "not a skill");
        let first = origin.commit("initial skills");

        let (_tmp, ctx) = context();
        ctx.home.set_registry_url(&origin.url()).unwrap();
        let mut prompter = crate::tui::testing::ScriptedPrompter::default();

        let report = sync_registry(&ctx, &mut prompter, SyncMode::Unattended)
            .unwrap()
            .unwrap();
        assert_eq!(report.added, 2);
        assert!(ctx.home.registry_dir().join(".git").is_dir());
        assert!(ctx.home.repo_path("registry:alpha").join("SKILL.md").is_file());
        assert!(ctx.registry.get("registry:docs").unwrap().is_none());
        assert_eq!(
            ctx.registry.get("registry:alpha").unwrap().unwrap().commit_id.as_deref(),
            Some(first.as_str())
        );

        let again = sync_registry(&ctx, &mut prompter, SyncMode::Unattended)
            .unwrap()
            .unwrap();
        assert_eq!(
            again,
            SyncReport {
                unchanged: 2,
                ..SyncReport::default()
            }
        );

        origin.write("beta/SKILL.md", "beta v2");
        origin.remove("alpha");
        let second = origin.commit("update beta, drop alpha");

        let third = sync_registry(&ctx, &mut prompter, SyncMode::Unattended)
            .unwrap()
            .unwrap();
        assert_eq!(third.updated, 1);
        assert_eq!(third.removed, 1);
        assert!(ctx.registry.get("registry:alpha").unwrap().is_none());
        assert_eq!(
            fs::read_to_string(ctx.home.repo_path("registry:beta").join("SKILL.md")).unwrap(),
            "beta v2"
        );
        assert_eq!(
            ctx.registry.get("registry:beta").unwrap().unwrap().commit_id.as_deref(),
            Some(second.as_str())
        );
        assert!(prompter.asked.is_empty());
    }
}
