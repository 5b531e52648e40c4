//! Import skills into the local repository.
//!
//! Sources:
//! - the team registry (delegates to sync)
//! - a GitHub URL pointing at one skill, or at a folder of skills
//! - a local folder of skills, copied in as `local:<name>`
//!
//! After a successful import the user is offered to link the new skills
//! into the AI tools detected in the working directory.

use anyhow::{bail, Context as _, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::sync::{self, SyncMode};
use super::{link, Context};
use crate::git::{normalize_url, UrlInfo};
use crate::registry::SkillSource;
use crate::skill_dir::{copy_dir, dir_name, read_description, remove_dir_if_exists, resolve_path, scan_skill_dirs};
use crate::tui::{style, Prompter};

/// A skill found while scanning a folder, not yet imported.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    dir: PathBuf,
    id: String,
}

pub fn run(ctx: &Context, prompter: &mut dyn Prompter) -> Result<()> {
    let sync_label = if ctx.home.registry_url().is_some() {
        "Sync from registry"
    } else {
        "Set up registry"
    };
    let options = vec![
        sync_label.to_string(),
        "GitHub Repository".to_string(),
        "Local Folder".to_string(),
        "← Cancel".to_string(),
    ];

    let added = match prompter.select("Where are the skills?", &options)? {
        Some(0) => return sync::run(ctx, prompter, SyncMode::Interactive),
        Some(1) => import_github(ctx, prompter)?,
        Some(2) => import_folder(ctx, prompter)?,
        _ => return Ok(()),
    };

    if !added.is_empty() {
        offer_link(ctx, prompter, &added)?;
    }
    Ok(())
}

fn import_github(ctx: &Context, prompter: &mut dyn Prompter) -> Result<Vec<String>> {
    let Some(input) = prompter.input(
        "GitHub URL",
        "Repo or subdirectory URL",
        "https://github.com/user/repo/tree/main/skills/...",
    )?
    else {
        return Ok(Vec::new());
    };
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    ctx.git.check_version()?;

    let info = normalize_url(&input);
    let Some(repo) = info.github_repo() else {
        bail!("Only GitHub URLs are supported.");
    };

    let branch = match &info.branch {
        Some(branch) => branch.clone(),
        None => ctx.git.default_branch(&info.url),
    };
    tracing::debug!(url = %info.url, %branch, path = ?info.path, "importing from GitHub");

    println!("{}", style::info("Checking for SKILL.md..."));
    if ctx
        .git
        .has_remote_manifest(&info.url, &branch, info.path.as_deref())
    {
        import_github_single(ctx, prompter, &info, &repo, &branch)
    } else {
        import_github_folder(ctx, prompter, &info, &repo, &branch)
    }
}

/// The URL points at a skill: clone just that path.
fn import_github_single(
    ctx: &Context,
    prompter: &mut dyn Prompter,
    info: &UrlInfo,
    repo: &str,
    branch: &str,
) -> Result<Vec<String>> {
    let locator = match &info.path {
        Some(path) => format!("{}/{}", repo, path),
        None => repo.to_string(),
    };
    let id = SkillSource::Github.skill_id(&locator);

    if !confirm_overwrite(ctx, prompter, &id)? {
        return Ok(Vec::new());
    }

    let dest = ctx.home.repo_path(&id);
    println!("{}", style::info(&format!("Cloning {}...", id)));
    match &info.path {
        Some(path) => ctx.git.clone_sparse(&info.url, &dest, path, branch),
        None => ctx.git.clone_full(&info.url, &dest, info.branch.as_deref()),
    }
    .context("Failed to clone")?;

    let commit = recorded_commit(ctx, &dest, info.path.as_deref().unwrap_or("."));
    ctx.registry.add(
        &id,
        SkillSource::Github,
        commit.as_deref(),
        info.path.as_deref(),
    )?;

    println!("{}", style::success(&format!("Added {}", id)));
    Ok(vec![id])
}

/// The URL points at a folder of skills: scan a throwaway clone, let the
/// user pick, then sparse-clone each pick on its own.
fn import_github_folder(
    ctx: &Context,
    prompter: &mut dyn Prompter,
    info: &UrlInfo,
    repo: &str,
    branch: &str,
) -> Result<Vec<String>> {
    println!(
        "{}",
        style::info("No SKILL.md there, scanning for skills inside...")
    );

    let tmp = tempfile::Builder::new()
        .prefix("agm-scan-")
        .tempdir()
        .context("Failed to create temporary directory")?;
    let checkout = tmp.path().join("repo");

    match &info.path {
        Some(path) => ctx.git.clone_sparse(&info.url, &checkout, path, branch),
        None => ctx.git.clone_full(&info.url, &checkout, info.branch.as_deref()),
    }
    .context("Failed to clone")?;

    let scan_root = match &info.path {
        Some(path) => checkout.join(path),
        None => checkout.clone(),
    };
    let prefix = match &info.path {
        Some(path) => format!("{}/{}", repo, path),
        None => repo.to_string(),
    };
    let candidates: Vec<Candidate> = scan_skill_dirs(&scan_root)?
        .into_iter()
        .map(|dir| {
            let name = dir_name(&dir);
            let id = SkillSource::Github.skill_id(&format!("{}/{}", prefix, name));
            Candidate { name, dir, id }
        })
        .collect();

    if candidates.is_empty() {
        println!(
            "{}",
            style::error("No skills found (no subdirectories with SKILL.md).")
        );
        return Ok(Vec::new());
    }

    let picked = pick_candidates(ctx, prompter, &candidates)?;
    let mut added = Vec::new();

    for candidate in picked {
        let sub_path = match &info.path {
            Some(path) => format!("{}/{}", path, candidate.name),
            None => candidate.name.clone(),
        };

        if !confirm_overwrite(ctx, prompter, &candidate.id)? {
            continue;
        }

        let dest = ctx.home.repo_path(&candidate.id);
        println!("{}", style::info(&format!("Cloning {}...", candidate.name)));
        if let Err(e) = ctx.git.clone_sparse(&info.url, &dest, &sub_path, branch) {
            println!(
                "{}",
                style::error(&format!("Failed to clone {}: {}", candidate.name, e))
            );
            continue;
        }

        let commit = recorded_commit(ctx, &dest, &sub_path);
        ctx.registry.add(
            &candidate.id,
            SkillSource::Github,
            commit.as_deref(),
            Some(&sub_path),
        )?;
        println!("{}", style::success(&format!("Added {}", candidate.id)));
        added.push(candidate.id.clone());
    }

    report_added(&added);
    Ok(added)
}

fn import_folder(ctx: &Context, prompter: &mut dyn Prompter) -> Result<Vec<String>> {
    let Some(input) = prompter.input(
        "Skills folder path",
        "Directory containing skill subdirectories",
        "~/skills",
    )?
    else {
        return Ok(Vec::new());
    };
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let folder = resolve_path(&input)?;
    if !folder.is_dir() {
        bail!("Path does not exist or is not a directory.");
    }
    import_local_skills(ctx, prompter, &folder)
}

/// Copy selected skills from `folder` into the repository.
fn import_local_skills(
    ctx: &Context,
    prompter: &mut dyn Prompter,
    folder: &Path,
) -> Result<Vec<String>> {
    let candidates: Vec<Candidate> = scan_skill_dirs(folder)?
        .into_iter()
        .map(|dir| {
            let name = dir_name(&dir);
            let id = SkillSource::Local.skill_id(&name);
            Candidate { name, dir, id }
        })
        .collect();

    if candidates.is_empty() {
        println!(
            "{}",
            style::warning("No skills found (no subdirectories with SKILL.md).")
        );
        return Ok(Vec::new());
    }

    let picked = pick_candidates(ctx, prompter, &candidates)?;
    let mut added = Vec::new();

    for candidate in picked {
        if !confirm_overwrite(ctx, prompter, &candidate.id)? {
            continue;
        }

        let dest = ctx.home.repo_path(&candidate.id);
        println!("{}", style::info(&format!("Copying {}...", candidate.name)));
        if let Err(e) = copy_dir(&candidate.dir, &dest) {
            println!(
                "{}",
                style::error(&format!("Failed: {}: {:#}", candidate.name, e))
            );
            continue;
        }

        ctx.registry
            .add(&candidate.id, SkillSource::Local, None, None)?;
        println!("{}", style::success(&format!("Added {}", candidate.id)));
        added.push(candidate.id.clone());
    }

    report_added(&added);
    Ok(added)
}

/// Multi-select over scanned skills. Installed ones are marked, and the
/// SKILL.md description is shown when there is one.
fn pick_candidates<'a>(
    ctx: &Context,
    prompter: &mut dyn Prompter,
    candidates: &'a [Candidate],
) -> Result<Vec<&'a Candidate>> {
    let mut options = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let installed = ctx.registry.get(&candidate.id)?.is_some();
        options.push(candidate_label(
            &candidate.name,
            read_description(&candidate.dir).as_deref(),
            installed,
        ));
    }

    let title = format!("Found {} skills, select which to add", candidates.len());
    let Some(chosen) = prompter.multi_select(&title, &options, &vec![false; candidates.len()])?
    else {
        return Ok(Vec::new());
    };

    if chosen.is_empty() {
        println!("{}", style::muted("No skills selected."));
    }
    Ok(chosen.into_iter().filter_map(|i| candidates.get(i)).collect())
}

fn candidate_label(name: &str, description: Option<&str>, installed: bool) -> String {
    let mut label = name.to_string();
    if installed {
        label.push(' ');
        label.push_str(&style::muted("(installed)"));
    }
    if let Some(description) = description {
        let short: String = description.chars().take(60).collect();
        let ellipsis = if short.len() < description.len() { "…" } else { "" };
        label.push_str(&style::muted(&format!("  {}{}", short, ellipsis)));
    }
    label
}

/// Ask before replacing an installed skill; clears its old copy on yes.
fn confirm_overwrite(ctx: &Context, prompter: &mut dyn Prompter, id: &str) -> Result<bool> {
    if ctx.registry.get(id)?.is_none() {
        return Ok(true);
    }
    let title = format!("{} already exists. Overwrite?", id);
    if prompter.confirm(&title)? != Some(true) {
        return Ok(false);
    }
    remove_dir_if_exists(&ctx.home.repo_path(id))?;
    Ok(true)
}

fn recorded_commit(ctx: &Context, clone_dir: &Path, sub_path: &str) -> Option<String> {
    match ctx.git.path_commit_id(clone_dir, sub_path) {
        Ok(commit) => Some(commit),
        Err(e) => {
            tracing::warn!(dir = %clone_dir.display(), error = %e, "no commit recorded");
            None
        }
    }
}

fn report_added(added: &[String]) {
    if !added.is_empty() {
        println!(
            "\n{}",
            style::success(&format!("{} skill(s) added", added.len()))
        );
    }
}

/// Offer to link freshly imported skills into the detected tools.
fn offer_link(ctx: &Context, prompter: &mut dyn Prompter, added: &[String]) -> Result<()> {
    let projects = ctx.detect_projects();
    if projects.is_empty() {
        return Ok(());
    }

    if prompter.confirm("Link these skills to a project now?")? != Some(true) {
        return Ok(());
    }

    let Some(targets) = link::choose_projects(prompter, projects)? else {
        return Ok(());
    };

    let many = targets.len() > 1;
    for project in &targets {
        if many {
            println!(
                "{}",
                style::info(&format!("Linking to {}...", project.tool_type))
            );
        }
        fs::create_dir_all(&project.skill_dir)
            .with_context(|| format!("Failed to create {}", project.skill_dir.display()))?;
        for id in added {
            match ctx.registry.get(id)? {
                Some(skill) => link::link_skill(ctx, &skill, project),
                None => println!("{}", style::error(&format!("Skill {} not found.", id))),
            }
        }
    }
    Ok(())
}
