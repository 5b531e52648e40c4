//! Browse installed skills, update GitHub skills, delete skills.

use anyhow::{Context as _, Result};

use super::Context;
use crate::registry::{short_id, Skill, SkillSource};
use crate::skill_dir::remove_dir_if_exists;
use crate::tui::{style, Prompter};

const BACK: &str = "← Back";

/// A newer upstream commit for a GitHub skill.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingUpdate {
    local: String,
    remote: String,
}

pub fn run(ctx: &Context, prompter: &mut dyn Prompter) -> Result<()> {
    loop {
        let skills = ctx.registry.list()?;
        if skills.is_empty() {
            println!("{}", style::warning("No skills installed. Use 'Import skills' first."));
            return Ok(());
        }

        print!("{}", style::section("Manage Skills"));

        let mut options: Vec<String> = skills.iter().map(skill_label).collect();
        options.push(BACK.to_string());

        match prompter.select("Select a skill", &options)? {
            Some(i) if i < skills.len() => manage_one(ctx, prompter, &skills[i])?,
            _ => return Ok(()),
        }
    }
}

fn skill_label(skill: &Skill) -> String {
    let detail = match (skill.source, skill.short_commit()) {
        (SkillSource::Local, _) => "(local)".to_string(),
        (_, Some(commit)) => format!("({})", commit),
        (_, None) => return skill.id.clone(),
    };
    format!("{} {}", skill.id, style::muted(&detail))
}

fn manage_one(ctx: &Context, prompter: &mut dyn Prompter, skill: &Skill) -> Result<()> {
    print!("{}", style::section(&skill.id));

    let update = match skill.source {
        SkillSource::Github => {
            let update = check_for_update(ctx, skill);
            if update.is_none() {
                println!("{}", style::success("Up to date"));
            }
            update
        }
        SkillSource::Local => {
            println!("{}", style::muted("  Local skill, no remote updates"));
            None
        }
        SkillSource::Registry => {
            println!("{}", style::muted("  Updated by registry sync"));
            None
        }
    };

    let mut options = Vec::new();
    if let Some(update) = &update {
        options.push(format!(
            "Update ({} → {})",
            short_id(&update.local),
            short_id(&update.remote)
        ));
    }
    options.push("Delete".to_string());
    options.push(BACK.to_string());

    let Some(choice) = prompter.select("Action", &options)? else {
        return Ok(());
    };

    let delete_index = usize::from(update.is_some());
    match (choice, update) {
        (0, Some(update)) => update_skill(ctx, skill, &update),
        (i, _) if i == delete_index => delete_skill(ctx, prompter, &skill.id).map(|_| ()),
        _ => Ok(()),
    }
}

/// Fetch the skill's clone and compare the last commit touching its path
/// on the remote-tracking branch with the local one.
fn check_for_update(ctx: &Context, skill: &Skill) -> Option<PendingUpdate> {
    let repo_dir = ctx.home.repo_path(&skill.id);
    let sub_path = skill.path.as_deref().unwrap_or(".");

    let local = match ctx.git.path_commit_id(&repo_dir, sub_path) {
        Ok(commit) => commit,
        Err(e) => {
            tracing::warn!(id = %skill.id, error = %e, "cannot read local commit");
            return None;
        }
    };

    println!("{}", style::info("Checking for updates..."));
    let remote = ctx
        .git
        .fetch(&repo_dir)
        .and_then(|_| ctx.git.current_branch(&repo_dir))
        .and_then(|branch| {
            ctx.git
                .remote_path_commit_id(&repo_dir, &format!("origin/{}", branch), sub_path)
        });

    match remote {
        Ok(remote) if !remote.is_empty() && remote != local => Some(PendingUpdate { local, remote }),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(id = %skill.id, error = %e, "update check failed");
            println!("{}", style::warning(&format!("Could not check for updates: {}", e)));
            None
        }
    }
}

fn update_skill(ctx: &Context, skill: &Skill, update: &PendingUpdate) -> Result<()> {
    println!("{}", style::info(&format!("Updating {}...", skill.id)));
    ctx.git
        .pull(&ctx.home.repo_path(&skill.id))
        .with_context(|| format!("Failed to update {}", skill.id))?;
    ctx.registry.update_version(&skill.id, &update.remote)?;
    println!("{}", style::success(&format!("Updated {}", skill.id)));
    Ok(())
}

/// Delete a skill after confirmation: its links in detected tools, its
/// repository copy and its record. Returns whether it was deleted.
pub(crate) fn delete_skill(ctx: &Context, prompter: &mut dyn Prompter, id: &str) -> Result<bool> {
    let title = format!("Delete {}? This cannot be undone.", id);
    if prompter.confirm(&title)? != Some(true) {
        println!("{}", style::muted("Cancelled."));
        return Ok(false);
    }

    let unlinked = ctx.unlink_everywhere(id, &ctx.detect_projects());
    remove_dir_if_exists(&ctx.home.repo_path(id))?;
    ctx.registry.remove(id)?;

    println!("{}", style::success(&format!("Deleted {}", id)));
    if unlinked > 0 {
        println!(
            "{}",
            style::info(&format!("{} project link(s) removed", unlinked))
        );
    }
    Ok(true)
}
