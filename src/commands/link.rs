//! Link skills from the local repository into a project's AI tool folder.

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::fs;

use super::Context;
use crate::links;
use crate::project::ProjectInfo;
use crate::registry::Skill;
use crate::tui::{style, Prompter};

pub fn run(ctx: &Context, prompter: &mut dyn Prompter) -> Result<()> {
    let skills = ctx.registry.list()?;
    if skills.is_empty() {
        println!("{}", style::warning("No skills in repository. Import skills first."));
        return Ok(());
    }

    let projects = ctx.detect_projects();
    if projects.is_empty() {
        println!("{}", style::warning("No AI tools detected in current directory."));
        println!(
            "{}",
            style::muted("  Supported: .cursor/ .claude/ .codex/ .copilot/ .gemini/")
        );
        return Ok(());
    }

    if projects.len() == 1 {
        println!("{}", style::info(&format!("Detected: {}", projects[0].tool_type)));
    }
    let Some(selected) = choose_projects(prompter, projects)? else {
        return Ok(());
    };

    for project in &selected {
        if toggle_links(ctx, prompter, &skills, project)?.is_none() {
            return Ok(());
        }
    }
    Ok(())
}

/// Pick the tools to act on. A single tool is returned without asking;
/// otherwise the user picks one or "All detected tools".
pub(crate) fn choose_projects(
    prompter: &mut dyn Prompter,
    projects: Vec<ProjectInfo>,
) -> Result<Option<Vec<ProjectInfo>>> {
    if projects.len() <= 1 {
        return Ok(Some(projects));
    }

    let mut options = vec!["All detected tools".to_string()];
    options.extend(projects.iter().map(|p| p.tool_type.clone()));

    Ok(match prompter.select("Which tool?", &options)? {
        None => None,
        Some(0) => Some(projects),
        Some(i) => projects.into_iter().nth(i - 1).map(|p| vec![p]),
    })
}

/// Toggle links for one tool. Returns the number of changes applied, or
/// `None` if the user cancelled.
fn toggle_links(
    ctx: &Context,
    prompter: &mut dyn Prompter,
    skills: &[Skill],
    project: &ProjectInfo,
) -> Result<Option<usize>> {
    print!("{}", style::section(&format!("{} Skills", project.tool_type)));
    let shown = project
        .skill_dir
        .strip_prefix(&project.root)
        .unwrap_or(project.skill_dir.as_path());
    println!("{}", style::muted(&format!("  {}", shown.display())));

    fs::create_dir_all(&project.skill_dir)
        .with_context(|| format!("Failed to create {}", project.skill_dir.display()))?;

    let broken = links::find_broken_links(&project.skill_dir);
    if !broken.is_empty() {
        println!(
            "{}",
            style::warning(&format!("Found {} broken symlink(s)", broken.len()))
        );
        if prompter.confirm("Remove broken symlinks?")? == Some(true) {
            links::remove_entries(&project.skill_dir, &broken)?;
            for name in &broken {
                println!("{}", style::success(&format!("Removed {}", name)));
            }
        }
    }

    let foreign = links::find_foreign_skills(&project.skill_dir, skills);
    if !foreign.is_empty() {
        println!("{}", style::muted("\n  Other skills (not managed by agm):"));
        for name in &foreign {
            println!("{}", style::muted(&format!("    • {}", name)));
        }
        println!();
    }

    let linked = links::linked_skills(skills, &project.skill_dir);
    let options: Vec<String> = skills
        .iter()
        .map(|s| {
            if linked.contains(&s.id) {
                format!("{} {}", s.id, "✓".green())
            } else {
                s.id.clone()
            }
        })
        .collect();
    let preselected: Vec<bool> = skills.iter().map(|s| linked.contains(&s.id)).collect();

    let Some(chosen) = prompter.multi_select("Toggle skills", &options, &preselected)? else {
        return Ok(None);
    };

    let mut changes = 0;
    for (i, skill) in skills.iter().enumerate() {
        let want = chosen.contains(&i);
        let have = preselected[i];
        if want && !have {
            link_skill(ctx, skill, project);
            changes += 1;
        } else if have && !want {
            unlink_skill(skill, project);
            changes += 1;
        }
    }

    if changes == 0 {
        println!("{}", style::muted("\nNo changes."));
    } else {
        println!(
            "\n{}",
            style::success(&format!(
                "{} change(s) applied to {}",
                changes, project.tool_type
            ))
        );
    }
    Ok(Some(changes))
}

/// Link one skill into a tool folder and report the outcome.
pub(crate) fn link_skill(ctx: &Context, skill: &Skill, project: &ProjectInfo) {
    match links::create_link(&ctx.home, skill, &project.skill_dir) {
        Ok(true) => println!("{}", style::success(&format!("Linked {}", skill.id))),
        Ok(false) => tracing::debug!(id = %skill.id, "already linked"),
        Err(e) => println!("{}", style::error(&format!("{:#}", e))),
    }
}

fn unlink_skill(skill: &Skill, project: &ProjectInfo) {
    match links::remove_link(&project.skill_dir, &skill.id) {
        Ok(true) => println!("{}", style::success(&format!("Unlinked {}", skill.id))),
        Ok(false) => {}
        Err(e) => println!("{}", style::error(&format!("{:#}", e))),
    }
}
