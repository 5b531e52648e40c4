//! Styled terminal output.

use colored::Colorize;

/// App banner shown above menus.
pub fn banner(version: &str) -> String {
    format!(
        "\n{} {} {}\n",
        " agm ".white().bold().on_purple(),
        "Agent Management".purple().bold(),
        format!("v{}", version).dimmed()
    )
}

/// Section header with an underline.
pub fn section(title: &str) -> String {
    let rule = "─".repeat(title.chars().count().max(3));
    format!("\n{}\n{}\n", title.purple().bold(), rule.purple())
}

pub fn success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg)
}

pub fn error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg)
}

pub fn warning(msg: &str) -> String {
    format!("{} {}", "!".yellow().bold(), msg)
}

pub fn info(msg: &str) -> String {
    format!("{} {}", "→".cyan().bold(), msg)
}

pub fn muted(msg: &str) -> String {
    msg.dimmed().to_string()
}
