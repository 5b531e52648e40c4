//! agm - manage and synchronize AI coding agent skills.
//!
//! Skills (folders with a SKILL.md) are kept in one local repository under
//! `~/.agent-management` and linked into the skill folders of the AI tools
//! used in a project (`.cursor/skills`, `.claude/skills`, ...).
//!
//! # Usage
//!
//! ```bash
//! agm             # Interactive menu
//! agm --sync      # Sync skills from the team registry
//! agm --config    # Show configuration
//! agm --version   # Show version
//! ```

mod commands;
mod config;
mod error;
mod git;
mod links;
mod project;
mod registry;
mod skill_dir;
mod tui;

use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::sync::SyncMode;
use config::AgmHome;
use tui::{style, Prompter, TerminalPrompter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A CLI tool to manage and synchronize AI coding agent skills
#[derive(Parser)]
#[command(name = "agm")]
#[command(disable_version_flag = true, disable_help_flag = true)]
struct Cli {
    /// Show version number
    #[arg(short = 'v', long)]
    version: bool,

    /// Show configuration
    #[arg(long)]
    config: bool,

    /// Sync skills from registry (non-interactive)
    #[arg(long)]
    sync: bool,

    /// Show this help message
    #[arg(short = 'h', long)]
    help: bool,

    /// agm home directory
    #[arg(long, env = "AGM_HOME", hide = true)]
    home: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let rendered = e.to_string();
            let first = rendered.lines().next().unwrap_or_default();
            eprintln!("{}", style::error(first.trim_start_matches("error: ")));
            print_help();
            std::process::exit(1);
        }
    };

    init_logging();

    if let Err(e) = run(cli) {
        eprintln!("{}", style::error(&format!("{:#}", e)));
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr, filtered by `AGM_LOG` (default `warn`).
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AGM_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if cli.version {
        println!("agm version {}", VERSION);
        return Ok(());
    }
    if cli.help {
        print_help();
        return Ok(());
    }

    let root = match cli.home {
        Some(root) => root,
        None => AgmHome::default_location()?,
    };
    let home = AgmHome::init(root)?;

    if cli.config {
        print!("{}", style::banner(VERSION));
        return commands::show_config::run(&home);
    }

    let cwd = std::env::current_dir().context("Cannot resolve current directory")?;
    let ctx = commands::Context::new(home, cwd);
    let mut prompter = TerminalPrompter::new();

    if cli.sync {
        print!("{}", style::banner(VERSION));
        return commands::sync::run(&ctx, &mut prompter, SyncMode::Unattended);
    }

    main_menu(&ctx, &mut prompter)
}

fn print_help() {
    println!("{}", style::banner(VERSION));
    println!("Usage: agm [options]");
    println!();
    println!("  A CLI tool to manage and synchronize AI coding agent skills");
    println!();
    println!("Options:");
    println!("  --version, -v  Show version number");
    println!("  --config       Show configuration");
    println!("  --sync         Sync skills from registry (non-interactive)");
    println!("  --help, -h     Show this help message");
    println!();
    println!("Run without arguments for interactive mode.");
}

fn main_menu(ctx: &commands::Context, prompter: &mut dyn Prompter) -> Result<()> {
    let options = vec![
        "Import skills".to_string(),
        "Link to project".to_string(),
        "Manage skills".to_string(),
        "Exit".to_string(),
    ];

    loop {
        print!("{}", style::banner(VERSION));

        let outcome = match prompter.select("What would you like to do?", &options)? {
            Some(0) => commands::import::run(ctx, prompter),
            Some(1) => commands::link::run(ctx, prompter),
            Some(2) => commands::manage::run(ctx, prompter),
            Some(_) => {
                println!("{}", style::muted("\nGoodbye!"));
                return Ok(());
            }
            None => return Ok(()),
        };

        if let Err(e) = outcome {
            tracing::debug!(error = ?e, "flow failed");
            println!("{}", style::error(&format!("{:#}", e)));
        }
    }
}
