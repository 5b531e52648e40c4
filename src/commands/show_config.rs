//! `agm --config`

use anyhow::Result;

use crate::config::AgmHome;
use crate::tui::style;

pub fn run(home: &AgmHome) -> Result<()> {
    println!(
        "{}",
        style::info(&format!("Config directory: {}", home.home_dir().display()))
    );
    println!(
        "{}",
        style::muted(&format!("  {}", home.config_file().display()))
    );

    let config = home.load_config()?;
    println!("\n{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
