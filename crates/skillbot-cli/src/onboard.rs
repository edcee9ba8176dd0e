//! `skillbot onboard` — initialize configuration and directories.
//!
//! - Creates `~/.skillbot/config.json` with defaults
//! - Creates the data, checkpoint, and history directories
//! - Creates the skills directory with an example skill

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use skillbot_core::config::{get_config_path, load_config, save_config};
use skillbot_core::utils::{checkpoints_dir, expand_home};

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "🤖 Skillbot — Setup".cyan().bold());
    println!();

    // 1. Config (defaults plus any env overrides already set)
    let config_path = get_config_path();
    let config = load_config(None);
    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        save_config(&config, Some(&config_path))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    }

    // 2. Storage
    let data_dir = config.storage.data_path();
    std::fs::create_dir_all(checkpoints_dir(&data_dir))?;
    std::fs::create_dir_all(data_dir.join("history"))?;
    println!("  {} data dir at {}", "✓".green(), data_dir.display());

    // 3. Skills
    let skills_dir = expand_home(&config.tools.skills_dir);
    std::fs::create_dir_all(&skills_dir)?;
    println!("  {} skills dir at {}", "✓".green(), skills_dir.display());
    create_template(&skills_dir.join("csv-report").join("SKILL.md"), EXAMPLE_SKILL)?;

    println!();
    println!(
        "{}",
        "  Setup complete! Run `skillbot chat` to start chatting.".green()
    );
    println!();

    Ok(())
}

/// Create a template file (and its parent) if it doesn't exist.
fn create_template(path: &Path, content: &str) -> Result<()> {
    let name = path.display();
    if path.exists() {
        println!("  {} {} already exists", "✓".green(), name);
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        println!("  {} created {}", "✓".green(), name);
    }
    Ok(())
}

const EXAMPLE_SKILL: &str = r#"---
name: CSV Report
description: Summarize a CSV file into a short written report with key figures.
---

# CSV Report

1. Locate the file with `glob_search` if the user did not give a full path.
2. Call `data_analysis` with the path and a task asking for row counts,
   column overviews, and the three most notable figures.
3. Write the report as short sections: Overview, Key Figures, Caveats.
"#;

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
