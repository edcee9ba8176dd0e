//! `skillbot status` — show configuration, endpoint, and storage locations.

use anyhow::Result;
use colored::Colorize;

use skillbot_agent::SkillCatalog;
use skillbot_core::config::{get_config_path, load_config};
use skillbot_core::utils::{checkpoints_dir, expand_home};

fn mark(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🤖 Skillbot Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        mark(config_path.exists())
    );
    println!("  {:<18} {}", "Model:".bold(), config.agent.model);
    println!(
        "  {:<18} {} | max_iterations: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.agent.temperature).dimmed(),
        format!("{}", config.agent.max_iterations).dimmed(),
    );

    let key_status = if config.provider.has_api_key() {
        format!("{} (key set)", "✓".green())
    } else {
        format!("{}", "· no key".dimmed())
    };
    println!(
        "  {:<18} {} {}",
        "Endpoint:".bold(),
        config.provider.api_base,
        key_status
    );

    println!();
    let data_dir = config.storage.data_path();
    println!(
        "  {:<18} {} {}",
        "Data dir:".bold(),
        data_dir.display(),
        mark(data_dir.exists())
    );
    let checkpoints = checkpoints_dir(&data_dir);
    println!(
        "  {:<18} {} {}",
        "Checkpoints:".bold(),
        checkpoints.display(),
        mark(checkpoints.exists())
    );

    let skills_dir = expand_home(&config.tools.skills_dir);
    let skills = SkillCatalog::from_dir(&skills_dir);
    println!(
        "  {:<18} {} {}",
        "Skills:".bold(),
        skills_dir.display(),
        format!("({} found)", skills.len()).dimmed()
    );

    println!();
    let gated = if config.tools.gated_tools.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        config.tools.gated_tools.join(", ")
    };
    println!("  {:<18} {}", "Needs approval:".bold(), gated);
    println!(
        "  {:<18} {} | privacy mode: {}",
        "Data analysis:".bold(),
        config.tools.data_analysis.interpreter,
        config.tools.data_analysis.privacy_mode
    );

    println!();

    Ok(())
}
